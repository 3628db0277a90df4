use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use app_command_core::{
    Binding, BindingPackage, Call, CallResponse, Field, FieldType, Form, SelectOption, TypedValue,
};
use app_command_db::{BindingDatabase, CliConfig, DatabaseSource, StaticBackend};
use app_command_parser::{AppCaller, AppCommandParser};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn jira() -> Binding {
    let create = Form::new(Call::new("/create"))
        .with_field(Field::new("project", FieldType::Text).required())
        .with_field(Field::new("assignee", FieldType::User))
        .with_field(Field::new("component", FieldType::DynamicSelect))
        .with_field(Field::new("summary", FieldType::Text).rest());

    Binding::new("jira")
        .with_app_id("jira")
        .with_binding(Binding::new("create").with_form(create))
        .with_binding(Binding::new("view").with_call(Call::new("/view-form")))
}

fn write_json(path: &Path, value: &impl serde::Serialize) {
    let mut f = std::fs::File::create(path).unwrap();
    serde_json::to_writer_pretty(&mut f, value).unwrap();
    f.flush().unwrap();
}

const FIXTURES: &str = r#"{
    "forms": {
        "/view-form": {
            "call": { "path": "/view" },
            "fields": [{ "name": "issue", "type": "text", "position": 1, "is_required": true }]
        }
    },
    "lookups": {
        "component": [
            { "label": "Backend", "value": "be" },
            { "label": "Frontend", "value": "fe" }
        ]
    },
    "responses": { "/view": { "type": "ok", "text": "Viewing" } },
    "users": [{ "id": "u1", "username": "alice" }],
    "channels": []
}"#;

const CONFIG: &str = r#"
version: "1.0"
sources:
  - dir: missing
  - dir: bindings
fixtures: fixtures.json
context:
  channel_id: town-square
  team_id: core
"#;

/// Lays out a config directory and returns the loaded parser.
fn setup(dir: &Path) -> (AppCommandParser, Arc<StaticBackend>) {
    std::fs::create_dir_all(dir.join("bindings")).unwrap();
    write_json(&dir.join("bindings").join("jira.json"), &jira());
    std::fs::write(dir.join("fixtures.json"), FIXTURES).unwrap();
    std::fs::write(dir.join("app-command.yml"), CONFIG).unwrap();

    let config = CliConfig::load(dir.join("app-command.yml")).unwrap();
    let db = config.database_builder().build().unwrap();
    assert!(matches!(db.source(), DatabaseSource::Multiple(s) if s.len() == 2));

    let backend = Arc::new(StaticBackend::load(config.fixtures.as_ref().unwrap()).unwrap());
    let parser = AppCommandParser::new(
        db.into_bindings(),
        backend.clone(),
        backend.clone(),
        config.context.command_context(),
    )
    .with_config(config.parser.clone());
    (parser, backend)
}

// ---------------------------------------------------------------------------
// Configured workflow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_compose_from_configured_sources() {
    let dir = std::env::temp_dir().join("ac_db_integ_compose");
    let (parser, _) = setup(&dir);

    let request = parser
        .compose_call_from_command("/jira create --project KEY --assignee @alice fix the build")
        .await
        .unwrap();
    assert_eq!(request.call.path, "/create");
    assert_eq!(request.context.team_id.as_deref(), Some("core"));
    assert_eq!(request.values["project"], TypedValue::Text("KEY".into()));
    assert_eq!(
        request.values["assignee"],
        TypedValue::Option(SelectOption::new("alice", "u1"))
    );
    assert_eq!(request.values["summary"], TypedValue::Text("fix the build".into()));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_fetched_form_then_submit() {
    let dir = std::env::temp_dir().join("ac_db_integ_submit");
    let (parser, backend) = setup(&dir);

    let request = parser
        .compose_call_from_command("/jira view KEY-7")
        .await
        .unwrap();
    assert_eq!(request.call.path, "/view");
    assert_eq!(request.values["issue"], TypedValue::Text("KEY-7".into()));

    let response = backend
        .perform_call(&request, app_command_core::CallType::Submit)
        .await
        .unwrap();
    assert_eq!(
        response,
        CallResponse::Ok {
            text: Some("Viewing".into()),
            data: None
        }
    );

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_dynamic_suggestions_from_fixtures() {
    let dir = std::env::temp_dir().join("ac_db_integ_suggest");
    let (parser, _) = setup(&dir);

    let suggestions = parser
        .get_suggestions("/jira create --component f")
        .await;
    let fe = suggestions
        .iter()
        .find(|s| s.suggestion == "fe")
        .expect("frontend option suggested");
    assert_eq!(fe.complete, "jira create --component fe");
    assert_eq!(fe.description, "Frontend");
    assert!(suggestions.iter().all(|s| s.suggestion != "be"));

    std::fs::remove_dir_all(&dir).ok();
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

#[test]
fn test_bundle_written_from_directory() {
    let dir = std::env::temp_dir().join("ac_db_integ_bundle");
    std::fs::create_dir_all(dir.join("bindings")).unwrap();
    write_json(&dir.join("bindings").join("jira.json"), &jira());
    write_json(
        &dir.join("bindings").join("github.json"),
        &Binding::new("github").with_app_id("github"),
    );

    let db = BindingDatabase::from_dir(dir.join("bindings")).unwrap();
    let generated_at = chrono::Utc::now().to_rfc3339();
    let package = db.to_package("1.0.0", generated_at.clone());
    write_json(&dir.join("bindings.json"), &package);

    let loaded = BindingDatabase::from_bundle(dir.join("bindings.json")).unwrap();
    assert_eq!(loaded.labels().collect::<Vec<_>>(), ["github", "jira"]);
    assert_eq!(loaded.get("jira"), db.get("jira"));

    let raw: BindingPackage =
        serde_json::from_str(&std::fs::read_to_string(dir.join("bindings.json")).unwrap())
            .unwrap();
    assert_eq!(raw.generated_at, generated_at);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_invalid_bundle_rejected() {
    let dir = std::env::temp_dir().join("ac_db_integ_invalid");
    std::fs::create_dir_all(&dir).unwrap();

    let bad = Form::new(Call::new("/pick")).with_field(
        Field::new("choice", FieldType::StaticSelect).with_options(Vec::<SelectOption>::new()),
    );
    let mut package = BindingPackage::new("1.0.0", "2024-01-01T00:00:00Z");
    package
        .bindings
        .push(Binding::new("pick").with_form(bad));
    write_json(&dir.join("bindings.json"), &package);

    let err = BindingDatabase::from_bundle(dir.join("bindings.json")).unwrap_err();
    assert!(err.to_string().starts_with("invalid bindings:"));

    std::fs::remove_dir_all(&dir).ok();
}
