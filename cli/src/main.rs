use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use app_command_core::{BindingPackage, CallType};
use app_command_db::{BindingDatabase, CliConfig, SourceConfig, StaticBackend};
use app_command_parser::{AppCaller, AppCommandParser, CommandError};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "app-command")]
#[command(about = "Parse, complete and bundle app slash commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compose the call request for a complete command.
    Execute(ExecuteArgs),
    /// List autocomplete suggestions for partially typed text.
    Suggest(SuggestArgs),
    /// Validate binding files, directories or bundles.
    Validate(ValidateArgs),
    /// Bundle binding files into a BindingPackage file.
    Bundle(BundleArgs),
}

/// Where the binding tree, fixtures and context come from.
#[derive(Debug, Args)]
struct SessionArgs {
    /// Path to an app-command.yml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Binding directories or bundle files, tried before configured sources.
    #[arg(long = "bindings")]
    bindings: Vec<PathBuf>,
    /// Fixture JSON backing form, lookup and submit calls.
    #[arg(long)]
    fixtures: Option<PathBuf>,
    /// Channel the command is typed in.
    #[arg(long)]
    channel: Option<String>,
    /// Team the channel belongs to.
    #[arg(long)]
    team: Option<String>,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ExecuteArgs {
    /// Full command text, e.g. "/jira issue create --project KEY".
    command: String,
    /// Also submit the composed request and print the response.
    #[arg(long)]
    submit: bool,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Args)]
struct SuggestArgs {
    /// Text typed so far.
    pretext: String,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Binding directories and/or bundle files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct BundleArgs {
    /// Binding directories and/or bundle files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Output JSON bundle path.
    #[arg(long)]
    output: PathBuf,
    /// Optional bundle name metadata.
    #[arg(long)]
    name: Option<String>,
    /// Optional bundle description metadata.
    #[arg(long)]
    description: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Execute(args) => block_on(run_execute(args)),
        Command::Suggest(args) => block_on(run_suggest(args)),
        Command::Validate(args) => run_validate(args),
        Command::Bundle(args) => run_bundle(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn block_on<F: Future<Output = Result<(), String>>>(future: F) -> Result<(), String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to start runtime: {err}"))?
        .block_on(future)
}

async fn run_execute(args: ExecuteArgs) -> Result<(), String> {
    let (parser, backend) = load_session(&args.session)?;

    let request = parser
        .compose_call_from_command(&args.command)
        .await
        .map_err(|err| describe_command_error(&args.command, &err))?;

    if !args.submit {
        return print(&request, args.session.format);
    }

    info!(path = %request.call.path, "submitting call");
    let response = backend
        .perform_call(&request, CallType::Submit)
        .await
        .map_err(|err| format!("Call to '{}' failed: {err}", request.call.path))?;
    print(&response, args.session.format)
}

async fn run_suggest(args: SuggestArgs) -> Result<(), String> {
    let (parser, _) = load_session(&args.session)?;
    let suggestions = parser.get_suggestions(&args.pretext).await;
    debug!(count = suggestions.len(), "suggestions generated");
    print(&suggestions, args.session.format)
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let db = load_inputs(&args.inputs)?;
    println!(
        "Validated {} binding source(s) with {} command(s).",
        args.inputs.len(),
        db.len()
    );
    Ok(())
}

fn run_bundle(args: BundleArgs) -> Result<(), String> {
    let db = load_inputs(&args.inputs)?;
    let mut package: BindingPackage =
        db.to_package(PACKAGE_VERSION, chrono::Utc::now().to_rfc3339());
    package.name = args.name;
    package.description = args.description;

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }

    let raw = serde_json::to_string_pretty(&package)
        .map_err(|err| format!("Failed to serialize binding bundle: {err}"))?;
    fs::write(&args.output, raw)
        .map_err(|err| format!("Failed to write '{}': {err}", args.output.display()))?;

    println!(
        "Bundled {} binding(s) into '{}'.",
        package.binding_count(),
        args.output.display()
    );
    Ok(())
}

/// Builds the parser and backend from the config file and command-line
/// overrides.
fn load_session(args: &SessionArgs) -> Result<(AppCommandParser, Arc<StaticBackend>), String> {
    let mut config = match &args.config {
        Some(path) => CliConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => CliConfig::default(),
    };

    let mut sources: Vec<SourceConfig> = args.bindings.iter().map(|p| source_for(p)).collect();
    sources.append(&mut config.sources);
    if sources.is_empty() {
        return Err("No binding sources given; pass --bindings or --config.".into());
    }
    config.sources = sources;
    let db = config
        .database_builder()
        .build()
        .map_err(|err| format!("Failed to load bindings: {err}"))?;
    debug!(count = db.len(), "binding tree loaded");

    let backend = match args.fixtures.as_ref().or(config.fixtures.as_ref()) {
        Some(path) => StaticBackend::load(path)
            .map_err(|err| format!("Failed to load fixtures '{}': {err}", path.display()))?,
        None => StaticBackend::default(),
    };
    let backend = Arc::new(backend);

    let mut context = config.context;
    if let Some(channel) = &args.channel {
        context.channel_id.clone_from(channel);
    }
    if let Some(team) = &args.team {
        context.team_id = Some(team.clone());
    }

    let parser = AppCommandParser::new(
        db.into_bindings(),
        backend.clone(),
        backend.clone(),
        context.command_context(),
    )
    .with_config(config.parser);
    Ok((parser, backend))
}

/// Loads every input and merges them; later inputs replace earlier
/// commands with the same label.
fn load_inputs(inputs: &[PathBuf]) -> Result<BindingDatabase, String> {
    let mut merged: Option<BindingDatabase> = None;
    for input in inputs {
        let db = match source_for(input) {
            SourceConfig::Dir(path) => BindingDatabase::from_dir(&path),
            SourceConfig::Bundle(path) => BindingDatabase::from_bundle(&path),
        }
        .map_err(|err| format!("{}: {err}", input.display()))?;

        merged = Some(match merged.take() {
            Some(mut all) => {
                for binding in db.into_bindings() {
                    all.insert(binding);
                }
                all
            }
            None => db,
        });
    }
    merged.ok_or_else(|| "No inputs given.".to_string())
}

fn source_for(path: &Path) -> SourceConfig {
    if path.is_dir() {
        SourceConfig::Dir(path.to_path_buf())
    } else {
        SourceConfig::Bundle(path.to_path_buf())
    }
}

fn describe_command_error(command: &str, err: &CommandError) -> String {
    match err {
        CommandError::Parse(parse) => format!("{err}\n{}", parse.caret(command)),
        _ => err.to_string(),
    }
}

fn print<T: Serialize>(value: &T, format: CliOutputFormat) -> Result<(), String> {
    let raw = match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|err| format!("Failed to serialize output: {err}"))?,
        CliOutputFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|err| format!("Failed to serialize output: {err}"))?,
    };
    println!("{}", raw.trim_end());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_for_missing_path_is_bundle() {
        let path = PathBuf::from("/nonexistent/bindings.json");
        assert_eq!(source_for(&path), SourceConfig::Bundle(path));
    }

    #[test]
    fn test_source_for_directory() {
        let dir = std::env::temp_dir();
        assert_eq!(source_for(&dir), SourceConfig::Dir(dir.clone()));
    }

    #[test]
    fn test_describe_parse_error_has_caret() {
        let err = CommandError::Parse(app_command_parser::ParseError {
            kind: app_command_parser::ParseErrorKind::MultipleEquals,
            position: 3,
        });
        let message = describe_command_error("/a b==", &err);
        assert!(message.ends_with("/a b==\n   ^"));
    }

    #[test]
    fn test_load_inputs_requires_input() {
        assert!(load_inputs(&[]).is_err());
    }
}
