//! Binding, form and call type definitions.
//!
//! This module defines the data model shared by the parser, the loaders and
//! the CLI. Bindings and forms are published by apps and arrive as JSON, so
//! every type round-trips through [`serde`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Version of the bindings contract (semver).
///
/// Embedded in every [`BindingPackage`](crate::BindingPackage) to track
/// compatibility across releases.
pub const BINDINGS_CONTRACT_VERSION: &str = "1.0.0";

/// Position value marking a field as the "rest" field, which absorbs the
/// remainder of the command line verbatim.
pub const REST_POSITION: i32 = -1;

/// Type of a form field.
///
/// # Examples
///
/// ```
/// use app_command_core::FieldType;
///
/// assert_eq!(FieldType::default(), FieldType::Text);
/// assert!(FieldType::StaticSelect.is_select());
/// assert!(!FieldType::Bool.is_select());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free text (the default).
    #[default]
    Text,
    /// `true` / `false`.
    Bool,
    /// A user, referenced by `@username`.
    User,
    /// A channel, referenced by `~name`.
    Channel,
    /// One of the field's locally declared options.
    StaticSelect,
    /// An option looked up remotely per keystroke.
    DynamicSelect,
}

impl FieldType {
    /// Returns `true` for the two select types.
    pub fn is_select(self) -> bool {
        matches!(self, Self::StaticSelect | Self::DynamicSelect)
    }
}

/// A selectable option of a static or dynamic select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Display label.
    pub label: String,
    /// Submitted value.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_data: Option<String>,
}

impl SelectOption {
    /// Creates an option with the given label and value.
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            icon_data: None,
        }
    }
}

/// Raw (untyped) field value as written on the command line.
///
/// Multiselect fields always hold a [`Value::List`]; every other field holds
/// a [`Value::Scalar`]. The field schema decides which, never the call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A single token.
    Scalar(String),
    /// A bracketed list of tokens.
    List(Vec<String>),
}

impl Value {
    /// Returns the scalar token, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }

    /// Returns the tokens as a slice-like vector of `&str`.
    ///
    /// A scalar yields a one-element vector.
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            Self::Scalar(s) => vec![s.as_str()],
            Self::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// Returns `true` if the value carries no content (empty string or
    /// empty list).
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }
}

/// One named, typed parameter of a [`Form`].
///
/// A field is positional when `position > 0`, the rest field when
/// `position == -1`, and a flag otherwise. Every field can also be given as a
/// flag using its [`flag_name`](Field::flag_name).
///
/// # Examples
///
/// ```
/// use app_command_core::{Field, FieldType};
///
/// let issue = Field::new("issue", FieldType::Text).at_position(1).required();
/// assert!(issue.is_positional());
/// assert_eq!(issue.flag_name(), "issue");
///
/// let summary = Field::new("summary", FieldType::Text).with_label("title").rest();
/// assert!(summary.is_rest());
/// assert_eq!(summary.flag_name(), "title");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Name used as the key in submitted values.
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Label used to match `--flag` tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    /// Readonly fields always submit their default value.
    #[serde(default)]
    pub readonly: bool,
    /// `> 0` positional order, `-1` rest field, `0` flag only.
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub multiselect: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    /// Default value, in the same raw form as a typed token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Field {
    /// Creates an optional flag-only field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            label: None,
            hint: None,
            description: None,
            is_required: false,
            readonly: false,
            position: 0,
            multiselect: false,
            options: Vec::new(),
            value: None,
        }
    }

    /// Sets the flag label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Adds a hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Marks as required.
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// Marks as readonly.
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Places the field at a 1-based positional index.
    pub fn at_position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    /// Makes this the rest field.
    pub fn rest(mut self) -> Self {
        self.position = REST_POSITION;
        self
    }

    /// Marks as accepting a bracketed list of values.
    pub fn multiselect(mut self) -> Self {
        self.multiselect = true;
        self
    }

    /// Sets the static options.
    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Returns the name matched against `--flag` tokens (label, falling back
    /// to the field name).
    pub fn flag_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Returns `true` for a positional field.
    pub fn is_positional(&self) -> bool {
        self.position > 0
    }

    /// Returns `true` for the rest field.
    pub fn is_rest(&self) -> bool {
        self.position == REST_POSITION && self.field_type == FieldType::Text
    }
}

/// Target of a call to the owning app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Path on the app that handles the call.
    pub path: String,
    /// Opaque state echoed back to the app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

impl Call {
    /// Creates a call to `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: None,
        }
    }
}

/// Parameter schema of a leaf binding.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Form {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<Call>,
}

impl Form {
    /// Creates an empty form submitting to `call`.
    pub fn new(call: Call) -> Self {
        Self {
            title: None,
            fields: Vec::new(),
            call: Some(call),
        }
    }

    /// Adds a field.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Finds a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Finds the field at a 1-based positional index.
    pub fn positional(&self, position: i32) -> Option<&Field> {
        self.fields.iter().find(|f| f.position == position)
    }

    /// Returns the rest field, if the form declares one.
    pub fn rest_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.is_rest())
    }
}

/// A node in the command tree.
///
/// Interior bindings group subcommands in `bindings`; leaf bindings carry a
/// [`Form`], either inline or fetched through `call`.
///
/// # Examples
///
/// ```
/// use app_command_core::{Binding, Call, Form};
///
/// let jira = Binding::new("jira")
///     .with_app_id("jira")
///     .with_binding(Binding::new("create").with_form(Form::new(Call::new("/create"))));
///
/// assert!(!jira.is_leaf());
/// assert_eq!(jira.find_child("CREATE").unwrap().label, "create");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Binding {
    /// Owning app; children with an empty id inherit their ancestor's.
    #[serde(default)]
    pub app_id: String,
    /// Token the user types to select this binding.
    pub label: String,
    /// Path segment naming this binding in call locations and form cache
    /// keys; empty means the label is used.
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<Call>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<Form>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

impl Binding {
    /// Creates a binding with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            location: label.clone(),
            label,
            ..Default::default()
        }
    }

    /// Sets the location segment.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Returns the location segment, falling back to the label.
    pub fn location_segment(&self) -> &str {
        if self.location.is_empty() {
            &self.label
        } else {
            &self.location
        }
    }

    /// Sets the owning app.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Sets the call used to fetch the form lazily.
    pub fn with_call(mut self, call: Call) -> Self {
        self.call = Some(call);
        self
    }

    /// Sets an inline form.
    pub fn with_form(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    /// Adds a child binding.
    pub fn with_binding(mut self, child: Binding) -> Self {
        self.bindings.push(child);
        self
    }

    /// Returns `true` when the binding has no children.
    pub fn is_leaf(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Finds a direct child by label, ignoring case.
    pub fn find_child(&self, label: &str) -> Option<&Binding> {
        find_binding(&self.bindings, label)
    }
}

/// Finds a binding in `bindings` whose label equals `label`, ignoring case.
pub fn find_binding<'a>(bindings: &'a [Binding], label: &str) -> Option<&'a Binding> {
    bindings
        .iter()
        .find(|b| b.label.to_lowercase() == label.to_lowercase())
}

/// Ambient identifiers attached to every call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallContext {
    pub app_id: String,
    /// Path of the resolved binding, e.g. `/jira/issue/create`.
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
}

/// A fully typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Bool(bool),
    Text(String),
    Option(SelectOption),
    Texts(Vec<String>),
    Options(Vec<SelectOption>),
}

/// The resolved invocation ready to hand to the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub call: Call,
    pub context: CallContext,
    #[serde(default)]
    pub values: BTreeMap<String, TypedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_command: Option<String>,
    /// Field being looked up (lookup calls only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_field: Option<String>,
    /// Text typed so far for the looked-up field (lookup calls only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl CallRequest {
    /// Creates a request with no values.
    pub fn new(call: Call, context: CallContext) -> Self {
        Self {
            call,
            context,
            values: BTreeMap::new(),
            raw_command: None,
            selected_field: None,
            query: None,
        }
    }
}

/// Kind of call issued through the call capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Submit,
    Form,
    Lookup,
}

/// Response to a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallResponse {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    Form {
        form: Form,
    },
    Navigate {
        navigate_to_url: String,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl CallResponse {
    /// Returns the wire name of the response type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Ok { .. } => "ok",
            Self::Form { .. } => "form",
            Self::Navigate { .. } => "navigate",
            Self::Error { .. } => "error",
        }
    }
}

/// Payload of an `ok` response to a lookup call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub items: Vec<SelectOption>,
}

/// A user known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// A channel known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

/// Where an autocomplete suggestion came from, with only the data relevant
/// to that source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionSource {
    /// A subcommand (or top-level command) label.
    Command { label: String },
    /// A flag naming a form field.
    Flag { field: String },
    User { user_id: String, username: String },
    Channel { channel_id: String, name: String },
    StaticOption { option: SelectOption },
    DynamicOption { option: SelectOption },
    /// Literal text such as `true`, `false` or an echo of typed text.
    Literal { value: String },
    /// The synthetic "execute current command" item.
    Execute,
    /// Informational item with nothing to complete.
    Placeholder,
    /// A failure reported in place of suggestions; `complete` keeps the
    /// typed text as is.
    Error { message: String },
}

/// One autocomplete suggestion.
///
/// `complete` is the full replacement text for the input box (without the
/// leading `/`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteSuggestion {
    pub complete: String,
    pub suggestion: String,
    pub hint: String,
    pub description: String,
    pub icon_data: String,
    pub source: SuggestionSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_defaults_deserialize() {
        let field: Field = serde_json::from_str(r#"{"name": "summary"}"#).unwrap();
        assert_eq!(field.field_type, FieldType::Text);
        assert_eq!(field.position, 0);
        assert!(!field.is_required);
        assert!(!field.multiselect);
        assert_eq!(field.flag_name(), "summary");
    }

    #[test]
    fn test_field_type_wire_names() {
        let field: Field =
            serde_json::from_str(r#"{"name": "epic", "type": "static_select"}"#).unwrap();
        assert_eq!(field.field_type, FieldType::StaticSelect);
    }

    #[test]
    fn test_rest_requires_text() {
        let text = Field::new("msg", FieldType::Text).rest();
        let user = Field::new("who", FieldType::User).rest();
        assert!(text.is_rest());
        assert!(!user.is_rest());
    }

    #[test]
    fn test_value_untagged() {
        let scalar: Value = serde_json::from_str(r#""a""#).unwrap();
        let list: Value = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(scalar, Value::Scalar("a".into()));
        assert_eq!(list.tokens(), vec!["a", "b"]);
    }

    #[test]
    fn test_call_response_tagged() {
        let resp: CallResponse =
            serde_json::from_str(r#"{"type": "error", "text": "boom"}"#).unwrap();
        assert_eq!(
            resp,
            CallResponse::Error {
                text: Some("boom".into())
            }
        );
        assert_eq!(resp.type_name(), "error");
    }

    #[test]
    fn test_location_segment_falls_back_to_label() {
        let binding: Binding = serde_json::from_str(r#"{"label": "create"}"#).unwrap();
        assert_eq!(binding.location_segment(), "create");

        let binding = Binding::new("new").with_location("issue-create");
        assert_eq!(binding.location_segment(), "issue-create");
    }

    #[test]
    fn test_find_binding_ignores_case() {
        let bindings = vec![Binding::new("Jira"), Binding::new("other")];
        assert_eq!(find_binding(&bindings, "jira").unwrap().label, "Jira");
        assert!(find_binding(&bindings, "jir").is_none());
    }
}
