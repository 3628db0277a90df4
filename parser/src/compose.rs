//! Ambient call context and request composition helpers.

use std::collections::BTreeMap;

use app_command_core::{Binding, Call, CallContext, Field, Form, Value};
use serde::{Deserialize, Serialize};

use crate::forms::FormKey;

/// Where the command is being typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContext {
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    /// Thread root, when typing a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

impl CommandContext {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ..Default::default()
        }
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_root(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = Some(root_id.into());
        self
    }

    /// Builds the context attached to calls for the binding at `location`.
    pub fn call_context(&self, app_id: &str, location: &str) -> CallContext {
        CallContext {
            app_id: app_id.to_string(),
            location: location.to_string(),
            channel_id: Some(self.channel_id.clone()).filter(|id| !id.is_empty()),
            team_id: self.team_id.clone(),
            post_id: self.post_id.clone(),
            root_id: self.root_id.clone(),
        }
    }

    /// Form cache key for the binding at `location`.
    pub fn form_key(&self, location: &str) -> FormKey {
        FormKey::new(
            self.channel_id.as_str(),
            self.root_id.as_deref().unwrap_or_default(),
            location,
        )
    }
}

/// Returns the call a command submits to: the form's, else the binding's.
pub fn resolve_call(form: Option<&Form>, binding: &Binding) -> Option<Call> {
    form.and_then(|f| f.call.clone())
        .or_else(|| binding.call.clone())
}

/// Required fields without a value or a default, in form order.
///
/// An empty string or empty list does not count as a value.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use app_command_core::{Call, Field, FieldType, Form, Value};
/// use app_command_parser::missing_fields;
///
/// let form = Form::new(Call::new("/create"))
///     .with_field(Field::new("project", FieldType::Text).required())
///     .with_field(Field::new("summary", FieldType::Text).required());
///
/// let mut values = BTreeMap::new();
/// values.insert("summary".to_string(), Value::Scalar("Fix it".into()));
///
/// let missing: Vec<_> = missing_fields(&form, &values).iter().map(|f| f.name.as_str()).collect();
/// assert_eq!(missing, ["project"]);
/// ```
pub fn missing_fields<'f>(form: &'f Form, values: &BTreeMap<String, Value>) -> Vec<&'f Field> {
    form.fields
        .iter()
        .filter(|field| field.is_required)
        .filter(|field| values.get(&field.name).is_none_or(Value::is_empty))
        .filter(|field| field.value.as_ref().is_none_or(Value::is_empty))
        .collect()
}
