//! Fixture-backed collaborators.
//!
//! [`StaticBackend`] answers form, lookup and submit calls and directory
//! queries from a [`Fixtures`] document, so the parser can run without a
//! server.
//!
//! # Example JSON
//!
//! ```json
//! {
//!   "forms": { "/view-form": { "call": { "path": "/view" }, "fields": [] } },
//!   "lookups": { "component": [{ "label": "Backend", "value": "be" }] },
//!   "responses": { "/create": { "type": "ok", "text": "Created" } },
//!   "users": [{ "id": "u1", "username": "alice" }],
//!   "channels": [{ "id": "c1", "name": "town-square", "team_id": "core" }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use app_command_core::{
    CallRequest, CallResponse, CallType, Channel, Form, LookupResponse, SelectOption, User,
};
use app_command_parser::{AppCaller, BackendError, Directory};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Canned data served by a [`StaticBackend`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    /// Forms returned for form calls, keyed by call path.
    pub forms: BTreeMap<String, Form>,
    /// Lookup items, keyed by the name of the looked-up field.
    pub lookups: BTreeMap<String, Vec<SelectOption>>,
    /// Submit responses, keyed by call path.
    pub responses: BTreeMap<String, CallResponse>,
    pub users: Vec<User>,
    pub channels: Vec<Channel>,
}

impl Fixtures {
    /// Loads fixtures from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, or [`JsonError`](crate::DatabaseError::JsonError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// [`AppCaller`] and [`Directory`] over in-memory [`Fixtures`].
///
/// Form calls for unknown paths and submits without a canned response
/// answer with an error response. Lookups filter items by the request's
/// query, matching label or value prefixes without regard to case.
///
/// # Examples
///
/// ```
/// use app_command_core::*;
/// use app_command_db::{Fixtures, StaticBackend};
/// use app_command_parser::AppCaller;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut fixtures = Fixtures::default();
/// fixtures.responses.insert(
///     "/create".into(),
///     CallResponse::Ok { text: Some("Created".into()), data: None },
/// );
/// let backend = StaticBackend::new(fixtures);
///
/// let context = CallContext { app_id: "jira".into(), location: "/jira/create".into(), ..Default::default() };
/// let request = CallRequest::new(Call::new("/create"), context);
/// let response = backend.perform_call(&request, CallType::Submit).await.unwrap();
/// assert_eq!(response.type_name(), "ok");
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticBackend {
    fixtures: Fixtures,
}

impl StaticBackend {
    pub fn new(fixtures: Fixtures) -> Self {
        Self { fixtures }
    }

    /// Loads a backend from a fixtures JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Fixtures::load(path).map(Self::new)
    }

    pub fn fixtures(&self) -> &Fixtures {
        &self.fixtures
    }

    fn lookup(&self, request: &CallRequest) -> std::result::Result<CallResponse, BackendError> {
        let Some(field) = request.selected_field.as_deref() else {
            return Ok(error_response("lookup without a selected field"));
        };
        let query = request.query.as_deref().unwrap_or_default().to_lowercase();
        let items: Vec<SelectOption> = self
            .fixtures
            .lookups
            .get(field)
            .into_iter()
            .flatten()
            .filter(|option| {
                option.label.to_lowercase().starts_with(&query)
                    || option.value.to_lowercase().starts_with(&query)
            })
            .cloned()
            .collect();

        let data = serde_json::to_value(LookupResponse { items })
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(CallResponse::Ok {
            text: None,
            data: Some(data),
        })
    }
}

fn error_response(text: impl Into<String>) -> CallResponse {
    CallResponse::Error {
        text: Some(text.into()),
    }
}

#[async_trait]
impl AppCaller for StaticBackend {
    async fn perform_call(
        &self,
        request: &CallRequest,
        call_type: CallType,
    ) -> std::result::Result<CallResponse, BackendError> {
        let path = request.call.path.as_str();
        debug!(path, ?call_type, location = %request.context.location, "static call");
        match call_type {
            CallType::Form => Ok(match self.fixtures.forms.get(path) {
                Some(form) => CallResponse::Form { form: form.clone() },
                None => error_response(format!("no form for `{path}`")),
            }),
            CallType::Lookup => self.lookup(request),
            CallType::Submit => Ok(self
                .fixtures
                .responses
                .get(path)
                .cloned()
                .unwrap_or_else(|| error_response(format!("no response for `{path}`")))),
        }
    }
}

#[async_trait]
impl Directory for StaticBackend {
    async fn user_by_username(
        &self,
        username: &str,
    ) -> std::result::Result<Option<User>, BackendError> {
        Ok(self
            .fixtures
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn channel_by_name(
        &self,
        team_id: Option<&str>,
        name: &str,
    ) -> std::result::Result<Option<Channel>, BackendError> {
        Ok(self
            .fixtures
            .channels
            .iter()
            .find(|c| in_team(c, team_id) && c.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn autocomplete_users(
        &self,
        prefix: &str,
    ) -> std::result::Result<Vec<User>, BackendError> {
        let prefix = prefix.to_lowercase();
        Ok(self
            .fixtures
            .users
            .iter()
            .filter(|u| u.username.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn autocomplete_channels(
        &self,
        team_id: Option<&str>,
        prefix: &str,
    ) -> std::result::Result<Vec<Channel>, BackendError> {
        let prefix = prefix.to_lowercase();
        Ok(self
            .fixtures
            .channels
            .iter()
            .filter(|c| in_team(c, team_id) && c.name.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect())
    }
}

/// Channels without a team are visible from every team.
fn in_team(channel: &Channel, team_id: Option<&str>) -> bool {
    match (channel.team_id.as_deref(), team_id) {
        (Some(channel_team), Some(team)) => channel_team == team,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_command_core::{Call, CallContext};

    fn fixtures() -> Fixtures {
        serde_json::from_str(
            r#"{
                "forms": { "/view-form": { "call": { "path": "/view" } } },
                "lookups": { "component": [
                    { "label": "Backend", "value": "be" },
                    { "label": "Frontend", "value": "fe" }
                ] },
                "users": [
                    { "id": "u1", "username": "alice" },
                    { "id": "u2", "username": "albert" },
                    { "id": "u3", "username": "bob" }
                ],
                "channels": [
                    { "id": "c1", "name": "town-square", "team_id": "core" },
                    { "id": "c2", "name": "town-square", "team_id": "ops" },
                    { "id": "c3", "name": "off-topic" }
                ]
            }"#,
        )
        .unwrap()
    }

    fn request(path: &str) -> CallRequest {
        let context = CallContext {
            app_id: "jira".into(),
            location: "/jira/view".into(),
            ..Default::default()
        };
        CallRequest::new(Call::new(path), context)
    }

    #[tokio::test]
    async fn test_form_call() {
        let backend = StaticBackend::new(fixtures());
        let response = backend
            .perform_call(&request("/view-form"), CallType::Form)
            .await
            .unwrap();
        assert!(matches!(response, CallResponse::Form { form } if form.call.as_ref().is_some_and(|c| c.path == "/view")));

        let missing = backend
            .perform_call(&request("/nope"), CallType::Form)
            .await
            .unwrap();
        assert_eq!(missing.type_name(), "error");
    }

    #[tokio::test]
    async fn test_lookup_filters_by_query() {
        let backend = StaticBackend::new(fixtures());
        let mut lookup = request("/create");
        lookup.selected_field = Some("component".into());
        lookup.query = Some("f".into());

        let response = backend.perform_call(&lookup, CallType::Lookup).await.unwrap();
        let CallResponse::Ok { data: Some(data), .. } = response else {
            panic!("expected ok response with data");
        };
        let items: LookupResponse = serde_json::from_value(data).unwrap();
        assert_eq!(items.items, vec![SelectOption::new("Frontend", "fe")]);
    }

    #[tokio::test]
    async fn test_submit_without_response_is_error() {
        let backend = StaticBackend::new(fixtures());
        let response = backend
            .perform_call(&request("/create"), CallType::Submit)
            .await
            .unwrap();
        assert_eq!(
            response,
            CallResponse::Error {
                text: Some("no response for `/create`".into())
            }
        );
    }

    #[tokio::test]
    async fn test_directory_lookups() {
        let backend = StaticBackend::new(fixtures());

        let alice = backend.user_by_username("Alice").await.unwrap().unwrap();
        assert_eq!(alice.id, "u1");
        assert!(backend.user_by_username("carol").await.unwrap().is_none());

        let ops = backend
            .channel_by_name(Some("ops"), "town-square")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ops.id, "c2");
        let any = backend.channel_by_name(None, "off-topic").await.unwrap();
        assert_eq!(any.map(|c| c.id), Some("c3".to_string()));
    }

    #[tokio::test]
    async fn test_autocomplete() {
        let backend = StaticBackend::new(fixtures());

        let users = backend.autocomplete_users("al").await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["alice", "albert"]);

        let channels = backend.autocomplete_channels(Some("core"), "").await.unwrap();
        let ids: Vec<_> = channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c3"]);
    }
}
