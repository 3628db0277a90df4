//! Slash-command parser and autocomplete engine for app bindings.
//!
//! [`AppCommandParser`] turns text such as `/jira issue create --project KEY`
//! into a typed [`CallRequest`](app_command_core::CallRequest), or, while the
//! user is still typing, into a list of
//! [`AutocompleteSuggestion`](app_command_core::AutocompleteSuggestion)s.
//!
//! The parser is driven by a binding tree published by apps. Remote work
//! (form fetches, dynamic lookups, user and channel resolution) goes through
//! the [`AppCaller`] and [`Directory`] traits, so callers plug in their own
//! transport.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use app_command_core::*;
//! use app_command_parser::*;
//! use async_trait::async_trait;
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl AppCaller for Offline {
//!     async fn perform_call(&self, _: &CallRequest, _: CallType) -> Result<CallResponse, BackendError> {
//!         Err(BackendError::Transport("offline".into()))
//!     }
//! }
//!
//! #[async_trait]
//! impl Directory for Offline {
//!     async fn user_by_username(&self, _: &str) -> Result<Option<User>, BackendError> {
//!         Ok(None)
//!     }
//!     async fn channel_by_name(&self, _: Option<&str>, _: &str) -> Result<Option<Channel>, BackendError> {
//!         Ok(None)
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let form = Form::new(Call::new("/create"))
//!     .with_field(Field::new("project", FieldType::Text).required());
//! let tree = vec![Binding::new("jira")
//!     .with_app_id("jira")
//!     .with_binding(Binding::new("create").with_form(form))];
//!
//! let parser = AppCommandParser::new(tree, Arc::new(Offline), Arc::new(Offline), CommandContext::new("town"));
//! let request = parser.compose_call_from_command("/jira create --project KEY-1").await.unwrap();
//! assert_eq!(request.values["project"], TypedValue::Text("KEY-1".into()));
//! assert_eq!(request.context.location, "/jira/create");
//! # }
//! ```

mod backend;
mod compose;
mod config;
mod error;
mod expand;
mod forms;
mod parser;
mod state;
mod suggest;

pub use backend::{AppCaller, Directory};
pub use compose::{CommandContext, missing_fields, resolve_call};
pub use config::ParserConfig;
pub use error::{
    BackendError, CommandError, ErrorKind, ExpansionError, FormError, ParseError, ParseErrorKind,
};
pub use expand::{expand_values, fill_defaults};
pub use forms::{FormCache, FormKey, FormSource, fetch_form};
pub use parser::AppCommandParser;
pub use state::{ParseMode, ParseState, ParsedCommand};
