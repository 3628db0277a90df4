//! Collaborator capabilities the parser calls out to.
//!
//! The parser never talks to the network itself. Remote form fetches and
//! dynamic lookups go through an [`AppCaller`]; user and channel names are
//! resolved through a [`Directory`].

use app_command_core::{CallRequest, CallResponse, CallType, Channel, User};
use async_trait::async_trait;

use crate::error::BackendError;

/// Performs calls against the app that owns a binding.
#[async_trait]
pub trait AppCaller: Send + Sync {
    async fn perform_call(
        &self,
        request: &CallRequest,
        call_type: CallType,
    ) -> Result<CallResponse, BackendError>;
}

/// Resolves user and channel references.
///
/// `Ok(None)` means the name is unknown; `Err` means the lookup itself
/// failed.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, BackendError>;

    async fn channel_by_name(
        &self,
        team_id: Option<&str>,
        name: &str,
    ) -> Result<Option<Channel>, BackendError>;

    /// Users whose username starts with `prefix`, for suggestions.
    async fn autocomplete_users(&self, _prefix: &str) -> Result<Vec<User>, BackendError> {
        Ok(Vec::new())
    }

    /// Channels whose name starts with `prefix`, for suggestions.
    async fn autocomplete_channels(
        &self,
        _team_id: Option<&str>,
        _prefix: &str,
    ) -> Result<Vec<Channel>, BackendError> {
        Ok(Vec::new())
    }
}
