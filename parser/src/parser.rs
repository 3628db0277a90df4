use std::sync::Arc;

use app_command_core::{Binding, CallRequest, Form};
use tracing::{debug, info};

use crate::backend::{AppCaller, Directory};
use crate::compose::{CommandContext, missing_fields, resolve_call};
use crate::config::ParserConfig;
use crate::error::{CommandError, FormError};
use crate::expand::{expand_values, fill_defaults};
use crate::forms::{FormCache, FormSource};
use crate::state::{ParseMode, ParsedCommand};

/// Parses slash commands against a binding tree.
///
/// Holds a read-only snapshot of the tree, the collaborators used for form
/// fetches and lookups, and the context the command is typed in. Each call
/// to [`parse`](Self::parse) works on its own [`ParsedCommand`].
pub struct AppCommandParser {
    bindings: Arc<Vec<Binding>>,
    pub(crate) forms: Arc<dyn FormSource>,
    pub(crate) caller: Arc<dyn AppCaller>,
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) context: CommandContext,
    pub(crate) config: ParserConfig,
}

impl AppCommandParser {
    /// Creates a parser with an in-memory [`FormCache`] over `caller`.
    pub fn new(
        bindings: Vec<Binding>,
        caller: Arc<dyn AppCaller>,
        directory: Arc<dyn Directory>,
        context: CommandContext,
    ) -> Self {
        Self {
            bindings: Arc::new(bindings),
            forms: Arc::new(FormCache::new(Arc::clone(&caller))),
            caller,
            directory,
            context,
            config: ParserConfig::default(),
        }
    }

    /// Replaces the form source.
    pub fn with_form_source(mut self, forms: Arc<dyn FormSource>) -> Self {
        self.forms = forms;
        self
    }

    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Swaps in a new binding tree snapshot.
    pub fn set_bindings(&mut self, bindings: Vec<Binding>) {
        info!(count = bindings.len(), "binding tree replaced");
        self.bindings = Arc::new(bindings);
    }

    /// Moves the parser to another channel or thread.
    pub fn set_channel_context(&mut self, channel_id: impl Into<String>, root_id: Option<String>) {
        self.context.channel_id = channel_id.into();
        self.context.root_id = root_id;
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Returns `true` once `pretext` starts with a known top-level command
    /// followed by whitespace.
    pub fn is_app_command(&self, pretext: &str) -> bool {
        let text = pretext.to_lowercase();
        let Some(rest) = text.strip_prefix('/') else {
            return false;
        };
        self.bindings.iter().any(|binding| {
            rest.strip_prefix(&binding.label.to_lowercase())
                .and_then(|after| after.chars().next())
                .is_some_and(char::is_whitespace)
        })
    }

    /// Runs the state machine over `command`.
    ///
    /// Grammar errors end up in the returned command's state; `Err` is only
    /// returned when the form of the matched binding could not be fetched.
    pub async fn parse<'a>(
        &'a self,
        command: &'a str,
        mode: ParseMode,
    ) -> Result<ParsedCommand<'a>, FormError> {
        let mut parsed = ParsedCommand::new(command).match_binding(&self.bindings, mode);
        if mode == ParseMode::Execute {
            parsed = parsed.require_leaf();
        }
        if parsed.is_error() {
            return Ok(parsed);
        }

        if let Some(binding) = parsed.binding() {
            debug!(location = parsed.location(), "resolved binding");
            if let Some(form) = self
                .resolve_form(binding, parsed.app_id(), parsed.location())
                .await?
            {
                parsed = parsed.with_form(form);
            }
        }
        Ok(parsed.parse_form(mode))
    }

    async fn resolve_form(
        &self,
        binding: &Binding,
        app_id: &str,
        location: &str,
    ) -> Result<Option<Arc<Form>>, FormError> {
        if let Some(form) = &binding.form {
            return Ok(Some(Arc::new(form.clone())));
        }
        if !binding.is_leaf() || binding.call.is_none() {
            return Ok(None);
        }

        let key = self.context.form_key(location);
        if let Some(form) = self.forms.get(&key) {
            return Ok(Some(form));
        }
        let context = self.context.call_context(app_id, location);
        self.forms.fetch(&key, binding, &context).await.map(Some)
    }

    /// Turns a complete command into a call request.
    ///
    /// Parses in execute mode, fills defaults, expands every value and
    /// checks required fields, in that order.
    pub async fn compose_call_from_command(
        &self,
        command: &str,
    ) -> Result<CallRequest, CommandError> {
        let parsed = self.parse(command, ParseMode::Execute).await?.into_result()?;
        let location = parsed.location().to_string();
        let Some(binding) = parsed.binding() else {
            return Err(CommandError::MissingCall { location });
        };
        let form = parsed.form().cloned();
        let call = resolve_call(form.as_deref(), binding)
            .ok_or_else(|| CommandError::MissingCall {
                location: location.clone(),
            })?;

        let mut request = CallRequest::new(call, self.context.call_context(parsed.app_id(), &location));
        request.raw_command = Some(command.to_string());

        if let Some(form) = form {
            let mut values = parsed.values().clone();
            fill_defaults(&form, &mut values);
            request.values = expand_values(
                &form,
                &values,
                self.directory.as_ref(),
                self.context.team_id.as_deref(),
            )
            .await
            .map_err(CommandError::Expansion)?;

            let missing = missing_fields(&form, &values);
            if !missing.is_empty() {
                return Err(CommandError::RequiredFieldsMissing(
                    missing.iter().map(|f| f.flag_name().to_string()).collect(),
                ));
            }
        }

        debug!(location = %location, path = %request.call.path, "composed call");
        Ok(request)
    }
}
