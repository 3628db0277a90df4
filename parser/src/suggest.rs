//! Autocomplete suggestions for partially typed commands.
//!
//! Suggestions reuse the state machine in [`ParseMode::Autocomplete`] and
//! look at where the scan stopped: typing a command token yields
//! subcommands, typing a flag yields flag names, and typing a value yields
//! candidates for the field's type.

use app_command_core::{
    AutocompleteSuggestion, CallRequest, CallResponse, CallType, Field, FieldType, Form,
    LookupResponse, SuggestionSource,
};
use tracing::{debug, warn};

use crate::compose::{missing_fields, resolve_call};
use crate::error::CommandError;
use crate::expand::{expand_values, fill_defaults};
use crate::parser::AppCommandParser;
use crate::state::{ParseMode, ParseState, ParsedCommand};

const EXECUTE_LABEL: &str = "Execute Current Command";
const EXECUTE_DESCRIPTION: &str =
    "Select this option or use Ctrl+Enter to execute the current command.";
const NO_MATCH: &str = "No matching suggestions.";
const NO_OPTIONS: &str = "No matching options.";
const NO_DATA: &str = "Received no data for dynamic suggestions.";

impl AppCommandParser {
    /// Returns the suggestions for `pretext`.
    ///
    /// The list is never empty unless the placeholder is disabled or a user
    /// or channel is being typed. Each `complete` is the whole replacement
    /// text for the input without the leading `/`.
    pub async fn get_suggestions(&self, pretext: &str) -> Vec<AutocompleteSuggestion> {
        let parsed = match self.parse(pretext, ParseMode::Autocomplete).await {
            Ok(parsed) => parsed,
            Err(err) => return vec![error_suggestion(pretext, &err.to_string())],
        };
        if let Some(err) = parsed.error() {
            debug!(error = %err, "autocomplete parse failed");
            return vec![error_suggestion(pretext, &err.kind.to_string())];
        }

        let mut suggestions = Vec::new();
        if *parsed.state() == ParseState::Command {
            suggestions.extend(command_suggestions(&parsed));
        }
        if let Some(form) = parsed.form() {
            suggestions.extend(self.parameter_suggestions(&parsed, form).await);
        }

        let execute = if self.config.execute_suggestion {
            execute_suggestion(&parsed)
        } else {
            None
        };
        if suggestions.is_empty()
            && execute.is_none()
            && self.config.no_match_placeholder
            && !typing_mention(&parsed)
        {
            suggestions.push(placeholder(NO_MATCH, ""));
        }

        let mut out: Vec<AutocompleteSuggestion> = execute
            .into_iter()
            .chain(suggestions.into_iter().map(|s| decorate(&parsed, s)))
            .collect();
        if let Some(max) = self.config.max_suggestions {
            out.truncate(max);
        }
        out
    }

    async fn parameter_suggestions(
        &self,
        parsed: &ParsedCommand<'_>,
        form: &Form,
    ) -> Vec<AutocompleteSuggestion> {
        let state = parsed.state();
        match state {
            ParseState::StartParameter => match next_positional(parsed, form) {
                Some(field) => self.value_suggestions(parsed, form, field, None).await,
                None => flag_suggestions(parsed, form),
            },
            ParseState::Flag => flag_suggestions(parsed, form),
            ParseState::Rest { .. } => vec![echo(parsed, None)],
            _ if state.is_value() || state.is_list_element() => match parsed.current_field() {
                Some(field) => {
                    self.value_suggestions(parsed, form, field, state.delimiter())
                        .await
                }
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    async fn value_suggestions(
        &self,
        parsed: &ParsedCommand<'_>,
        form: &Form,
        field: &Field,
        delimiter: Option<char>,
    ) -> Vec<AutocompleteSuggestion> {
        let listed = listed_tokens(parsed, field);
        let mut suggestions = match field.field_type {
            FieldType::Text => return vec![echo(parsed, delimiter)],
            FieldType::Bool => bool_suggestions(parsed, field),
            FieldType::StaticSelect => static_suggestions(parsed, field, delimiter),
            FieldType::DynamicSelect => {
                self.dynamic_suggestions(parsed, form, field, delimiter)
                    .await
            }
            FieldType::User => self.user_suggestions(parsed, field).await,
            FieldType::Channel => self.channel_suggestions(parsed, field).await,
        };
        if !listed.is_empty() {
            suggestions.retain(|s| !listed.contains(&listed_key(&s.source)));
        }
        suggestions
    }

    async fn dynamic_suggestions(
        &self,
        parsed: &ParsedCommand<'_>,
        form: &Form,
        field: &Field,
        delimiter: Option<char>,
    ) -> Vec<AutocompleteSuggestion> {
        let command = parsed.command();
        let Some(binding) = parsed.binding() else {
            return Vec::new();
        };
        let Some(call) = resolve_call(Some(form), binding) else {
            return vec![error_suggestion(command, "Error preparing lookup request.")];
        };

        let mut values = parsed.values().clone();
        fill_defaults(form, &mut values);
        let typed = match expand_values(
            form,
            &values,
            self.directory.as_ref(),
            self.context.team_id.as_deref(),
        )
        .await
        {
            Ok(typed) => typed,
            Err(errors) => {
                return vec![error_suggestion(
                    command,
                    &CommandError::Expansion(errors).to_string(),
                )];
            }
        };

        let mut request = CallRequest::new(
            call,
            self.context.call_context(parsed.app_id(), parsed.location()),
        );
        request.values = typed;
        request.raw_command = Some(command.to_string());
        request.selected_field = Some(field.name.clone());
        request.query = Some(parsed.incomplete().to_string());

        debug!(field = %field.name, query = parsed.incomplete(), "dynamic lookup");
        let items = match self.caller.perform_call(&request, CallType::Lookup).await {
            Ok(CallResponse::Ok { data, .. }) => {
                let response = data
                    .map(serde_json::from_value::<LookupResponse>)
                    .transpose();
                match response {
                    Ok(response) => response.unwrap_or_default().items,
                    Err(err) => {
                        return vec![error_suggestion(
                            command,
                            &format!("invalid lookup response: {err}"),
                        )];
                    }
                }
            }
            Ok(CallResponse::Error { text }) => {
                let message = text.unwrap_or_else(|| "Unknown error.".to_string());
                return vec![error_suggestion(command, &message)];
            }
            Ok(other) => {
                let message = format!(
                    "App response type was not expected. Response type: {}",
                    other.type_name()
                );
                return vec![error_suggestion(command, &message)];
            }
            Err(err) => {
                warn!(field = %field.name, error = %err, "dynamic lookup failed");
                return vec![error_suggestion(command, &err.to_string())];
            }
        };

        if items.is_empty() {
            return vec![placeholder(NO_DATA, "")];
        }
        let icon = binding_icon(parsed);
        items
            .into_iter()
            .map(|option| AutocompleteSuggestion {
                complete: wrap(&option.value, delimiter),
                suggestion: option.value.clone(),
                hint: String::new(),
                description: option.label.clone(),
                icon_data: option.icon_data.clone().unwrap_or_else(|| icon.clone()),
                source: SuggestionSource::DynamicOption { option },
            })
            .collect()
    }

    async fn user_suggestions(
        &self,
        parsed: &ParsedCommand<'_>,
        field: &Field,
    ) -> Vec<AutocompleteSuggestion> {
        let query = parsed.incomplete().trim();
        if query.is_empty() {
            return vec![mention_hint(parsed, field, "@username")];
        }
        let prefix = query.strip_prefix('@').unwrap_or(query);
        match self.directory.autocomplete_users(prefix).await {
            Ok(users) => users
                .into_iter()
                .map(|user| {
                    let mention = format!("@{}", user.username);
                    AutocompleteSuggestion {
                        complete: mention.clone(),
                        suggestion: mention,
                        hint: String::new(),
                        description: field.description.clone().unwrap_or_default(),
                        icon_data: binding_icon(parsed),
                        source: SuggestionSource::User {
                            user_id: user.id,
                            username: user.username,
                        },
                    }
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "user autocomplete failed");
                Vec::new()
            }
        }
    }

    async fn channel_suggestions(
        &self,
        parsed: &ParsedCommand<'_>,
        field: &Field,
    ) -> Vec<AutocompleteSuggestion> {
        let query = parsed.incomplete().trim();
        if query.is_empty() {
            return vec![mention_hint(parsed, field, "~channelname")];
        }
        let prefix = query.strip_prefix('~').unwrap_or(query);
        let team_id = self.context.team_id.as_deref();
        match self.directory.autocomplete_channels(team_id, prefix).await {
            Ok(channels) => channels
                .into_iter()
                .map(|channel| {
                    let mention = format!("~{}", channel.name);
                    AutocompleteSuggestion {
                        complete: mention.clone(),
                        suggestion: mention,
                        hint: String::new(),
                        description: channel.display_name.clone(),
                        icon_data: binding_icon(parsed),
                        source: SuggestionSource::Channel {
                            channel_id: channel.id,
                            name: channel.name,
                        },
                    }
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "channel autocomplete failed");
                Vec::new()
            }
        }
    }
}

fn command_suggestions(parsed: &ParsedCommand<'_>) -> Vec<AutocompleteSuggestion> {
    let prefix = parsed.incomplete().to_lowercase();
    let top_level = parsed.binding().is_none();
    parsed
        .candidates()
        .iter()
        .filter(|b| b.label.to_lowercase().starts_with(&prefix))
        .map(|b| AutocompleteSuggestion {
            complete: b.label.clone(),
            suggestion: if top_level {
                format!("/{}", b.label)
            } else {
                b.label.clone()
            },
            hint: b.hint.clone().unwrap_or_default(),
            description: b.description.clone().unwrap_or_default(),
            icon_data: b.icon.clone().unwrap_or_default(),
            source: SuggestionSource::Command {
                label: b.label.clone(),
            },
        })
        .collect()
}

fn flag_suggestions(parsed: &ParsedCommand<'_>, form: &Form) -> Vec<AutocompleteSuggestion> {
    // Zero to two dashes were already typed before the flag name.
    let typed = parsed.text_before(parsed.incomplete_start());
    let dashes = typed.chars().rev().take(2).take_while(|c| *c == '-').count();
    let prefix = &"--"[dashes..];
    let query = parsed.incomplete().to_lowercase();

    form.fields
        .iter()
        .filter(|f| !f.readonly && !parsed.values().contains_key(&f.name))
        .filter(|f| f.flag_name().to_lowercase().starts_with(&query))
        .map(|f| {
            let mut complete = format!("{prefix}{}", f.flag_name());
            if f.multiselect {
                complete.push_str(" [");
            }
            AutocompleteSuggestion {
                complete,
                suggestion: format!("--{}", f.flag_name()),
                hint: f.hint.clone().unwrap_or_default(),
                description: f.description.clone().unwrap_or_default(),
                icon_data: binding_icon(parsed),
                source: SuggestionSource::Flag {
                    field: f.name.clone(),
                },
            }
        })
        .collect()
}

fn bool_suggestions(parsed: &ParsedCommand<'_>, field: &Field) -> Vec<AutocompleteSuggestion> {
    ["true", "false"]
        .into_iter()
        .filter(|literal| literal.starts_with(parsed.incomplete()))
        .map(|literal| AutocompleteSuggestion {
            complete: literal.to_string(),
            suggestion: literal.to_string(),
            hint: field.hint.clone().unwrap_or_default(),
            description: field.description.clone().unwrap_or_default(),
            icon_data: binding_icon(parsed),
            source: SuggestionSource::Literal {
                value: literal.to_string(),
            },
        })
        .collect()
}

fn static_suggestions(
    parsed: &ParsedCommand<'_>,
    field: &Field,
    delimiter: Option<char>,
) -> Vec<AutocompleteSuggestion> {
    let query = parsed.incomplete().to_lowercase();
    let matching: Vec<_> = field
        .options
        .iter()
        .filter(|o| o.label.to_lowercase().starts_with(&query))
        .collect();
    if matching.is_empty() {
        return vec![placeholder(NO_OPTIONS, "")];
    }
    matching
        .into_iter()
        .map(|option| AutocompleteSuggestion {
            complete: wrap(&option.value, delimiter),
            suggestion: option.label.clone(),
            hint: field.hint.clone().unwrap_or_default(),
            description: field.description.clone().unwrap_or_default(),
            icon_data: option
                .icon_data
                .clone()
                .unwrap_or_else(|| binding_icon(parsed)),
            source: SuggestionSource::StaticOption {
                option: option.clone(),
            },
        })
        .collect()
}

fn echo(parsed: &ParsedCommand<'_>, delimiter: Option<char>) -> AutocompleteSuggestion {
    let text = parsed.incomplete();
    let field = parsed.current_field();
    let description = field
        .and_then(|f| f.description.clone())
        .unwrap_or_default();
    if text.is_empty() {
        let hint = field.and_then(|f| f.hint.clone()).unwrap_or_default();
        return placeholder(&description, &hint);
    }
    AutocompleteSuggestion {
        complete: match delimiter {
            Some(d) => format!("{d}{text}{d}"),
            None => text.to_string(),
        },
        suggestion: text.to_string(),
        hint: String::new(),
        description,
        icon_data: binding_icon(parsed),
        source: SuggestionSource::Literal {
            value: text.to_string(),
        },
    }
}

fn mention_hint(parsed: &ParsedCommand<'_>, field: &Field, default_hint: &str) -> AutocompleteSuggestion {
    AutocompleteSuggestion {
        icon_data: binding_icon(parsed),
        ..placeholder(
            field.description.as_deref().unwrap_or_default(),
            field.hint.as_deref().unwrap_or(default_hint),
        )
    }
}

fn execute_suggestion(parsed: &ParsedCommand<'_>) -> Option<AutocompleteSuggestion> {
    let executable = match parsed.state() {
        ParseState::Command => parsed.incomplete().is_empty(),
        ParseState::EndCommand
        | ParseState::CommandSeparator
        | ParseState::StartParameter
        | ParseState::ParameterSeparator
        | ParseState::EndMultiselect { .. }
        | ParseState::Rest { .. } => true,
        _ => false,
    };
    let binding = parsed.binding()?;
    if !executable || !binding.is_leaf() {
        return None;
    }
    let form = parsed.form().map(|f| f.as_ref());
    resolve_call(form, binding)?;
    if form.is_some_and(|f| !missing_fields(f, parsed.values()).is_empty()) {
        return None;
    }

    let command = parsed.command();
    Some(AutocompleteSuggestion {
        complete: command.strip_prefix('/').unwrap_or(command).to_string(),
        suggestion: EXECUTE_LABEL.to_string(),
        hint: String::new(),
        description: EXECUTE_DESCRIPTION.to_string(),
        icon_data: binding.icon.clone().unwrap_or_default(),
        source: SuggestionSource::Execute,
    })
}

/// Splices a suggestion's completion over the token being typed.
fn decorate(parsed: &ParsedCommand<'_>, mut suggestion: AutocompleteSuggestion) -> AutocompleteSuggestion {
    if matches!(suggestion.source, SuggestionSource::Error { .. }) {
        return suggestion;
    }
    let back = usize::from(suggestion.complete.is_empty());
    let mut complete = parsed.text_before(parsed.incomplete_start().saturating_sub(back));
    complete.push_str(if suggestion.complete.is_empty() {
        &suggestion.suggestion
    } else {
        &suggestion.complete
    });
    suggestion.complete = match complete.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => complete,
    };
    suggestion
}

fn next_positional<'f>(parsed: &ParsedCommand<'_>, form: &'f Form) -> Option<&'f Field> {
    form.positional(parsed.positional_index() + 1)
        .filter(|f| !parsed.values().contains_key(&f.name))
}

// The field whose value is being typed is a user or channel reference.
fn typing_mention(parsed: &ParsedCommand<'_>) -> bool {
    let field = match parsed.state() {
        ParseState::StartParameter => parsed
            .form()
            .and_then(|form| next_positional(parsed, form)),
        _ => parsed.current_field(),
    };
    field.is_some_and(|f| matches!(f.field_type, FieldType::User | FieldType::Channel))
}

fn listed_tokens(parsed: &ParsedCommand<'_>, field: &Field) -> Vec<String> {
    if !parsed.state().is_list_element() {
        return Vec::new();
    }
    parsed
        .values()
        .get(&field.name)
        .map(|value| value.tokens().into_iter().map(normalize_mention).collect())
        .unwrap_or_default()
}

fn listed_key(source: &SuggestionSource) -> String {
    match source {
        SuggestionSource::User { username, .. } => username.clone(),
        SuggestionSource::Channel { name, .. } => name.clone(),
        SuggestionSource::StaticOption { option } | SuggestionSource::DynamicOption { option } => {
            option.value.clone()
        }
        SuggestionSource::Literal { value } => value.clone(),
        _ => String::new(),
    }
}

fn normalize_mention(token: &str) -> String {
    token.trim_start_matches(['@', '~']).to_string()
}

fn binding_icon(parsed: &ParsedCommand<'_>) -> String {
    parsed
        .binding()
        .and_then(|b| b.icon.clone())
        .unwrap_or_default()
}

fn wrap(value: &str, delimiter: Option<char>) -> String {
    match delimiter {
        Some(d) => format!("{d}{value}{d}"),
        None if value.contains([' ', '\t']) => format!("`{value}`"),
        None => value.to_string(),
    }
}

fn placeholder(description: &str, hint: &str) -> AutocompleteSuggestion {
    AutocompleteSuggestion {
        complete: String::new(),
        suggestion: String::new(),
        hint: hint.to_string(),
        description: description.to_string(),
        icon_data: String::new(),
        source: SuggestionSource::Placeholder,
    }
}

fn error_suggestion(command: &str, message: &str) -> AutocompleteSuggestion {
    AutocompleteSuggestion {
        complete: command.strip_prefix('/').unwrap_or(command).to_string(),
        source: SuggestionSource::Error {
            message: message.to_string(),
        },
        ..placeholder(&format!("Error: {message}"), "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_multiword() {
        assert_eq!(wrap("a b", None), "`a b`");
        assert_eq!(wrap("ab", None), "ab");
        assert_eq!(wrap("a b", Some('"')), "\"a b\"");
    }

    #[test]
    fn test_decorate_replaces_incomplete_token() {
        let parsed = ParsedCommand::new("/jira cre");
        let bindings = vec![app_command_core::Binding::new("jira")
            .with_binding(app_command_core::Binding::new("create"))];
        let parsed = parsed.match_binding(&bindings, ParseMode::Autocomplete);

        let suggestion = decorate(
            &parsed,
            AutocompleteSuggestion {
                complete: "create".into(),
                ..placeholder("", "")
            },
        );
        assert_eq!(suggestion.complete, "jira create");

        let empty = decorate(&parsed, placeholder("", ""));
        assert_eq!(empty.complete, "jira");
    }

    #[test]
    fn test_error_suggestion_keeps_input() {
        let s = error_suggestion("/jira x", "boom");
        assert_eq!(s.complete, "jira x");
        assert_eq!(s.description, "Error: boom");
    }

    #[test]
    fn test_decorate_leaves_errors_alone() {
        let bindings = vec![app_command_core::Binding::new("jira")
            .with_binding(app_command_core::Binding::new("create"))];
        let parsed =
            ParsedCommand::new("/jira cre").match_binding(&bindings, ParseMode::Autocomplete);

        let decorated = decorate(&parsed, error_suggestion(parsed.command(), "boom"));
        assert_eq!(decorated.complete, "jira cre");
    }
}
