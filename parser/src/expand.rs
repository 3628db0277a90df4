//! Turns raw value tokens into typed values.

use std::collections::BTreeMap;

use app_command_core::{Field, FieldType, Form, SelectOption, TypedValue, Value};
use futures::future::join_all;
use tracing::debug;

use crate::backend::Directory;
use crate::error::ExpansionError;

/// Fills in default values.
///
/// Readonly fields always take their default; other fields take it only
/// when absent. Defaults of multiselect fields are stored as lists.
pub fn fill_defaults(form: &Form, values: &mut BTreeMap<String, Value>) {
    for field in &form.fields {
        let Some(default) = &field.value else {
            continue;
        };
        if !field.readonly && values.contains_key(&field.name) {
            continue;
        }
        let value = match default {
            Value::Scalar(token) if field.multiselect => Value::List(vec![token.clone()]),
            other => other.clone(),
        };
        values.insert(field.name.clone(), value);
    }
}

/// Expands every present value of `form` into its typed form.
///
/// Fields are expanded concurrently. Elements of one list are resolved in
/// order so a failure is attributed to the first offending element. All
/// failing fields are reported together, in form order.
pub async fn expand_values(
    form: &Form,
    values: &BTreeMap<String, Value>,
    directory: &dyn Directory,
    team_id: Option<&str>,
) -> Result<BTreeMap<String, TypedValue>, Vec<ExpansionError>> {
    let pending = form.fields.iter().filter_map(|field| {
        values
            .get(&field.name)
            .map(|value| expand_field(field, value, directory, team_id))
    });

    let mut expanded = BTreeMap::new();
    let mut errors = Vec::new();
    for result in join_all(pending).await {
        match result {
            Ok((name, typed)) => {
                expanded.insert(name, typed);
            }
            Err(err) => {
                debug!(field = err.field(), error = %err, "value expansion failed");
                errors.push(err);
            }
        }
    }

    if errors.is_empty() {
        Ok(expanded)
    } else {
        Err(errors)
    }
}

async fn expand_field(
    field: &Field,
    value: &Value,
    directory: &dyn Directory,
    team_id: Option<&str>,
) -> Result<(String, TypedValue), ExpansionError> {
    let resolver = match field.field_type {
        FieldType::Text => {
            let typed = match value {
                Value::Scalar(token) => TypedValue::Text(token.clone()),
                Value::List(items) => TypedValue::Texts(items.clone()),
            };
            return Ok((field.name.clone(), typed));
        }
        FieldType::Bool => {
            let typed = match value.as_scalar() {
                Some("true") => TypedValue::Bool(true),
                Some("false") => TypedValue::Bool(false),
                _ => {
                    return Err(ExpansionError::InvalidBool {
                        field: field.name.clone(),
                        value: value.tokens().join(", "),
                    });
                }
            };
            return Ok((field.name.clone(), typed));
        }
        FieldType::User => Resolver::User,
        FieldType::Channel => Resolver::Channel,
        FieldType::StaticSelect => Resolver::Static(&field.options),
        FieldType::DynamicSelect => Resolver::Dynamic,
    };

    let typed = match value {
        Value::Scalar(token) => {
            TypedValue::Option(resolver.resolve(field, token, directory, team_id).await?)
        }
        Value::List(items) => {
            let mut options: Vec<SelectOption> = Vec::with_capacity(items.len());
            for token in items {
                let option = resolver.resolve(field, token, directory, team_id).await?;
                if options.iter().any(|o| o.value == option.value) {
                    return Err(resolver.duplicate(field, token));
                }
                options.push(option);
            }
            TypedValue::Options(options)
        }
    };
    Ok((field.name.clone(), typed))
}

enum Resolver<'f> {
    User,
    Channel,
    Static(&'f [SelectOption]),
    Dynamic,
}

impl Resolver<'_> {
    async fn resolve(
        &self,
        field: &Field,
        token: &str,
        directory: &dyn Directory,
        team_id: Option<&str>,
    ) -> Result<SelectOption, ExpansionError> {
        let lookup_failed = |err: crate::error::BackendError| ExpansionError::Lookup {
            field: field.name.clone(),
            message: err.to_string(),
        };

        match self {
            Self::User => {
                let username = token.strip_prefix('@').unwrap_or(token);
                match directory.user_by_username(username).await.map_err(lookup_failed)? {
                    Some(user) => Ok(SelectOption::new(user.username, user.id)),
                    None => Err(ExpansionError::UnknownUser {
                        field: field.name.clone(),
                        username: token.to_string(),
                    }),
                }
            }
            Self::Channel => {
                let name = token.strip_prefix('~').unwrap_or(token);
                match directory
                    .channel_by_name(team_id, name)
                    .await
                    .map_err(lookup_failed)?
                {
                    Some(channel) => {
                        let label = if channel.display_name.is_empty() {
                            channel.name
                        } else {
                            channel.display_name
                        };
                        Ok(SelectOption::new(label, channel.id))
                    }
                    None => Err(ExpansionError::UnknownChannel {
                        field: field.name.clone(),
                        name: token.to_string(),
                    }),
                }
            }
            Self::Static(options) => options
                .iter()
                .find(|o| o.value == token)
                .cloned()
                .ok_or_else(|| ExpansionError::UnknownOption {
                    field: field.name.clone(),
                    option: token.to_string(),
                }),
            // The app validates dynamic values when the call is submitted.
            Self::Dynamic => Ok(SelectOption::new("", token)),
        }
    }

    fn duplicate(&self, field: &Field, token: &str) -> ExpansionError {
        let field = field.name.clone();
        match self {
            Self::User => ExpansionError::DuplicateUser {
                field,
                username: token.to_string(),
            },
            Self::Channel => ExpansionError::DuplicateChannel {
                field,
                name: token.to_string(),
            },
            Self::Static(_) | Self::Dynamic => ExpansionError::DuplicateOption {
                field,
                option: token.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use app_command_core::{Call, Channel, User};
    use async_trait::async_trait;

    use super::*;
    use crate::error::BackendError;

    struct Fixed;

    #[async_trait]
    impl Directory for Fixed {
        async fn user_by_username(&self, username: &str) -> Result<Option<User>, BackendError> {
            Ok((username == "alice").then(|| User {
                id: "u1".into(),
                username: "alice".into(),
            }))
        }

        async fn channel_by_name(
            &self,
            _team_id: Option<&str>,
            name: &str,
        ) -> Result<Option<Channel>, BackendError> {
            match name {
                "town" => Ok(Some(Channel {
                    id: "c1".into(),
                    name: "town".into(),
                    display_name: "Town Square".into(),
                    team_id: None,
                })),
                "down" => Err(BackendError::Transport("offline".into())),
                _ => Ok(None),
            }
        }
    }

    fn form() -> Form {
        Form::new(Call::new("/submit"))
            .with_field(Field::new("who", FieldType::User).multiselect())
            .with_field(Field::new("where", FieldType::Channel))
            .with_field(
                Field::new("epic", FieldType::StaticSelect)
                    .with_options(vec![SelectOption::new("Epic 1", "epic1")]),
            )
            .with_field(Field::new("tags", FieldType::Text).multiselect())
            .with_field(Field::new("dyn", FieldType::DynamicSelect))
            .with_field(Field::new("flag", FieldType::Bool))
            .with_field(Field::new("rooms", FieldType::Channel).multiselect())
            .with_field(
                Field::new("epics", FieldType::StaticSelect)
                    .multiselect()
                    .with_options(vec![
                        SelectOption::new("Epic 1", "epic1"),
                        SelectOption::new("Epic 2", "epic2"),
                    ]),
            )
            .with_field(Field::new("dyns", FieldType::DynamicSelect).multiselect())
    }

    fn values(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_expands_every_type() {
        let raw = values(&[
            ("who", list(&["@alice"])),
            ("where", Value::Scalar("~town".into())),
            ("epic", Value::Scalar("epic1".into())),
            ("tags", list(&["x", "x"])),
            ("dyn", Value::Scalar("anything".into())),
            ("flag", Value::Scalar("false".into())),
        ]);
        let typed = expand_values(&form(), &raw, &Fixed, None).await.unwrap();

        assert_eq!(
            typed["who"],
            TypedValue::Options(vec![SelectOption::new("alice", "u1")])
        );
        assert_eq!(
            typed["where"],
            TypedValue::Option(SelectOption::new("Town Square", "c1"))
        );
        assert_eq!(
            typed["epic"],
            TypedValue::Option(SelectOption::new("Epic 1", "epic1"))
        );
        assert_eq!(
            typed["tags"],
            TypedValue::Texts(vec!["x".into(), "x".into()])
        );
        assert_eq!(
            typed["dyn"],
            TypedValue::Option(SelectOption::new("", "anything"))
        );
        assert_eq!(typed["flag"], TypedValue::Bool(false));
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let raw = values(&[("who", list(&["@alice", "alice"]))]);
        let errors = expand_values(&form(), &raw, &Fixed, None).await.unwrap_err();
        assert_eq!(
            errors,
            vec![ExpansionError::DuplicateUser {
                field: "who".into(),
                username: "alice".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_duplicate_channel_and_options_rejected() {
        let raw = values(&[
            ("rooms", list(&["~town", "town"])),
            ("epics", list(&["epic1", "epic2", "epic1"])),
            ("dyns", list(&["x", "y", "x"])),
        ]);
        let errors = expand_values(&form(), &raw, &Fixed, None).await.unwrap_err();
        assert_eq!(
            errors,
            vec![
                ExpansionError::DuplicateChannel {
                    field: "rooms".into(),
                    name: "town".into()
                },
                ExpansionError::DuplicateOption {
                    field: "epics".into(),
                    option: "epic1".into()
                },
                ExpansionError::DuplicateOption {
                    field: "dyns".into(),
                    option: "x".into()
                },
            ]
        );
        assert_eq!(errors[0].kind(), crate::error::ErrorKind::DuplicateChannel);
        assert_eq!(errors[1].kind(), crate::error::ErrorKind::DuplicateOption);
    }

    #[tokio::test]
    async fn test_distinct_channels_and_options_accepted() {
        let raw = values(&[
            ("rooms", list(&["~town"])),
            ("epics", list(&["epic1", "epic2"])),
        ]);
        let typed = expand_values(&form(), &raw, &Fixed, None).await.unwrap();
        assert_eq!(
            typed["rooms"],
            TypedValue::Options(vec![SelectOption::new("Town Square", "c1")])
        );
        assert_eq!(
            typed["epics"],
            TypedValue::Options(vec![
                SelectOption::new("Epic 1", "epic1"),
                SelectOption::new("Epic 2", "epic2"),
            ])
        );
    }

    #[tokio::test]
    async fn test_errors_collected_across_fields() {
        let raw = values(&[
            ("who", list(&["@bob"])),
            ("where", Value::Scalar("~down".into())),
            ("epic", Value::Scalar("nope".into())),
        ]);
        let errors = expand_values(&form(), &raw, &Fixed, None).await.unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors[0],
            ExpansionError::UnknownUser {
                field: "who".into(),
                username: "@bob".into()
            }
        );
        assert!(matches!(errors[1], ExpansionError::Lookup { .. }));
        assert_eq!(
            errors[2],
            ExpansionError::UnknownOption {
                field: "epic".into(),
                option: "nope".into()
            }
        );
    }

    #[test]
    fn test_fill_defaults() {
        let form = Form::new(Call::new("/submit"))
            .with_field(Field::new("a", FieldType::Text).with_default(Value::Scalar("d".into())))
            .with_field(
                Field::new("b", FieldType::Text)
                    .readonly()
                    .with_default(Value::Scalar("fixed".into())),
            )
            .with_field(
                Field::new("c", FieldType::Text)
                    .multiselect()
                    .with_default(Value::Scalar("one".into())),
            );

        let mut raw = values(&[
            ("a", Value::Scalar("typed".into())),
            ("b", Value::Scalar("typed".into())),
        ]);
        fill_defaults(&form, &mut raw);

        assert_eq!(raw["a"], Value::Scalar("typed".into()));
        assert_eq!(raw["b"], Value::Scalar("fixed".into()));
        assert_eq!(raw["c"], list(&["one"]));
    }
}
