//! Binding tree and form validation.
//!
//! Validates structural invariants of binding trees and forms, catching
//! errors such as duplicate labels, clashing positional indices and more than
//! one rest field before the parser trips over them.
//!
//! # Examples
//!
//! ```
//! use app_command_core::*;
//!
//! let form = Form::new(Call::new("/create"))
//!     .with_field(Field::new("issue", FieldType::Text).at_position(1));
//! assert!(validate_form(&form).is_empty());
//!
//! // Invalid: two fields share position 1
//! let bad = form.clone().with_field(Field::new("other", FieldType::Text).at_position(1));
//! assert!(!validate_form(&bad).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{Binding, BindingPackage, FieldType, Form, REST_POSITION};

/// Binding/form validation errors.
///
/// Each variant describes a specific structural problem found during
/// validation. The `Display` impl provides a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Package version string is empty.
    #[error("package version cannot be empty")]
    EmptyPackageVersion,
    /// Binding label is empty or whitespace-only.
    #[error("binding label cannot be empty at path: {0}")]
    EmptyBindingLabel(String),
    /// Binding label contains whitespace and can never be typed as one token.
    #[error("binding label contains whitespace: {0}")]
    WhitespaceInLabel(String),
    /// Two bindings on the same level share a label (ignoring case).
    #[error("duplicate binding at path: {0}")]
    DuplicateBinding(String),
    /// A field has an empty name.
    #[error("field name cannot be empty")]
    EmptyFieldName,
    /// Two fields share a name.
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    /// Two fields share a flag label (ignoring case).
    #[error("duplicate flag label: {0}")]
    DuplicateFlag(String),
    /// Two fields share a positional index.
    #[error("duplicate position {position} on field: {field}")]
    DuplicatePosition { field: String, position: i32 },
    /// Position is neither positive, zero nor the rest marker.
    #[error("invalid position {position} on field: {field}")]
    InvalidPosition { field: String, position: i32 },
    /// A rest field whose type is not text.
    #[error("rest field must be text: {0}")]
    RestFieldNotText(String),
    /// More than one rest field.
    #[error("multiple rest fields: {0}")]
    MultipleRestFields(String),
    /// A boolean field marked multiselect.
    #[error("boolean field cannot be multiselect: {0}")]
    MultiselectBool(String),
    /// A static select field without any options.
    #[error("static select has no options: {0}")]
    MissingOptions(String),
}

/// Validates a binding package.
///
/// Checks for an empty version string and validates the bindings it carries.
pub fn validate_package(package: &BindingPackage) -> Vec<ValidationError> {
    if package.version.trim().is_empty() {
        return vec![ValidationError::EmptyPackageVersion];
    }
    validate_bindings(&package.bindings)
}

/// Validates a binding tree.
///
/// Checks labels on every level and validates every inline form. Stops at
/// the first problem.
///
/// # Examples
///
/// ```
/// use app_command_core::*;
///
/// let tree = vec![Binding::new("jira").with_binding(Binding::new("create"))];
/// assert!(validate_bindings(&tree).is_empty());
///
/// let dup = vec![Binding::new("jira"), Binding::new("JIRA")];
/// let errors = validate_bindings(&dup);
/// assert!(matches!(errors[0], ValidationError::DuplicateBinding(_)));
/// ```
pub fn validate_bindings(bindings: &[Binding]) -> Vec<ValidationError> {
    let mut path = Vec::new();
    validate_level(bindings, &mut path)
}

fn validate_level(bindings: &[Binding], path: &mut Vec<String>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for binding in bindings {
        let label = binding.label.trim();
        if label.is_empty() {
            errors.push(ValidationError::EmptyBindingLabel(display_path(path, "")));
            return errors;
        }
        if binding.label.chars().any(char::is_whitespace) {
            errors.push(ValidationError::WhitespaceInLabel(binding.label.clone()));
            return errors;
        }
        if !seen.insert(label.to_lowercase()) {
            errors.push(ValidationError::DuplicateBinding(display_path(path, label)));
            return errors;
        }

        if let Some(form) = &binding.form {
            errors.extend(validate_form(form));
            if !errors.is_empty() {
                return errors;
            }
        }

        path.push(label.to_string());
        errors.extend(validate_level(&binding.bindings, path));
        path.pop();
        if !errors.is_empty() {
            return errors;
        }
    }

    errors
}

/// Validates a form's fields.
///
/// Field names and flag labels must be unique, positional indices must be
/// unique, and at most one text field may take the rest of the line.
pub fn validate_form(form: &Form) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    let mut flags = HashSet::new();
    let mut positions = HashSet::new();
    let mut rest: Option<&str> = None;

    for field in &form.fields {
        if field.name.trim().is_empty() {
            errors.push(ValidationError::EmptyFieldName);
            return errors;
        }
        if !names.insert(field.name.as_str()) {
            errors.push(ValidationError::DuplicateField(field.name.clone()));
            return errors;
        }
        if !flags.insert(field.flag_name().to_lowercase()) {
            errors.push(ValidationError::DuplicateFlag(field.flag_name().to_string()));
            return errors;
        }

        match field.position {
            REST_POSITION => {
                if field.field_type != FieldType::Text {
                    errors.push(ValidationError::RestFieldNotText(field.name.clone()));
                    return errors;
                }
                if let Some(first) = rest {
                    errors.push(ValidationError::MultipleRestFields(format!(
                        "{first}, {}",
                        field.name
                    )));
                    return errors;
                }
                rest = Some(&field.name);
            }
            p if p > 0 => {
                if !positions.insert(p) {
                    errors.push(ValidationError::DuplicatePosition {
                        field: field.name.clone(),
                        position: p,
                    });
                    return errors;
                }
            }
            0 => {}
            p => {
                errors.push(ValidationError::InvalidPosition {
                    field: field.name.clone(),
                    position: p,
                });
                return errors;
            }
        }

        if field.multiselect && field.field_type == FieldType::Bool {
            errors.push(ValidationError::MultiselectBool(field.name.clone()));
            return errors;
        }
        if field.field_type == FieldType::StaticSelect && field.options.is_empty() {
            errors.push(ValidationError::MissingOptions(field.name.clone()));
            return errors;
        }
    }

    errors
}

fn display_path(path: &[String], label: &str) -> String {
    let mut parts: Vec<&str> = path.iter().map(String::as_str).collect();
    if !label.is_empty() {
        parts.push(label);
    }
    format!("/{}", parts.join(" "))
}
