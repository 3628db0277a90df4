//! Core binding and form types shared by the app command parser.
//!
//! This crate defines the data model for app-published slash commands:
//!
//! - [`Binding`]: a node in the command tree; interior nodes group
//!   subcommands, leaves carry a [`Form`].
//! - [`Form`] / [`Field`]: the typed parameter schema of a leaf binding.
//! - [`CallRequest`] / [`CallResponse`]: the invocation handed to the
//!   execution layer and what comes back.
//! - [`AutocompleteSuggestion`]: one entry of the suggestion list.
//! - [`BindingPackage`]: a versioned bundle of bindings for distribution.
//!
//! Validation ([`validate_bindings`], [`validate_form`], [`validate_package`])
//! catches structural errors such as duplicate labels and clashing positional
//! fields.
//!
//! # Example
//!
//! ```
//! use app_command_core::*;
//!
//! let create = Form::new(Call::new("/create-issue"))
//!     .with_field(Field::new("project", FieldType::Text).required())
//!     .with_field(Field::new("summary", FieldType::Text).rest());
//!
//! let tree = vec![
//!     Binding::new("jira")
//!         .with_app_id("jira")
//!         .with_binding(Binding::new("create").with_form(create)),
//! ];
//!
//! assert!(validate_bindings(&tree).is_empty());
//! assert!(tree[0].find_child("create").unwrap().is_leaf());
//! ```

mod package;
mod types;
mod validate;

pub use package::BindingPackage;
pub use types::*;
pub use validate::{ValidationError, validate_bindings, validate_form, validate_package};
