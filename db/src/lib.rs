//! Binding tree loading, CLI configuration and fixture backends.
//!
//! This crate provides the infrastructure around the parser: loading the
//! binding tree snapshot from directories or bundles, reading the CLI's YAML
//! configuration, and serving calls and directory queries from fixtures.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use app_command_db::{BindingDatabase, StaticBackend};
//! use app_command_parser::{AppCommandParser, CommandContext};
//!
//! // Use the builder for fallback chains
//! let db = BindingDatabase::builder()
//!     .from_dir("bindings/")
//!     .from_bundle("bindings.json")
//!     .build()
//!     .unwrap();
//!
//! // Serve calls from canned responses
//! let backend = Arc::new(StaticBackend::load("fixtures.json").unwrap());
//! let parser = AppCommandParser::new(
//!     db.into_bindings(),
//!     backend.clone(),
//!     backend,
//!     CommandContext::new("town-square"),
//! );
//! ```

mod backend;
mod config;
mod error;
mod loader;

pub use backend::{Fixtures, StaticBackend};
pub use config::{CliConfig, ContextConfig, SourceConfig};
pub use error::{DatabaseError, Result};
pub use loader::{BindingDatabase, DatabaseBuilder, DatabaseSource};
