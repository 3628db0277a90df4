//! Error types for binding database operations.

use thiserror::Error;

/// Errors that can occur while loading bindings, configuration or fixtures.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A binding package or directory failed structural validation.
    #[error("invalid bindings: {0}")]
    InvalidPackage(String),

    /// All configured loader sources failed.
    #[error("no binding sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;
