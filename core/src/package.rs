use serde::{Deserialize, Serialize};

use crate::Binding;

/// Serializable binding bundle used for distribution and snapshots.
///
/// A package groups the top-level [`Binding`]s published by one or more apps
/// with version metadata, so a whole command tree can be stored as a single
/// JSON file and loaded as a read-only snapshot.
///
/// # Examples
///
/// ```
/// use app_command_core::*;
///
/// let mut package = BindingPackage::new("1.0.0", "2024-01-15T10:30:00Z");
/// package.name = Some("jira-commands".into());
/// package.bindings.push(Binding::new("jira").with_app_id("jira"));
///
/// assert_eq!(package.binding_count(), 1);
/// assert_eq!(package.version, "1.0.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingPackage {
    /// Bindings contract version (populated from
    /// [`BINDINGS_CONTRACT_VERSION`](crate::BINDINGS_CONTRACT_VERSION)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_version: Option<String>,
    /// Package format version (semver string).
    pub version: String,
    /// Optional package name.
    pub name: Option<String>,
    /// Optional package description.
    pub description: Option<String>,
    /// ISO-8601 timestamp for package creation.
    pub generated_at: String,
    /// Top-level bindings included in this package.
    pub bindings: Vec<Binding>,
}

impl BindingPackage {
    /// Creates a package with required fields.
    pub fn new(version: impl Into<String>, generated_at: impl Into<String>) -> Self {
        Self {
            contract_version: Some(crate::BINDINGS_CONTRACT_VERSION.to_string()),
            version: version.into(),
            name: None,
            description: None,
            generated_at: generated_at.into(),
            bindings: Vec::new(),
        }
    }

    /// Returns the number of top-level bindings in this package.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}
