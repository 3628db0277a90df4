//! Configuration for the `app-command` CLI.
//!
//! Defines the YAML-serializable configuration naming where the binding tree
//! comes from, which fixture file backs remote calls, and the channel context
//! commands are typed in.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! sources:
//!   - dir: bindings/
//!   - bundle: bindings.json
//! fixtures: fixtures.json
//! context:
//!   channel_id: town-square
//!   team_id: core
//! parser:
//!   max_suggestions: 10
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use app_command_parser::{CommandContext, ParserConfig};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loader::DatabaseBuilder;

/// One entry of the binding source fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    /// Directory of per-command binding JSON files.
    Dir(PathBuf),
    /// Single `BindingPackage` JSON file.
    Bundle(PathBuf),
}

impl SourceConfig {
    fn path_mut(&mut self) -> &mut PathBuf {
        match self {
            Self::Dir(path) | Self::Bundle(path) => path,
        }
    }
}

/// Where commands are typed.
///
/// # Examples
///
/// ```
/// # use app_command_db::ContextConfig;
/// let context = ContextConfig {
///     channel_id: "town-square".into(),
///     team_id: Some("core".into()),
///     ..Default::default()
/// };
/// let command = context.command_context();
/// assert_eq!(command.team_id.as_deref(), Some("core"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

impl ContextConfig {
    /// Converts to the parser's [`CommandContext`].
    pub fn command_context(&self) -> CommandContext {
        let mut context = CommandContext::new(self.channel_id.clone());
        context.team_id = self.team_id.clone();
        context.root_id = self.root_id.clone();
        context.post_id = self.post_id.clone();
        context
    }
}

/// Top-level CLI configuration.
///
/// Loaded from a YAML file (typically `app-command.yml`).
///
/// # Examples
///
/// ```no_run
/// use app_command_db::CliConfig;
///
/// let config = CliConfig::load("app-command.yml").unwrap();
/// let db = config.database_builder().build().unwrap();
/// println!("{} commands", db.len());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    /// Binding sources, tried in order.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Fixture file backing calls and directory lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures: Option<PathBuf>,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            sources: Vec::new(),
            fixtures: None,
            context: ContextConfig::default(),
            parser: ParserConfig::default(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from a YAML file, resolving relative paths
    /// against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::DatabaseError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)?;
        Ok(match path.parent() {
            Some(base) => config.resolve_paths(base),
            None => config,
        })
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::DatabaseError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Joins every relative path in the config onto `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for source in &mut self.sources {
            let path = source.path_mut();
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(fixtures) = &mut self.fixtures {
            if fixtures.is_relative() {
                *fixtures = base.join(&*fixtures);
            }
        }
        self
    }

    /// Returns a [`DatabaseBuilder`] with the configured sources in order.
    pub fn database_builder(&self) -> DatabaseBuilder {
        self.sources
            .iter()
            .fold(DatabaseBuilder::new(), |builder, source| match source {
                SourceConfig::Dir(path) => builder.from_dir(path.clone()),
                SourceConfig::Bundle(path) => builder.from_bundle(path.clone()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
sources:
  - dir: bindings
  - bundle: /opt/bindings.json
fixtures: fixtures.json
context:
  channel_id: town-square
  team_id: core
parser:
  execute_suggestion: false
  max_suggestions: 10
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: CliConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(
            config.sources,
            vec![
                SourceConfig::Dir("bindings".into()),
                SourceConfig::Bundle("/opt/bindings.json".into()),
            ]
        );
        assert_eq!(config.fixtures, Some(PathBuf::from("fixtures.json")));
        assert_eq!(config.context.channel_id, "town-square");
        assert_eq!(config.context.team_id.as_deref(), Some("core"));
        assert!(!config.parser.execute_suggestion);
        assert!(config.parser.no_match_placeholder);
        assert_eq!(config.parser.max_suggestions, Some(10));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: CliConfig = serde_yaml::from_str("version: \"1.0\"").unwrap();
        assert!(config.sources.is_empty());
        assert!(config.fixtures.is_none());
        assert_eq!(config.context, ContextConfig::default());
        assert_eq!(config.parser, ParserConfig::default());
    }

    #[test]
    fn test_resolve_paths_keeps_absolute() {
        let config: CliConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let config = config.resolve_paths(Path::new("/etc/app"));
        assert_eq!(
            config.sources,
            vec![
                SourceConfig::Dir("/etc/app/bindings".into()),
                SourceConfig::Bundle("/opt/bindings.json".into()),
            ]
        );
        assert_eq!(config.fixtures, Some(PathBuf::from("/etc/app/fixtures.json")));
    }

    #[test]
    fn test_command_context() {
        let config: CliConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let context = config.context.command_context();
        assert_eq!(context.channel_id, "town-square");
        assert_eq!(context.team_id.as_deref(), Some("core"));
        assert!(context.root_id.is_none());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = std::env::temp_dir().join("ac_db_test_config_rt");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yml");

        let original: CliConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = CliConfig::load(&path).unwrap();
        assert_eq!(loaded, original.resolve_paths(&dir));

        std::fs::remove_dir_all(&dir).ok();
    }
}
