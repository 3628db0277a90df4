//! Binding tree loading with builder pattern and fallback chains.
//!
//! Provides [`BindingDatabase`], a read-only snapshot of the top-level
//! bindings apps have published, and [`DatabaseBuilder`] for loading that
//! snapshot from several sources with automatic fallback.
//!
//! # Loading patterns
//!
//! ```no_run
//! use app_command_db::BindingDatabase;
//!
//! // Load from a directory of JSON binding files
//! let db = BindingDatabase::from_dir("bindings/").unwrap();
//! assert!(db.get("jira").is_some());
//!
//! // Load from a single BindingPackage JSON bundle
//! let db = BindingDatabase::from_bundle("bindings.json").unwrap();
//!
//! // Use the builder for a fallback chain
//! let db = BindingDatabase::builder()
//!     .from_dir("bindings/")
//!     .from_bundle("bindings.json")
//!     .build()
//!     .unwrap();
//! ```

use std::path::{Path, PathBuf};

use app_command_core::{Binding, BindingPackage, validate_bindings, validate_package};
use tracing::{debug, warn};

use crate::error::{DatabaseError, Result};

/// Describes where a [`BindingDatabase`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    /// Loaded from a directory of individual JSON binding files.
    Directory(PathBuf),
    /// Loaded from a single [`BindingPackage`] JSON file.
    Bundle(PathBuf),
    /// Built in memory.
    Memory,
    /// Loaded via a fallback chain of multiple sources.
    Multiple(Vec<DatabaseSource>),
}

/// Ordered collection of top-level bindings.
///
/// Order is preserved because it is the order in which commands are
/// suggested. Lookups match labels case-insensitively, like the parser does.
///
/// # Examples
///
/// ```
/// use app_command_core::Binding;
/// use app_command_db::BindingDatabase;
///
/// let db = BindingDatabase::from_bindings(vec![
///     Binding::new("jira").with_app_id("jira"),
///     Binding::new("github").with_app_id("github"),
/// ])
/// .unwrap();
///
/// assert_eq!(db.len(), 2);
/// assert!(db.contains("JIRA"));
/// assert_eq!(db.labels().collect::<Vec<_>>(), ["jira", "github"]);
/// ```
#[derive(Debug)]
pub struct BindingDatabase {
    bindings: Vec<Binding>,
    source: DatabaseSource,
}

impl BindingDatabase {
    /// Returns a new [`DatabaseBuilder`] for configuring a fallback chain.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Builds a database from bindings already in memory.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidPackage`] if the tree fails validation.
    pub fn from_bindings(bindings: Vec<Binding>) -> Result<Self> {
        check(validate_bindings(&bindings))?;
        Ok(Self {
            bindings,
            source: DatabaseSource::Memory,
        })
    }

    /// Loads bindings from a directory of `*.json` files.
    ///
    /// Each file holds one top-level [`Binding`]. Files are read in file
    /// name order so the resulting command order is stable.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the directory cannot be read,
    /// [`DatabaseError::JsonError`] if any file contains invalid JSON, or
    /// [`DatabaseError::InvalidPackage`] if the combined tree is invalid.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(file_path);
            }
        }
        files.sort();

        let mut bindings = Vec::with_capacity(files.len());
        for file_path in files {
            let file = std::fs::File::open(&file_path)?;
            let reader = std::io::BufReader::new(file);
            let binding: Binding = serde_json::from_reader(reader)?;
            debug!(file = %file_path.display(), label = %binding.label, "loaded binding");
            bindings.push(binding);
        }
        check(validate_bindings(&bindings))?;

        Ok(Self {
            bindings,
            source: DatabaseSource::Directory(path.to_path_buf()),
        })
    }

    /// Loads bindings from a single [`BindingPackage`] JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the file cannot be read,
    /// [`DatabaseError::JsonError`] if parsing fails, or
    /// [`DatabaseError::InvalidPackage`] if the package is invalid.
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let package: BindingPackage = serde_json::from_reader(reader)?;
        check(validate_package(&package))?;

        Ok(Self {
            bindings: package.bindings,
            source: DatabaseSource::Bundle(path.to_path_buf()),
        })
    }

    /// Looks up a top-level binding by label, ignoring case.
    pub fn get(&self, label: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|b| b.label.eq_ignore_ascii_case(label))
    }

    /// Inserts a top-level binding, replacing any entry with the same label.
    pub fn insert(&mut self, binding: Binding) {
        match self
            .bindings
            .iter_mut()
            .find(|b| b.label.eq_ignore_ascii_case(&binding.label))
        {
            Some(existing) => *existing = binding,
            None => self.bindings.push(binding),
        }
    }

    /// Returns `true` if a top-level binding with `label` exists.
    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Returns the number of top-level bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if the database holds no bindings.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Returns an iterator over top-level labels, in load order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.label.as_str())
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Consumes the database, yielding the tree for a parser.
    pub fn into_bindings(self) -> Vec<Binding> {
        self.bindings
    }

    /// Packs the current tree into a [`BindingPackage`].
    ///
    /// # Examples
    ///
    /// ```
    /// use app_command_core::Binding;
    /// use app_command_db::BindingDatabase;
    ///
    /// let db = BindingDatabase::from_bindings(vec![Binding::new("jira")]).unwrap();
    /// let package = db.to_package("1.0.0", "2024-01-01T00:00:00Z");
    /// assert_eq!(package.binding_count(), 1);
    /// ```
    pub fn to_package(
        &self,
        version: impl Into<String>,
        generated_at: impl Into<String>,
    ) -> BindingPackage {
        let mut package = BindingPackage::new(version, generated_at);
        package.bindings = self.bindings.clone();
        package
    }

    /// Returns a reference to the source metadata.
    pub fn source(&self) -> &DatabaseSource {
        &self.source
    }
}

fn check<E: std::fmt::Display>(errors: Vec<E>) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    Err(DatabaseError::InvalidPackage(messages.join("; ")))
}

/// Builder for constructing a [`BindingDatabase`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first successful load
/// wins; if all fail, [`DatabaseError::NoSourcesAvailable`] is returned.
#[derive(Debug, Default)]
pub struct DatabaseBuilder {
    sources: Vec<DatabaseSource>,
}

impl DatabaseBuilder {
    /// Creates a new builder with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory of JSON binding files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DatabaseSource::Directory(path.into()));
        self
    }

    /// Adds a [`BindingPackage`] bundle file as a source.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DatabaseSource::Bundle(path.into()));
        self
    }

    /// Attempts to load bindings from configured sources in order.
    pub fn build(self) -> Result<BindingDatabase> {
        if self.sources.is_empty() {
            return Err(DatabaseError::NoSourcesAvailable);
        }

        for source in &self.sources {
            let result = match source {
                DatabaseSource::Directory(path) => BindingDatabase::from_dir(path),
                DatabaseSource::Bundle(path) => BindingDatabase::from_bundle(path),
                DatabaseSource::Memory | DatabaseSource::Multiple(_) => continue,
            };

            match result {
                Ok(mut db) => {
                    debug!(source = ?source, count = db.len(), "binding source loaded");
                    db.source = DatabaseSource::Multiple(self.sources.clone());
                    return Ok(db);
                }
                Err(err) => warn!(source = ?source, error = %err, "binding source failed"),
            }
        }

        Err(DatabaseError::NoSourcesAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_command_core::{Call, Field, FieldType, Form};
    use std::io::Write;

    fn test_binding(label: &str) -> Binding {
        let form = Form::new(Call::new(format!("/{label}")))
            .with_field(Field::new("name", FieldType::Text));
        Binding::new(label)
            .with_app_id(label)
            .with_binding(Binding::new("run").with_form(form))
    }

    fn write_binding(dir: &Path, file: &str, binding: &Binding) {
        let path = dir.join(file);
        let mut f = std::fs::File::create(path).unwrap();
        serde_json::to_writer_pretty(&mut f, binding).unwrap();
        f.flush().unwrap();
    }

    fn write_package(path: &Path, package: &BindingPackage) {
        let mut f = std::fs::File::create(path).unwrap();
        serde_json::to_writer_pretty(&mut f, package).unwrap();
        f.flush().unwrap();
    }

    #[test]
    fn test_from_dir_sorted_by_file_name() {
        let dir = std::env::temp_dir().join("ac_db_test_from_dir");
        std::fs::create_dir_all(&dir).unwrap();

        write_binding(&dir, "b-jira.json", &test_binding("jira"));
        write_binding(&dir, "a-github.json", &test_binding("github"));
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let db = BindingDatabase::from_dir(&dir).unwrap();
        assert_eq!(db.labels().collect::<Vec<_>>(), ["github", "jira"]);
        assert_eq!(db.source(), &DatabaseSource::Directory(dir.clone()));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_from_dir_rejects_duplicate_labels() {
        let dir = std::env::temp_dir().join("ac_db_test_dup_labels");
        std::fs::create_dir_all(&dir).unwrap();

        write_binding(&dir, "one.json", &test_binding("jira"));
        write_binding(&dir, "two.json", &test_binding("jira"));

        let err = BindingDatabase::from_dir(&dir).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidPackage(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_from_bundle() {
        let dir = std::env::temp_dir().join("ac_db_test_from_bundle");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bundle.json");

        let mut package = BindingPackage::new("1.0.0", "2024-01-01T00:00:00Z");
        package.bindings.push(test_binding("jira"));
        package.bindings.push(test_binding("github"));
        write_package(&path, &package);

        let db = BindingDatabase::from_bundle(&path).unwrap();
        assert_eq!(db.len(), 2);
        assert!(db.contains("jira"));
        assert!(db.contains("github"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_builder_fallback_first_fails() {
        let dir = std::env::temp_dir().join("ac_db_test_builder_fb");
        std::fs::create_dir_all(&dir).unwrap();
        let bundle_path = dir.join("bundle.json");

        let mut package = BindingPackage::new("1.0.0", "2024-01-01T00:00:00Z");
        package.bindings.push(test_binding("github"));
        write_package(&bundle_path, &package);

        let db = BindingDatabase::builder()
            .from_dir("/nonexistent/dir/")
            .from_bundle(&bundle_path)
            .build()
            .unwrap();
        assert!(db.contains("github"));
        assert!(matches!(db.source(), DatabaseSource::Multiple(s) if s.len() == 2));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_builder_all_fail() {
        let result = BindingDatabase::builder()
            .from_dir("/nonexistent/dir1/")
            .from_bundle("/nonexistent/bundle1.json")
            .build();
        assert!(matches!(result, Err(DatabaseError::NoSourcesAvailable)));
    }

    #[test]
    fn test_builder_without_sources() {
        let result = DatabaseBuilder::new().build();
        assert!(matches!(result, Err(DatabaseError::NoSourcesAvailable)));
    }

    #[test]
    fn test_insert_replaces_same_label() {
        let mut db = BindingDatabase::from_bindings(vec![test_binding("jira")]).unwrap();
        db.insert(Binding::new("JIRA").with_description("replaced"));
        db.insert(test_binding("github"));

        assert_eq!(db.len(), 2);
        assert_eq!(
            db.get("jira").unwrap().description.as_deref(),
            Some("replaced")
        );
        assert!(db.get("nonexistent").is_none());
    }
}
