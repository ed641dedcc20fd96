use std::collections::HashMap;
use std::fmt::Debug;
use std::path::PathBuf;

use log::{debug, trace};

use crate::errors::ParserError;

pub const DEFAULT_BUNDLE: &str = "default";
pub const DEFAULT_PREFERENCES: &str = "default";

/// Where an import macro reads its template from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// Bundled with the application, relative to its asset root.
    Internal,
    /// Relative to the working directory.
    Local,
    /// An absolute path.
    External,
    /// Relative to the class-path style resource root.
    Classpath,
}

/// Reads templates for import macros.
pub trait TemplateSource: Debug + Send + Sync {
    fn read(&self, kind: ImportKind, path: &str) -> Result<String, ParserError>;
}

/// Reads imports from disk, resolving internal and classpath paths against
/// configurable roots.
#[derive(Debug, Clone, Default)]
pub struct FileTemplateSource {
    pub internal_root: PathBuf,
    pub classpath_root: PathBuf,
}

impl FileTemplateSource {
    pub fn new(internal_root: impl Into<PathBuf>, classpath_root: impl Into<PathBuf>) -> Self {
        Self {
            internal_root: internal_root.into(),
            classpath_root: classpath_root.into(),
        }
    }
}

impl TemplateSource for FileTemplateSource {
    fn read(&self, kind: ImportKind, path: &str) -> Result<String, ParserError> {
        let full = match kind {
            ImportKind::Internal => self.internal_root.join(path),
            ImportKind::Classpath => self.classpath_root.join(path),
            ImportKind::Local | ImportKind::External => PathBuf::from(path),
        };
        if kind == ImportKind::External && !full.is_absolute() {
            return Err(ParserError::Import {
                path: path.to_string(),
                message: "external imports need an absolute path".to_string(),
            });
        }
        debug!("Reading {:?} template from {}", kind, full.display());
        std::fs::read_to_string(&full).map_err(|e| ParserError::Import {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

/// In-memory sources, keyed by path. Handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateSource {
    templates: HashMap<String, String>,
}

impl MemoryTemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, template: &str) -> &mut Self {
        self.templates.insert(path.to_string(), template.to_string());
        self
    }
}

impl TemplateSource for MemoryTemplateSource {
    fn read(&self, _kind: ImportKind, path: &str) -> Result<String, ParserError> {
        self.templates.get(path).cloned().ok_or_else(|| ParserError::Import {
            path: path.to_string(),
            message: "no such template".to_string(),
        })
    }
}

/// Mutable data visible to templates: the argument table, i18n bundles,
/// preferences and the import source.
#[derive(Debug, Default)]
pub struct TemplateData {
    arguments: HashMap<String, String>,
    bundles: HashMap<String, HashMap<String, String>>,
    preferences: HashMap<String, HashMap<String, String>>,
    source: Option<Box<dyn TemplateSource>>,
}

impl TemplateData {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Arguments ---

    /// Argument names are case-insensitive.
    pub fn add_argument(&mut self, name: &str, value: impl ToString) -> &mut Self {
        let value = value.to_string();
        debug!("Setting argument '{}' = {:?}", name, value);
        self.arguments.insert(name.to_lowercase(), value);
        self
    }

    pub fn get_argument(&self, name: &str) -> Option<&str> {
        trace!("Looking up argument '{}'", name);
        self.arguments.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn remove_argument(&mut self, name: &str) -> Option<String> {
        self.arguments.remove(&name.to_lowercase())
    }

    pub fn clear_arguments(&mut self) {
        self.arguments.clear();
    }

    // --- I18N ---

    pub fn add_bundle(&mut self, name: &str, lines: HashMap<String, String>) -> &mut Self {
        debug!("Registering i18n bundle '{}' ({} lines)", name, lines.len());
        self.bundles.insert(name.to_string(), lines);
        self
    }

    pub fn add_default_bundle(&mut self, lines: HashMap<String, String>) -> &mut Self {
        self.add_bundle(DEFAULT_BUNDLE, lines)
    }

    pub fn bundle_line(&self, bundle: &str, key: &str) -> Option<&str> {
        self.bundles.get(bundle)?.get(key).map(String::as_str)
    }

    pub fn has_bundle(&self, bundle: &str) -> bool {
        self.bundles.contains_key(bundle)
    }

    // --- Preferences ---

    pub fn add_preferences(&mut self, name: &str, values: HashMap<String, String>) -> &mut Self {
        debug!("Registering preferences '{}' ({} values)", name, values.len());
        self.preferences.insert(name.to_string(), values);
        self
    }

    pub fn add_default_preferences(&mut self, values: HashMap<String, String>) -> &mut Self {
        self.add_preferences(DEFAULT_PREFERENCES, values)
    }

    pub fn preference(&self, preferences: &str, key: &str) -> Option<&str> {
        self.preferences.get(preferences)?.get(key).map(String::as_str)
    }

    pub fn has_preferences(&self, preferences: &str) -> bool {
        self.preferences.contains_key(preferences)
    }

    // --- Imports ---

    pub fn set_source(&mut self, source: Box<dyn TemplateSource>) -> &mut Self {
        self.source = Some(source);
        self
    }

    pub fn read_template(&self, kind: ImportKind, path: &str) -> Result<String, ParserError> {
        match &self.source {
            Some(source) => source.read(kind, path),
            None => FileTemplateSource::default().read(kind, path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_ignore_case() {
        let mut data = TemplateData::new();
        data.add_argument("Title", "Hello");
        assert_eq!(data.get_argument("TITLE"), Some("Hello"));
        data.add_argument("title", 3);
        assert_eq!(data.get_argument("Title"), Some("3"));
        assert_eq!(data.remove_argument("TiTlE").as_deref(), Some("3"));
        assert_eq!(data.get_argument("title"), None);
    }

    #[test]
    fn memory_source_serves_registered_templates() {
        let mut source = MemoryTemplateSource::new();
        source.insert("header.tpl", "<header/>");
        let mut data = TemplateData::new();
        data.set_source(Box::new(source));
        assert_eq!(data.read_template(ImportKind::Internal, "header.tpl").unwrap(), "<header/>");
        assert!(matches!(
            data.read_template(ImportKind::Local, "missing.tpl"),
            Err(ParserError::Import { .. })
        ));
    }

    #[test]
    fn external_imports_must_be_absolute() {
        let source = FileTemplateSource::default();
        assert!(source.read(ImportKind::External, "relative/path.tpl").is_err());
    }
}
