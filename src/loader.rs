//! Document Loading
//!
//! The transformer asks a [`DocumentLoader`] for documents named by
//! cross-document `$ref`s. A loader turns a location (relative to the
//! referring document) into a stable [`DocumentId`] and supplies the parsed
//! value tree for it. The id is the session cache key, so two spellings of
//! the same file must produce the same id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::value::SchemaValue;

// =============================================================================
// Document Identity
// =============================================================================

/// Canonical identity of a loaded document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name without extension: `schemas/Person.schema.json` -> `Person`
    pub fn stem(&self) -> &str {
        let file = self.0.rsplit('/').next().unwrap_or(&self.0);
        file.split('.').next().unwrap_or(file)
    }

    /// Directory part, empty if none
    pub fn directory(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[..i],
            None => "",
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of referenced documents
pub trait DocumentLoader {
    /// Identity of `location` as seen from `base` (the referring document)
    fn resolve(&self, base: Option<&DocumentId>, location: &str) -> Result<DocumentId, LoadError>;

    /// Parsed contents of a document
    fn load(&self, document: &DocumentId) -> Result<SchemaValue, LoadError>;
}

/// Join `location` onto `base_dir` and fold `.`/`..` segments
pub fn normalize_location(base_dir: &str, location: &str) -> String {
    let joined = if location.starts_with('/') || base_dir.is_empty() {
        location.to_string()
    } else {
        format!("{}/{}", base_dir, location)
    };

    let absolute = joined.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let path = segments.join("/");
    if absolute {
        format!("/{}", path)
    } else {
        path
    }
}

fn strip_file_scheme(location: &str) -> &str {
    location
        .strip_prefix("file://")
        .or_else(|| location.strip_prefix("file:"))
        .unwrap_or(location)
}

// =============================================================================
// Filesystem Loader
// =============================================================================

/// Loads documents from disk, parsing them with serde_json.
///
/// serde_json does not report positions for the values it parses, so
/// documents loaded here carry no [`Token`](crate::value::Token)s and their
/// issues have no source location. A loader backed by a position-aware
/// parser can attach tokens with [`Spanned::with_token`](crate::value::Spanned::with_token).
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
    extensions: Vec<String>,
    skip_prefixes: Vec<String>,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(&LoaderConfig {
            root: root.into(),
            ..LoaderConfig::default()
        })
    }

    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            root: config.root.clone(),
            extensions: config.extensions.clone(),
            skip_prefixes: config.skip_prefixes.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identity of a file given on the command line (relative to cwd, not
    /// to the loader root)
    pub fn document_id(&self, path: &Path) -> DocumentId {
        DocumentId::new(normalize_path(path))
    }

    /// All schema documents under the root
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| self.extensions.iter().any(|x| x == ext))
                    .unwrap_or(false)
            })
            .filter(|e| {
                let relative = e.path().strip_prefix(&self.root).unwrap_or(e.path());
                let relative = relative.to_string_lossy();
                !self.skip_prefixes.iter().any(|p| relative.starts_with(p.as_str()))
            })
            .map(|e| e.path().to_path_buf())
            .collect();
        found.sort();
        found
    }
}

impl DocumentLoader for FsLoader {
    fn resolve(&self, base: Option<&DocumentId>, location: &str) -> Result<DocumentId, LoadError> {
        let location = strip_file_scheme(location);
        if location.is_empty() {
            return Err(LoadError::UnsupportedLocation(location.to_string()));
        }

        let path = Path::new(location);
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            match base {
                Some(base) => Path::new(base.as_str())
                    .parent()
                    .unwrap_or(Path::new(""))
                    .join(path),
                None => self.root.join(path),
            }
        };
        Ok(DocumentId::new(normalize_path(&resolved)))
    }

    fn load(&self, document: &DocumentId) -> Result<SchemaValue, LoadError> {
        let content = fs::read_to_string(document.as_str()).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound(document.to_string())
            } else {
                LoadError::Io {
                    location: document.to_string(),
                    source,
                }
            }
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| LoadError::Json {
                location: document.to_string(),
                source,
            })?;
        Ok(json.into())
    }
}

fn normalize_path(path: &Path) -> String {
    let mut components: Vec<String> = Vec::new();
    let mut absolute = false;
    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::ParentDir => {
                components.pop();
            }
            Component::Normal(s) => components.push(s.to_string_lossy().to_string()),
            Component::CurDir | Component::Prefix(_) => {}
        }
    }
    let joined = components.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

// =============================================================================
// In-Memory Loader
// =============================================================================

/// Documents held in memory, keyed by normalized location
#[derive(Debug, Default)]
pub struct MemoryLoader {
    documents: HashMap<String, SchemaValue>,
    loads: AtomicUsize,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: &str, value: impl Into<SchemaValue>) {
        self.documents
            .insert(normalize_location("", location), value.into());
    }

    pub fn with(mut self, location: &str, value: impl Into<SchemaValue>) -> Self {
        self.insert(location, value);
        self
    }

    /// Number of successful `load` calls so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl DocumentLoader for MemoryLoader {
    fn resolve(&self, base: Option<&DocumentId>, location: &str) -> Result<DocumentId, LoadError> {
        let location = strip_file_scheme(location);
        let base_dir = base.map(|b| b.directory()).unwrap_or("");
        Ok(DocumentId::new(normalize_location(base_dir, location)))
    }

    fn load(&self, document: &DocumentId) -> Result<SchemaValue, LoadError> {
        let value = self
            .documents
            .get(document.as_str())
            .cloned()
            .ok_or_else(|| LoadError::NotFound(document.to_string()))?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("a/b", "c.json"), "a/b/c.json");
        assert_eq!(normalize_location("a/b", "../c.json"), "a/c.json");
        assert_eq!(normalize_location("a/b", "./c.json"), "a/b/c.json");
        assert_eq!(normalize_location("", "c.json"), "c.json");
        assert_eq!(normalize_location("a", "/abs/c.json"), "/abs/c.json");
    }

    #[test]
    fn test_document_id_parts() {
        let id = DocumentId::new("schemas/people/Person.schema.json");
        assert_eq!(id.stem(), "Person");
        assert_eq!(id.directory(), "schemas/people");
        assert_eq!(DocumentId::new("root.json").directory(), "");
    }

    #[test]
    fn test_memory_loader_resolves_relative_to_base() {
        let loader = MemoryLoader::new().with("defs/common.json", json!({"type": "object"}));
        let base = DocumentId::new("defs/main.json");
        let id = loader.resolve(Some(&base), "./common.json").unwrap();
        assert_eq!(id.as_str(), "defs/common.json");
        assert!(loader.load(&id).is_ok());
        assert_eq!(loader.load_count(), 1);

        let missing = loader.resolve(Some(&base), "nope.json").unwrap();
        assert!(matches!(loader.load(&missing), Err(LoadError::NotFound(_))));
        assert_eq!(loader.load_count(), 1);
    }

    #[test]
    fn test_fs_loader_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.json");
        let other = dir.path().join("other.json");
        fs::File::create(&main).unwrap().write_all(br#"{"type": "object"}"#).unwrap();
        fs::File::create(&other).unwrap().write_all(br#"{"definitions": {}}"#).unwrap();

        let loader = FsLoader::new(dir.path());
        let base = loader.document_id(&main);
        let id = loader.resolve(Some(&base), "file:other.json").unwrap();
        assert_eq!(id, loader.document_id(&other));
        let value = loader.load(&id).unwrap();
        assert!(value.as_object().unwrap().contains_key("definitions"));
    }

    #[test]
    fn test_fs_loader_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();

        let loader = FsLoader::new(dir.path());
        let id = loader.document_id(&bad);
        assert!(matches!(loader.load(&id), Err(LoadError::Json { .. })));
        let missing = loader.resolve(None, "missing.json").unwrap();
        assert!(matches!(loader.load(&missing), Err(LoadError::NotFound(_))));
    }

    #[test]
    fn test_discover_filters() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("target/b.json"), "{}").unwrap();

        let loader = FsLoader::new(dir.path());
        let found = loader.discover();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("a.json"));
    }
}
