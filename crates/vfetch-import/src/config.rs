use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use vfetch_store::ObjectKind;
use vfetch_types::{ObjectIdFormat, RelativePath};

use crate::error::ConfigError;

/// Settings the import engine reads on every batch and single-key fetch.
///
/// The engine only ever reads a snapshot; see [`ReloadableConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Repository name attached to telemetry events.
    pub repo_name: String,
    /// How tree entry identifiers are derived.
    pub object_id_format: ObjectIdFormat,
    /// Paths whose entries are left out of imported trees.
    pub filtered_paths: HashSet<RelativePath>,
    /// Defer failed tree fetches to the secondary importer.
    pub tree_fetch_fallback: bool,
    /// Defer failed blob fetches to the secondary importer.
    pub blob_fetch_fallback: bool,
    /// Defer failed metadata fetches to the secondary importer.
    pub blob_metadata_fetch_fallback: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            repo_name: "repo".into(),
            object_id_format: ObjectIdFormat::WithPath,
            filtered_paths: HashSet::new(),
            tree_fetch_fallback: true,
            blob_fetch_fallback: true,
            blob_metadata_fetch_fallback: true,
        }
    }
}

impl ImportConfig {
    /// A configuration where every store failure is surfaced to the waiter.
    pub fn strict() -> Self {
        Self {
            tree_fetch_fallback: false,
            blob_fetch_fallback: false,
            blob_metadata_fetch_fallback: false,
            ..Default::default()
        }
    }

    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Whether a store failure for `kind` is deferred to the secondary
    /// importer instead of being delivered to the waiter.
    pub fn fallback_enabled(&self, kind: ObjectKind) -> bool {
        match kind {
            ObjectKind::Tree => self.tree_fetch_fallback,
            ObjectKind::Blob => self.blob_fetch_fallback,
            ObjectKind::BlobMetadata => self.blob_metadata_fetch_fallback,
        }
    }

    /// Whether entries at `path` are excluded from imported trees.
    pub fn is_filtered(&self, path: &RelativePath) -> bool {
        !self.filtered_paths.is_empty() && self.filtered_paths.contains(path)
    }
}

/// A live-reloadable holder of the current [`ImportConfig`].
///
/// Readers take an immutable snapshot; a reload swaps in a new one without
/// disturbing snapshots already handed out.
#[derive(Debug, Default)]
pub struct ReloadableConfig {
    current: RwLock<Arc<ImportConfig>>,
}

impl ReloadableConfig {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// The configuration in effect right now.
    pub fn snapshot(&self) -> Arc<ImportConfig> {
        Arc::clone(&self.current.read().expect("config lock poisoned"))
    }

    /// Install a new configuration.
    pub fn replace(&self, config: ImportConfig) {
        *self.current.write().expect("config lock poisoned") = Arc::new(config);
    }
}
