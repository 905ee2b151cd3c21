use std::path::PathBuf;

use vfetch_store::{ObjectKind, StoreError};
use vfetch_types::NodeId;

/// Failure delivered to a waiting import request.
///
/// `ImportError` is `Clone` because one failure for a key is delivered to
/// every request that shares the key.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    /// The backing store reported a failure for the key.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The backing store returned from a batch without reporting this key.
    #[error("{kind} {node} was not reported by the backing store")]
    NoResult { kind: ObjectKind, node: NodeId },

    /// The producer went away without fulfilling the request.
    #[error("import request abandoned before completion")]
    Abandoned,

    /// The secondary importer could not produce the object.
    #[error("secondary import of {kind} {node} failed: {reason}")]
    Secondary {
        kind: ObjectKind,
        node: NodeId,
        reason: String,
    },
}

/// Result alias for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Errors loading an [`ImportConfig`](crate::ImportConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
