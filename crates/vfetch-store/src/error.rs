use vfetch_types::NodeId;

use crate::raw::ObjectKind;

/// Errors reported by a backing store.
///
/// `StoreError` is `Clone` so a single failure for one key can be delivered
/// to every request waiting on that key.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store has no record for the key.
    #[error("{kind} not found: {node}")]
    NotFound { kind: ObjectKind, node: NodeId },

    /// A remote fetch failed.
    #[error("remote fetch failed: {0}")]
    Remote(String),

    /// The record exists but cannot be decoded.
    #[error("corrupt {kind} {node}: {reason}")]
    CorruptObject {
        kind: ObjectKind,
        node: NodeId,
        reason: String,
    },

    /// The store is shut down or otherwise unable to serve requests.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
