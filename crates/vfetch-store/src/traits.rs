use vfetch_types::NodeId;

use crate::error::{StoreError, StoreResult};
use crate::raw::{ObjectKind, RawBlob, RawBlobMetadata, RawTree};

/// Whether a fetch may leave already-materialized local state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Only consult local state; never go to the network.
    LocalOnly,
    /// Consult local state, then fetch remotely on a miss.
    AllowRemote,
}

impl FetchMode {
    pub fn is_local_only(&self) -> bool {
        matches!(self, Self::LocalOnly)
    }
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalOnly => write!(f, "local-only"),
            Self::AllowRemote => write!(f, "allow-remote"),
        }
    }
}

/// Per-key result sink for batch fetches.
///
/// Called with the index of the key in the batch and that key's outcome.
/// It is `Sync` because a store may deliver results from worker threads.
pub type BatchCallback<'a, T> = &'a (dyn Fn(usize, StoreResult<T>) + Sync);

/// Content-keyed backing store consumed by the import engine.
///
/// All implementations must satisfy these invariants:
/// - A batch fetch calls `on_result` exactly once for every index of `nodes`
///   and does not return until every call has completed. Calls may happen in
///   any order and on any thread.
/// - A [`FetchMode::LocalOnly`] fetch never reaches remote state.
/// - `flush` makes records published by concurrent local writers visible to
///   subsequent fetches.
pub trait BackingStore: Send + Sync {
    /// Fetch one tree. Returns `None` on a miss.
    fn get_tree(&self, node: &NodeId, mode: FetchMode) -> Option<RawTree>;

    /// Fetch one blob. Returns `None` on a miss.
    fn get_blob(&self, node: &NodeId, mode: FetchMode) -> Option<RawBlob>;

    /// Fetch one blob's metadata. Returns `None` on a miss.
    fn get_blob_metadata(&self, node: &NodeId, mode: FetchMode) -> Option<RawBlobMetadata>;

    /// Refresh the store's local view from its persistent state.
    fn flush(&self);

    /// Fetch many trees, reporting each through `on_result`.
    ///
    /// Default implementation calls `get_tree()` for each node in order.
    /// Backends may override for better performance (e.g., one round-trip).
    fn get_tree_batch(&self, nodes: &[NodeId], mode: FetchMode, on_result: BatchCallback<'_, RawTree>) {
        for (index, node) in nodes.iter().enumerate() {
            on_result(index, self.get_tree(node, mode).ok_or_else(|| not_found(ObjectKind::Tree, node)));
        }
    }

    /// Fetch many blobs, reporting each through `on_result`.
    fn get_blob_batch(&self, nodes: &[NodeId], mode: FetchMode, on_result: BatchCallback<'_, RawBlob>) {
        for (index, node) in nodes.iter().enumerate() {
            on_result(index, self.get_blob(node, mode).ok_or_else(|| not_found(ObjectKind::Blob, node)));
        }
    }

    /// Fetch many metadata records, reporting each through `on_result`.
    fn get_blob_metadata_batch(
        &self,
        nodes: &[NodeId],
        mode: FetchMode,
        on_result: BatchCallback<'_, RawBlobMetadata>,
    ) {
        for (index, node) in nodes.iter().enumerate() {
            on_result(
                index,
                self.get_blob_metadata(node, mode)
                    .ok_or_else(|| not_found(ObjectKind::BlobMetadata, node)),
            );
        }
    }
}

fn not_found(kind: ObjectKind, node: &NodeId) -> StoreError {
    StoreError::NotFound { kind, node: *node }
}
