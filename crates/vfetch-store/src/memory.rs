use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use bytes::Bytes;
use tracing::{debug, trace};
use vfetch_crypto::{ContentDigests, ContentHasher};
use vfetch_types::NodeId;

use crate::error::{StoreError, StoreResult};
use crate::raw::{ObjectKind, RawBlob, RawBlobMetadata, RawTree};
use crate::traits::{BackingStore, BatchCallback, FetchMode};

/// Where a record written to an [`InMemoryBackingStore`] lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Materialized locally; visible to every fetch.
    Local,
    /// Only available through a remote fetch.
    Remote,
    /// Written by a concurrent local writer but not yet visible. A `flush`
    /// promotes it to [`Tier::Local`].
    Unflushed,
}

/// A recorded batch fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchCall {
    pub kind: ObjectKind,
    pub nodes: Vec<NodeId>,
    pub mode: FetchMode,
}

/// A recorded single-key fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SingleCall {
    pub kind: ObjectKind,
    pub node: NodeId,
    pub mode: FetchMode,
}

#[derive(Default)]
struct Records {
    trees: HashMap<NodeId, RawTree>,
    blobs: HashMap<NodeId, RawBlob>,
    metadata: HashMap<NodeId, RawBlobMetadata>,
}

impl Records {
    fn absorb(&mut self, other: Records) {
        self.trees.extend(other.trees);
        self.blobs.extend(other.blobs);
        self.metadata.extend(other.metadata);
    }

    fn len(&self) -> usize {
        self.trees.len() + self.blobs.len() + self.metadata.len()
    }
}

#[derive(Default)]
struct CallLog {
    batches: Vec<BatchCall>,
    singles: Vec<SingleCall>,
}

/// In-memory, two-tier backing store.
///
/// Records live in a local tier, a remote tier, or an unflushed tier that
/// models a concurrent writer. Remote hits are cached into the local tier.
/// Failures can be injected per node for batch fetches, and every fetch is
/// recorded so callers can assert on exactly what reached the store.
///
/// With [`with_parallel_callbacks`](Self::with_parallel_callbacks), batch
/// results are delivered from scoped worker threads instead of the calling
/// thread.
pub struct InMemoryBackingStore {
    local: RwLock<Records>,
    remote: RwLock<Records>,
    unflushed: RwLock<Records>,
    failures: RwLock<HashMap<NodeId, StoreError>>,
    calls: Mutex<CallLog>,
    flushes: AtomicUsize,
    callbacks: AtomicUsize,
    parallel_callbacks: bool,
}

impl InMemoryBackingStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            local: RwLock::new(Records::default()),
            remote: RwLock::new(Records::default()),
            unflushed: RwLock::new(Records::default()),
            failures: RwLock::new(HashMap::new()),
            calls: Mutex::new(CallLog::default()),
            flushes: AtomicUsize::new(0),
            callbacks: AtomicUsize::new(0),
            parallel_callbacks: false,
        }
    }

    /// Deliver batch results from worker threads.
    pub fn with_parallel_callbacks(mut self) -> Self {
        self.parallel_callbacks = true;
        self
    }

    fn tier(&self, tier: Tier) -> &RwLock<Records> {
        match tier {
            Tier::Local => &self.local,
            Tier::Remote => &self.remote,
            Tier::Unflushed => &self.unflushed,
        }
    }

    // -----------------------------------------------------------------------
    // Writers
    // -----------------------------------------------------------------------

    /// Write a tree and return the node it was assigned.
    pub fn insert_tree(&self, tier: Tier, tree: RawTree) -> NodeId {
        let node = tree.compute_node();
        self.insert_tree_with_node(tier, node, tree);
        node
    }

    /// Write a tree under a caller-chosen node.
    pub fn insert_tree_with_node(&self, tier: Tier, node: NodeId, tree: RawTree) {
        let mut records = self.tier(tier).write().expect("lock poisoned");
        records.trees.insert(node, tree);
    }

    /// Write a blob together with its metadata and return its node.
    pub fn insert_blob(&self, tier: Tier, data: impl Into<Bytes>) -> NodeId {
        let data = data.into();
        let node = ContentHasher::BLOB.hash(&data);
        self.insert_blob_with_node(tier, node, data);
        node
    }

    /// Write a blob together with its metadata under a caller-chosen node.
    pub fn insert_blob_with_node(&self, tier: Tier, node: NodeId, data: impl Into<Bytes>) {
        let data = data.into();
        let digests = ContentDigests::compute(&data);
        let mut records = self.tier(tier).write().expect("lock poisoned");
        records.metadata.insert(
            node,
            RawBlobMetadata {
                content_sha256: digests.sha256,
                content_blake3: Some(digests.blake3),
                total_size: digests.size,
            },
        );
        records.blobs.insert(node, data);
    }

    /// Write only a metadata record, without its blob.
    pub fn insert_blob_metadata(&self, tier: Tier, node: NodeId, metadata: RawBlobMetadata) {
        let mut records = self.tier(tier).write().expect("lock poisoned");
        records.metadata.insert(node, metadata);
    }

    /// Make every batch fetch of `node` fail with `error`.
    pub fn fail_node(&self, node: NodeId, error: StoreError) {
        self.failures
            .write()
            .expect("lock poisoned")
            .insert(node, error);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.failures.write().expect("lock poisoned").clear();
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Number of records currently visible in the local tier.
    pub fn local_len(&self) -> usize {
        self.local.read().expect("lock poisoned").len()
    }

    /// Number of `flush` calls so far.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Number of batch callbacks delivered so far.
    pub fn callback_count(&self) -> usize {
        self.callbacks.load(Ordering::SeqCst)
    }

    /// Every batch fetch so far, in call order.
    pub fn batch_calls(&self) -> Vec<BatchCall> {
        self.calls.lock().expect("lock poisoned").batches.clone()
    }

    /// Every single-key fetch so far, in call order.
    pub fn single_calls(&self) -> Vec<SingleCall> {
        self.calls.lock().expect("lock poisoned").singles.clone()
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    fn lookup<T: Clone>(
        &self,
        node: &NodeId,
        mode: FetchMode,
        select: impl Fn(&Records) -> &HashMap<NodeId, T>,
        cache: impl Fn(&mut Records, NodeId, T),
    ) -> Option<T> {
        if let Some(found) = select(&self.local.read().expect("lock poisoned")).get(node) {
            return Some(found.clone());
        }
        if mode.is_local_only() {
            return None;
        }
        let found = select(&self.remote.read().expect("lock poisoned"))
            .get(node)
            .cloned()?;
        trace!(node = %node, "caching remote record locally");
        cache(
            &mut self.local.write().expect("lock poisoned"),
            *node,
            found.clone(),
        );
        Some(found)
    }

    fn record_single(&self, kind: ObjectKind, node: &NodeId, mode: FetchMode) {
        self.calls
            .lock()
            .expect("lock poisoned")
            .singles
            .push(SingleCall {
                kind,
                node: *node,
                mode,
            });
    }

    fn injected_failure(&self, node: &NodeId) -> Option<StoreError> {
        self.failures.read().expect("lock poisoned").get(node).cloned()
    }

    fn run_batch<T: Send>(
        &self,
        kind: ObjectKind,
        nodes: &[NodeId],
        mode: FetchMode,
        fetch: impl Fn(&NodeId) -> Option<T> + Sync,
        on_result: BatchCallback<'_, T>,
    ) {
        self.calls
            .lock()
            .expect("lock poisoned")
            .batches
            .push(BatchCall {
                kind,
                nodes: nodes.to_vec(),
                mode,
            });
        debug!(kind = %kind, keys = nodes.len(), mode = %mode, "batch fetch");

        let deliver = |index: usize| {
            let node = &nodes[index];
            let result: StoreResult<T> = match self.injected_failure(node) {
                Some(err) => Err(err),
                None => fetch(node).ok_or(StoreError::NotFound { kind, node: *node }),
            };
            self.callbacks.fetch_add(1, Ordering::SeqCst);
            on_result(index, result);
        };

        if !self.parallel_callbacks {
            (0..nodes.len()).for_each(deliver);
            return;
        }

        // One worker per key, delivered in reverse so callers cannot depend
        // on in-order completion.
        std::thread::scope(|scope| {
            for index in (0..nodes.len()).rev() {
                let deliver = &deliver;
                scope.spawn(move || deliver(index));
            }
        });
    }
}

impl Default for InMemoryBackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStore for InMemoryBackingStore {
    fn get_tree(&self, node: &NodeId, mode: FetchMode) -> Option<RawTree> {
        self.record_single(ObjectKind::Tree, node, mode);
        self.lookup(node, mode, |r| &r.trees, |r, n, t| {
            r.trees.insert(n, t);
        })
    }

    fn get_blob(&self, node: &NodeId, mode: FetchMode) -> Option<RawBlob> {
        self.record_single(ObjectKind::Blob, node, mode);
        self.lookup(node, mode, |r| &r.blobs, |r, n, b| {
            r.blobs.insert(n, b);
        })
    }

    fn get_blob_metadata(&self, node: &NodeId, mode: FetchMode) -> Option<RawBlobMetadata> {
        self.record_single(ObjectKind::BlobMetadata, node, mode);
        self.lookup(node, mode, |r| &r.metadata, |r, n, m| {
            r.metadata.insert(n, m);
        })
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        let pending = std::mem::take(&mut *self.unflushed.write().expect("lock poisoned"));
        debug!(records = pending.len(), "flushing unflushed records into local tier");
        self.local.write().expect("lock poisoned").absorb(pending);
    }

    fn get_tree_batch(&self, nodes: &[NodeId], mode: FetchMode, on_result: BatchCallback<'_, RawTree>) {
        let fetch = |node: &NodeId| {
            self.lookup(node, mode, |r| &r.trees, |r, n, t| {
                r.trees.insert(n, t);
            })
        };
        self.run_batch(ObjectKind::Tree, nodes, mode, fetch, on_result);
    }

    fn get_blob_batch(&self, nodes: &[NodeId], mode: FetchMode, on_result: BatchCallback<'_, RawBlob>) {
        let fetch = |node: &NodeId| {
            self.lookup(node, mode, |r| &r.blobs, |r, n, b| {
                r.blobs.insert(n, b);
            })
        };
        self.run_batch(ObjectKind::Blob, nodes, mode, fetch, on_result);
    }

    fn get_blob_metadata_batch(
        &self,
        nodes: &[NodeId],
        mode: FetchMode,
        on_result: BatchCallback<'_, RawBlobMetadata>,
    ) {
        let fetch = |node: &NodeId| {
            self.lookup(node, mode, |r| &r.metadata, |r, n, m| {
                r.metadata.insert(n, m);
            })
        };
        self.run_batch(ObjectKind::BlobMetadata, nodes, mode, fetch, on_result);
    }
}

impl std::fmt::Debug for InMemoryBackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackingStore")
            .field("local_records", &self.local_len())
            .field("flushes", &self.flush_count())
            .field("parallel_callbacks", &self.parallel_callbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use crate::raw::{RawEntryType, RawTreeEntry};

    fn make_tree(names: &[&str]) -> RawTree {
        RawTree::new(
            names
                .iter()
                .map(|name| {
                    RawTreeEntry::new(
                        *name,
                        ContentHasher::BLOB.hash(name.as_bytes()),
                        RawEntryType::RegularFile,
                    )
                })
                .collect(),
        )
    }

    // -----------------------------------------------------------------------
    // Tiers
    // -----------------------------------------------------------------------

    #[test]
    fn local_only_never_reaches_remote() {
        let store = InMemoryBackingStore::new();
        let node = store.insert_tree(Tier::Remote, make_tree(&["a"]));

        assert!(store.get_tree(&node, FetchMode::LocalOnly).is_none());
        assert_eq!(store.get_tree(&node, FetchMode::AllowRemote).unwrap().len(), 1);
    }

    #[test]
    fn remote_hits_are_cached_locally() {
        let store = InMemoryBackingStore::new();
        let node = store.insert_blob(Tier::Remote, b"remote bytes".to_vec());
        assert_eq!(store.local_len(), 0);

        store.get_blob(&node, FetchMode::AllowRemote).unwrap();
        assert!(store.get_blob(&node, FetchMode::LocalOnly).is_some());
    }

    #[test]
    fn unflushed_records_appear_after_flush() {
        let store = InMemoryBackingStore::new();
        let node = store.insert_tree(Tier::Unflushed, make_tree(&["new"]));

        assert!(store.get_tree(&node, FetchMode::AllowRemote).is_none());
        store.flush();
        assert_eq!(store.flush_count(), 1);
        assert!(store.get_tree(&node, FetchMode::LocalOnly).is_some());
    }

    #[test]
    fn blob_insert_records_metadata() {
        let store = InMemoryBackingStore::new();
        let node = store.insert_blob(Tier::Local, b"12345".to_vec());
        let metadata = store.get_blob_metadata(&node, FetchMode::LocalOnly).unwrap();
        assert_eq!(metadata.total_size, 5);
        assert_eq!(metadata.content_sha256, ContentDigests::compute(b"12345").sha256);
        assert!(metadata.content_blake3.is_some());
    }

    #[test]
    fn metadata_without_blob() {
        let store = InMemoryBackingStore::new();
        let node = NodeId::from_array([4; 20]);
        let digests = ContentDigests::compute(b"elsewhere");
        store.insert_blob_metadata(
            Tier::Local,
            node,
            RawBlobMetadata {
                content_sha256: digests.sha256,
                content_blake3: None,
                total_size: digests.size,
            },
        );
        assert!(store.get_blob_metadata(&node, FetchMode::LocalOnly).is_some());
        assert!(store.get_blob(&node, FetchMode::AllowRemote).is_none());
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    #[test]
    fn batch_reports_each_index_once() {
        let store = InMemoryBackingStore::new();
        let a = store.insert_tree(Tier::Local, make_tree(&["a"]));
        let b = store.insert_tree(Tier::Remote, make_tree(&["b", "c"]));
        let missing = NodeId::from_array([9; 20]);

        let seen = Mutex::new(Vec::new());
        store.get_tree_batch(&[a, b, missing], FetchMode::AllowRemote, &|index, result| {
            seen.lock().unwrap().push((index, result.map(|t| t.len()).ok()));
        });

        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, vec![(0, Some(1)), (1, Some(2)), (2, None)]);
        assert_eq!(store.callback_count(), 3);
        assert_eq!(
            store.batch_calls(),
            vec![BatchCall {
                kind: ObjectKind::Tree,
                nodes: vec![a, b, missing],
                mode: FetchMode::AllowRemote,
            }]
        );
    }

    #[test]
    fn injected_failures_surface_in_batches() {
        let store = InMemoryBackingStore::new();
        let node = store.insert_blob(Tier::Local, b"present".to_vec());
        store.fail_node(node, StoreError::Remote("connection reset".into()));

        let seen = Mutex::new(None);
        store.get_blob_batch(&[node], FetchMode::AllowRemote, &|_, result| {
            *seen.lock().unwrap() = Some(result);
        });
        assert_eq!(
            seen.into_inner().unwrap(),
            Some(Err(StoreError::Remote("connection reset".into())))
        );

        store.clear_failures();
        store.get_blob_batch(&[node], FetchMode::AllowRemote, &|_, result| {
            assert!(result.is_ok());
        });
    }

    #[test]
    fn parallel_callbacks_run_off_the_calling_thread() {
        let store = InMemoryBackingStore::new().with_parallel_callbacks();
        let nodes: Vec<NodeId> = (0..8u8)
            .map(|i| store.insert_blob(Tier::Local, vec![i; 4]))
            .collect();

        let caller = std::thread::current().id();
        let threads = Mutex::new(HashSet::new());
        let indices = Mutex::new(Vec::new());
        store.get_blob_metadata_batch(&nodes, FetchMode::LocalOnly, &|index, result| {
            assert!(result.is_ok());
            threads.lock().unwrap().insert(std::thread::current().id());
            indices.lock().unwrap().push(index);
        });

        let mut indices = indices.into_inner().unwrap();
        indices.sort();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
        assert!(!threads.into_inner().unwrap().contains(&caller));
    }

    #[test]
    fn single_calls_are_recorded() {
        let store = InMemoryBackingStore::new();
        let node = NodeId::from_array([1; 20]);
        store.get_tree(&node, FetchMode::LocalOnly);
        store.get_blob(&node, FetchMode::AllowRemote);
        assert_eq!(
            store.single_calls(),
            vec![
                SingleCall {
                    kind: ObjectKind::Tree,
                    node,
                    mode: FetchMode::LocalOnly
                },
                SingleCall {
                    kind: ObjectKind::Blob,
                    node,
                    mode: FetchMode::AllowRemote
                },
            ]
        );
    }

    #[test]
    fn debug_format() {
        let store = InMemoryBackingStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryBackingStore"));
        assert!(debug.contains("local_records"));
    }
}
