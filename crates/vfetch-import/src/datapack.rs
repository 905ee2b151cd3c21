use std::sync::Arc;

use tracing::{debug, trace};
use vfetch_model::{Blob, BlobMetadata, Tree};
use vfetch_store::{BackingStore, FetchMode, ObjectKind};
use vfetch_types::{NodeId, ObjectId, ProxyHash, RelativePath};

use crate::config::{ImportConfig, ReloadableConfig};
use crate::convert;
use crate::dispatch::{dispatch, BatchOutcome, DispatchContext};
use crate::kind::{BlobImport, BlobMetadataImport, ImportKind, TreeImport};
use crate::request::ImportRequest;
use crate::telemetry::StructuredLogger;
use crate::watch::RequestWatches;

/// The filesystem's entry point into the backing store.
///
/// Batch imports deduplicate by key and fan results out to every waiter.
/// Single-key fetches serve the paths that cannot wait for a batch.
pub struct DatapackStore {
    store: Arc<dyn BackingStore>,
    config: Arc<ReloadableConfig>,
    logger: Option<Arc<dyn StructuredLogger>>,
    tree_watches: RequestWatches,
    blob_watches: RequestWatches,
    blob_metadata_watches: RequestWatches,
}

impl DatapackStore {
    pub fn new(store: Arc<dyn BackingStore>, config: Arc<ReloadableConfig>) -> Self {
        Self {
            store,
            config,
            logger: None,
            tree_watches: RequestWatches::new(),
            blob_watches: RequestWatches::new(),
            blob_metadata_watches: RequestWatches::new(),
        }
    }

    /// Send fetch-miss events to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn StructuredLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The configuration in effect right now.
    pub fn config(&self) -> Arc<ImportConfig> {
        self.config.snapshot()
    }

    /// Duration watches for batched keys of `kind`.
    pub fn watches(&self, kind: ObjectKind) -> &RequestWatches {
        match kind {
            ObjectKind::Tree => &self.tree_watches,
            ObjectKind::Blob => &self.blob_watches,
            ObjectKind::BlobMetadata => &self.blob_metadata_watches,
        }
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    /// Import a batch of requests of one kind.
    ///
    /// Failed keys whose kind has fallback enabled are returned unresolved in
    /// [`BatchOutcome::deferred`].
    pub fn import_batch<K: ImportKind>(&self, requests: Vec<ImportRequest<K>>) -> BatchOutcome<K> {
        let config = self.config.snapshot();
        let ctx = DispatchContext {
            store: self.store.as_ref(),
            config: &config,
            watches: self.watches(K::KIND),
            logger: self.logger.as_deref(),
        };
        dispatch(&ctx, requests)
    }

    pub fn get_tree_batch(&self, requests: Vec<ImportRequest<TreeImport>>) -> BatchOutcome<TreeImport> {
        self.import_batch(requests)
    }

    pub fn get_blob_batch(&self, requests: Vec<ImportRequest<BlobImport>>) -> BatchOutcome<BlobImport> {
        self.import_batch(requests)
    }

    pub fn get_blob_metadata_batch(
        &self,
        requests: Vec<ImportRequest<BlobMetadataImport>>,
    ) -> BatchOutcome<BlobMetadataImport> {
        self.import_batch(requests)
    }

    // -----------------------------------------------------------------------
    // Single keys
    // -----------------------------------------------------------------------

    /// Fetch the tree at `path` with revision `node`.
    ///
    /// The root tree can be rewritten by a concurrent writer, so a local miss
    /// on the root flushes the store and retries with remote allowed. Other
    /// paths go straight to a remote-allowed fetch. Returns `None` if the
    /// tree cannot be found.
    pub fn get_tree(&self, path: &RelativePath, node: &NodeId, tree_id: &ObjectId) -> Option<Tree> {
        let raw = if path.is_root() {
            match self.store.get_tree(node, FetchMode::LocalOnly) {
                Some(raw) => Some(raw),
                None => {
                    debug!(node = %node, "root tree missing locally, flushing and retrying");
                    self.store.flush();
                    self.store.get_tree(node, FetchMode::AllowRemote)
                }
            }
        } else {
            self.store.get_tree(node, FetchMode::AllowRemote)
        };

        let Some(raw) = raw else {
            trace!(path = %path, node = %node, "tree not found");
            return None;
        };
        let config = self.config.snapshot();
        Some(convert::from_raw_tree(raw, tree_id, path, &config))
    }

    /// Fetch a tree from local state only. Never flushes.
    pub fn get_tree_local(&self, tree_id: &ObjectId, proxy_hash: &ProxyHash) -> Option<Tree> {
        let raw = self.store.get_tree(proxy_hash.node(), FetchMode::LocalOnly)?;
        let config = self.config.snapshot();
        Some(convert::from_raw_tree(raw, tree_id, proxy_hash.path(), &config))
    }

    /// Fetch a blob from local state only.
    pub fn get_blob_local(&self, proxy_hash: &ProxyHash) -> Option<Blob> {
        self.store
            .get_blob(proxy_hash.node(), FetchMode::LocalOnly)
            .map(convert::from_raw_blob)
    }

    /// Fetch blob metadata from local state only.
    ///
    /// A miss is reported as `None` even if the blob itself is local; the
    /// caller decides whether to fetch the blob and hash it.
    pub fn get_local_blob_metadata(&self, proxy_hash: &ProxyHash) -> Option<BlobMetadata> {
        self.store
            .get_blob_metadata(proxy_hash.node(), FetchMode::LocalOnly)
            .map(convert::from_raw_blob_metadata)
    }

    /// Refresh the backing store's local view.
    pub fn flush(&self) {
        self.store.flush();
    }
}

impl std::fmt::Debug for DatapackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatapackStore")
            .field("config", &self.config.snapshot())
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}
