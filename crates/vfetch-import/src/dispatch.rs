//! Deduplicating batch dispatch.
//!
//! A dispatch takes the pending requests of one kind, groups them by
//! backing-store key, issues a single batch fetch for the unique keys, and
//! resolves every request of a key with the same outcome.
//!
//! Groups live in an arena owned by the dispatch call. The batch callback
//! borrows the arena and takes a group out of its slot when the store reports
//! that key, so each group is resolved at most once. The store must finish
//! every callback before its batch call returns; the arena is dropped only
//! after that.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, trace, Level};
use vfetch_store::{BackingStore, FetchMode, StoreResult};
use vfetch_types::NodeId;

use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::fallback::{Disposition, FallbackPolicy};
use crate::kind::ImportKind;
use crate::request::ImportRequest;
use crate::telemetry::{LogEvent, StructuredLogger};
use crate::watch::{RequestWatch, RequestWatches};

/// Summary of one dispatch.
///
/// Requests the fallback policy deferred are handed back in `deferred`,
/// still unfulfilled, for the secondary import path.
pub struct BatchOutcome<K: ImportKind> {
    /// Requests submitted.
    pub requests: usize,
    /// Distinct keys sent to the backing store.
    pub unique_keys: usize,
    /// Requests resolved with an object.
    pub fulfilled: usize,
    /// Requests resolved with a failure.
    pub failed: usize,
    /// Keys whose failure was deferred.
    pub deferred_keys: usize,
    /// Deferred requests.
    pub deferred: Vec<ImportRequest<K>>,
}

impl<K: ImportKind> BatchOutcome<K> {
    fn empty() -> Self {
        Self {
            requests: 0,
            unique_keys: 0,
            fulfilled: 0,
            failed: 0,
            deferred_keys: 0,
            deferred: Vec::new(),
        }
    }

    /// Returns `true` if every request was resolved by this dispatch.
    pub fn is_complete(&self) -> bool {
        self.deferred.is_empty()
    }

    pub fn into_deferred(self) -> Vec<ImportRequest<K>> {
        self.deferred
    }
}

impl<K: ImportKind> fmt::Debug for BatchOutcome<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOutcome")
            .field("kind", &K::KIND)
            .field("requests", &self.requests)
            .field("unique_keys", &self.unique_keys)
            .field("fulfilled", &self.fulfilled)
            .field("failed", &self.failed)
            .field("deferred_keys", &self.deferred_keys)
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

/// All requests of a batch that share one key.
struct DedupEntry<'w, K: ImportKind> {
    node: NodeId,
    requests: Vec<ImportRequest<K>>,
    watch: RequestWatch<'w>,
}

struct Tally<K: ImportKind> {
    fulfilled: AtomicUsize,
    failed: AtomicUsize,
    deferred_keys: AtomicUsize,
    deferred: Mutex<Vec<ImportRequest<K>>>,
}

impl<K: ImportKind> Tally<K> {
    fn new() -> Self {
        Self {
            fulfilled: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            deferred_keys: AtomicUsize::new(0),
            deferred: Mutex::new(Vec::new()),
        }
    }

    fn into_outcome(self, requests: usize, unique_keys: usize) -> BatchOutcome<K> {
        BatchOutcome {
            requests,
            unique_keys,
            fulfilled: self.fulfilled.into_inner(),
            failed: self.failed.into_inner(),
            deferred_keys: self.deferred_keys.into_inner(),
            deferred: self.deferred.into_inner().expect("lock poisoned"),
        }
    }
}

/// Shared inputs of one dispatch.
pub(crate) struct DispatchContext<'a> {
    pub store: &'a dyn BackingStore,
    pub config: &'a ImportConfig,
    pub watches: &'a RequestWatches,
    pub logger: Option<&'a dyn StructuredLogger>,
}

/// Dispatch `requests` to the backing store in one batch.
pub(crate) fn dispatch<K: ImportKind>(ctx: &DispatchContext<'_>, requests: Vec<ImportRequest<K>>) -> BatchOutcome<K> {
    if requests.is_empty() {
        return BatchOutcome::empty();
    }

    let request_count = requests.len();
    let entries = group(requests, ctx.watches);
    let nodes: Vec<NodeId> = entries.iter().map(|entry| entry.node).collect();
    let slots: Vec<Mutex<Option<DedupEntry<'_, K>>>> =
        entries.into_iter().map(|entry| Mutex::new(Some(entry))).collect();

    let policy = FallbackPolicy::for_kind(ctx.config, K::KIND);
    let tally = Tally::new();

    debug!(
        kind = %K::KIND,
        requests = request_count,
        keys = nodes.len(),
        fallback = policy.is_enabled(),
        "dispatching import batch"
    );

    let on_result = |index: usize, result: StoreResult<K::Raw>| {
        let Some(slot) = slots.get(index) else {
            error!(kind = %K::KIND, index, keys = slots.len(), "backing store reported an index outside the batch");
            return;
        };
        let Some(entry) = slot.lock().expect("lock poisoned").take() else {
            error!(kind = %K::KIND, node = %nodes[index], "backing store reported a key twice");
            if cfg!(debug_assertions) {
                panic!("duplicate batch callback for {} {}", K::KIND, nodes[index]);
            }
            return;
        };
        resolve(ctx, policy, &tally, entry, result);
    };
    K::fetch_batch(ctx.store, &nodes, FetchMode::AllowRemote, &on_result);

    for slot in slots {
        let Some(entry) = slot.into_inner().expect("lock poisoned") else {
            continue;
        };
        error!(kind = %K::KIND, node = %entry.node, "backing store returned without reporting key");
        let err = ImportError::NoResult {
            kind: K::KIND,
            node: entry.node,
        };
        tally.failed.fetch_add(entry.requests.len(), Ordering::SeqCst);
        for request in entry.requests {
            request.fulfill(Err(err.clone()));
        }
        entry.watch.finish();
    }

    tally.into_outcome(request_count, nodes.len())
}

/// Group requests by key, in order of first appearance.
fn group<'w, K: ImportKind>(requests: Vec<ImportRequest<K>>, watches: &'w RequestWatches) -> Vec<DedupEntry<'w, K>> {
    let verbose = tracing::enabled!(Level::TRACE);
    let mut index: HashMap<NodeId, usize> = HashMap::with_capacity(requests.len());
    let mut entries: Vec<DedupEntry<'w, K>> = Vec::new();

    for request in requests {
        let node = request.fingerprint();
        match index.entry(node) {
            Entry::Occupied(slot) => {
                let entry = &mut entries[*slot.get()];
                let first = entry.requests[0].object_id();
                if verbose && first != request.object_id() {
                    trace!(
                        kind = %K::KIND,
                        node = %node,
                        first = %first,
                        duplicate = %request.object_id(),
                        "requests share a key but not an object id"
                    );
                }
                entry.requests.push(request);
            }
            Entry::Vacant(slot) => {
                slot.insert(entries.len());
                entries.push(DedupEntry {
                    node,
                    requests: vec![request],
                    watch: watches.start(),
                });
            }
        }
    }
    entries
}

fn resolve<K: ImportKind>(
    ctx: &DispatchContext<'_>,
    policy: FallbackPolicy,
    tally: &Tally<K>,
    entry: DedupEntry<'_, K>,
    result: StoreResult<K::Raw>,
) {
    let DedupEntry { node, requests, watch } = entry;
    let waiters = requests.len();
    let disposition = policy.decide(&result);

    match result {
        Ok(raw) => {
            let outputs = convert_for_waiters(raw, &requests, ctx.config);
            trace!(kind = %K::KIND, node = %node, waiters, "imported");
            tally.fulfilled.fetch_add(waiters, Ordering::SeqCst);
            for (request, output) in requests.into_iter().zip(outputs) {
                request.fulfill(Ok(output));
            }
        }
        Err(err) if disposition == Disposition::Defer => {
            debug!(kind = %K::KIND, node = %node, waiters, error = %err, "deferring to secondary import");
            if let Some(logger) = ctx.logger {
                logger.log_event(LogEvent::FetchMiss {
                    repo: ctx.config.repo_name.clone(),
                    kind: K::KIND,
                    node,
                    reason: err.to_string(),
                });
            }
            tally.deferred_keys.fetch_add(1, Ordering::SeqCst);
            tally.deferred.lock().expect("lock poisoned").extend(requests);
        }
        Err(err) => {
            debug!(kind = %K::KIND, node = %node, waiters, error = %err, "import failed");
            let err = ImportError::from(err);
            tally.failed.fetch_add(waiters, Ordering::SeqCst);
            for request in requests {
                request.fulfill(Err(err.clone()));
            }
        }
    }

    watch.finish();
}

/// Convert `raw` once per group of requests that can share the result.
///
/// The returned objects line up with `requests`.
fn convert_for_waiters<K: ImportKind>(
    raw: K::Raw,
    requests: &[ImportRequest<K>],
    config: &ImportConfig,
) -> Vec<Arc<K::Output>> {
    let mut outputs: Vec<Arc<K::Output>> = Vec::with_capacity(requests.len());
    let mut firsts: Vec<usize> = Vec::new();

    for (i, request) in requests.iter().enumerate() {
        let shared = firsts
            .iter()
            .copied()
            .find(|&first| K::shares_conversion(&requests[first], request));
        let output = match shared {
            Some(first) => Arc::clone(&outputs[first]),
            None => {
                firsts.push(i);
                Arc::new(K::convert(raw.clone(), request, config))
            }
        };
        outputs.push(output);
    }
    outputs
}
