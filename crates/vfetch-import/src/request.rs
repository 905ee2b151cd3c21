use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::trace;
use vfetch_store::ObjectKind;
use vfetch_types::{NodeId, ObjectId, ProxyHash};

use crate::error::{ImportError, ImportResult};
use crate::kind::ImportKind;

/// A pending request to import one object of kind `K`.
///
/// The request owns the producing side of a single-use result channel.
/// [`fulfill`](Self::fulfill) consumes the request, so a request can be
/// completed at most once.
pub struct ImportRequest<K: ImportKind> {
    object_id: ObjectId,
    proxy_hash: ProxyHash,
    promise: oneshot::Sender<ImportResult<Arc<K::Output>>>,
}

impl<K: ImportKind> ImportRequest<K> {
    /// Create a request and the handle its caller waits on.
    pub fn new(object_id: ObjectId, proxy_hash: ProxyHash) -> (Self, ImportHandle<K::Output>) {
        let (promise, receiver) = oneshot::channel();
        let request = Self {
            object_id,
            proxy_hash,
            promise,
        };
        (request, ImportHandle { receiver })
    }

    pub fn kind(&self) -> ObjectKind {
        K::KIND
    }

    /// The backing-store key for this request.
    pub fn fingerprint(&self) -> NodeId {
        *self.proxy_hash.node()
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn proxy_hash(&self) -> &ProxyHash {
        &self.proxy_hash
    }

    /// Deliver the result to the waiter.
    ///
    /// Returns `false` if the waiter already dropped its handle.
    pub fn fulfill(self, result: ImportResult<Arc<K::Output>>) -> bool {
        if self.promise.send(result).is_err() {
            trace!(kind = %K::KIND, id = %self.object_id, "waiter dropped before fulfillment");
            return false;
        }
        true
    }
}

impl<K: ImportKind> fmt::Debug for ImportRequest<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportRequest")
            .field("kind", &K::KIND)
            .field("object_id", &self.object_id)
            .field("proxy_hash", &self.proxy_hash)
            .finish()
    }
}

/// Observed state of an [`ImportHandle`].
#[derive(Debug)]
pub enum HandleState<T> {
    /// Not resolved yet. The request is either in flight or deferred to the
    /// secondary import path.
    Pending,
    /// Resolved with this outcome.
    Ready(ImportResult<Arc<T>>),
    /// The request was dropped without being fulfilled.
    Abandoned,
}

impl<T> HandleState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// The waiting side of an [`ImportRequest`].
#[derive(Debug)]
pub struct ImportHandle<T> {
    receiver: oneshot::Receiver<ImportResult<Arc<T>>>,
}

impl<T> ImportHandle<T> {
    /// Wait for the result.
    ///
    /// Resolves to [`ImportError::Abandoned`] if the request is dropped
    /// unfulfilled.
    pub async fn wait(self) -> ImportResult<Arc<T>> {
        self.receiver.await.unwrap_or(Err(ImportError::Abandoned))
    }

    /// Block the current thread until the result arrives.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_wait(self) -> ImportResult<Arc<T>> {
        self.receiver.blocking_recv().unwrap_or(Err(ImportError::Abandoned))
    }

    /// Check for a result without waiting.
    ///
    /// Once a result has been taken, later calls report `Abandoned`.
    pub fn try_take(&mut self) -> HandleState<T> {
        match self.receiver.try_recv() {
            Ok(result) => HandleState::Ready(result),
            Err(TryRecvError::Empty) => HandleState::Pending,
            Err(TryRecvError::Closed) => HandleState::Abandoned,
        }
    }
}

#[cfg(test)]
mod tests {
    use vfetch_model::Blob;
    use vfetch_types::RelativePath;

    use super::*;
    use crate::kind::BlobImport;

    fn request() -> (ImportRequest<BlobImport>, ImportHandle<Blob>) {
        let proxy = ProxyHash::new(RelativePath::new("a.txt").unwrap(), NodeId::from_array([7; 20]));
        ImportRequest::new(ObjectId::from_bytes(vec![1]), proxy)
    }

    #[tokio::test]
    async fn wait_receives_fulfillment() {
        let (request, handle) = request();
        assert_eq!(request.kind(), ObjectKind::Blob);
        assert_eq!(request.fingerprint(), NodeId::from_array([7; 20]));

        assert!(request.fulfill(Ok(Arc::new(Blob::new(b"hi".to_vec())))));
        let blob = handle.wait().await.unwrap();
        assert_eq!(blob.contents().as_ref(), b"hi");
    }

    #[tokio::test]
    async fn dropped_request_is_abandoned() {
        let (request, handle) = request();
        drop(request);
        assert_eq!(handle.wait().await.unwrap_err(), ImportError::Abandoned);
    }

    #[tokio::test]
    async fn fulfilled_from_another_thread() {
        let (request, handle) = request();
        std::thread::spawn(move || {
            request.fulfill(Err(ImportError::Abandoned));
        });
        assert!(handle.wait().await.is_err());
    }

    #[test]
    fn fulfill_after_handle_dropped() {
        let (request, handle) = request();
        drop(handle);
        assert!(!request.fulfill(Err(ImportError::Abandoned)));
    }

    #[test]
    fn try_take_states() {
        let (request, mut handle) = request();
        assert!(handle.try_take().is_pending());

        request.fulfill(Ok(Arc::new(Blob::new(Vec::new()))));
        assert!(matches!(handle.try_take(), HandleState::Ready(Ok(_))));
        assert!(matches!(handle.try_take(), HandleState::Abandoned));
    }

    #[test]
    fn blocking_wait_outside_runtime() {
        let (request, handle) = request();
        request.fulfill(Ok(Arc::new(Blob::new(vec![1, 2, 3]))));
        assert_eq!(handle.blocking_wait().unwrap().size(), 3);
    }
}
