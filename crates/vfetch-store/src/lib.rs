//! Backing-store contract for vfetch.
//!
//! The import engine never reads storage itself. It talks to a content-keyed
//! backing store through the [`BackingStore`] trait: single-key fetches that
//! return an optional raw record, batch fetches that report one result per
//! key through a callback, and a `flush` that refreshes the store's local
//! view.
//!
//! # Raw Records
//!
//! - [`RawTree`] / [`RawTreeEntry`] -- directory listing as the store keeps it
//! - [`RawBlob`] -- file contents
//! - [`RawBlobMetadata`] -- content checksums and size
//!
//! # Storage Backends
//!
//! - [`InMemoryBackingStore`] -- two-tier (local / remote) store for tests,
//!   tooling, and embedding
//!
//! # Contract
//!
//! 1. A batch fetch invokes its callback exactly once per key index before
//!    it returns, from the calling thread or from worker threads.
//! 2. A local-only fetch never reaches remote state.
//! 3. Records are immutable once written; only a root tree may newly appear
//!    locally after a concurrent writer publishes it and the store is flushed.

pub mod error;
pub mod memory;
pub mod raw;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::{BatchCall, InMemoryBackingStore, SingleCall, Tier};
pub use raw::{ObjectKind, RawBlob, RawBlobMetadata, RawEntryType, RawTree, RawTreeEntry};
pub use traits::{BackingStore, BatchCallback, FetchMode};
