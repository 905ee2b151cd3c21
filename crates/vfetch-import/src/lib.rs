//! Import engine between a virtual filesystem and its backing store.
//!
//! The filesystem submits [`ImportRequest`]s for trees, blobs, and blob
//! metadata. [`DatapackStore`] groups a batch by backing-store key, fetches
//! each unique key once, converts the raw record into the object model, and
//! hands the same `Arc` to every request waiting on that key.
//!
//! When the backing store fails a key, the per-kind [`FallbackPolicy`]
//! decides whether the waiters see the failure or are deferred to a
//! [`SecondaryImporter`]. [`ImportPipeline`] wires both tiers together.
//!
//! # Modules
//!
//! - [`config`] -- [`ImportConfig`] and its live-reloadable holder
//! - [`request`] -- requests and the handles callers wait on
//! - [`kind`] -- the three importable kinds
//! - [`convert`] -- raw record to object model conversion
//! - [`dispatch`] -- the deduplicating batch dispatcher
//! - [`datapack`] -- batch and single-key entry points
//! - [`fallback`] -- failure disposition per kind
//! - [`secondary`] / [`pipeline`] -- the secondary import path
//! - [`watch`] / [`telemetry`] -- duration watches and structured events

pub mod config;
pub mod convert;
pub mod datapack;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod kind;
pub mod pipeline;
pub mod request;
pub mod secondary;
pub mod telemetry;
pub mod watch;

#[cfg(test)]
mod testing;

pub use config::{ImportConfig, ReloadableConfig};
pub use datapack::DatapackStore;
pub use dispatch::BatchOutcome;
pub use error::{ConfigError, ImportError, ImportResult};
pub use fallback::{Disposition, FallbackPolicy};
pub use kind::{BlobImport, BlobMetadataImport, ImportKind, TreeImport};
pub use pipeline::{ImportPipeline, PipelineReport};
pub use request::{HandleState, ImportHandle, ImportRequest};
pub use secondary::{BackingStoreImporter, SecondaryImporter};
pub use telemetry::{FanoutLogger, LogEvent, MemoryLogger, StructuredLogger, TracingLogger};
pub use watch::{RequestWatch, RequestWatches};
