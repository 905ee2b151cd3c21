//! Foundation types for vfetch.
//!
//! This crate provides the identifiers and path types shared by the backing
//! store contract, the filesystem object model, and the import engine. Every
//! other vfetch crate depends on `vfetch-types`.
//!
//! # Key Types
//!
//! - [`NodeId`] -- 20-byte revision hash naming a record in the backing store
//! - [`Hash32`] -- 32-byte content digest (SHA-256 or BLAKE3)
//! - [`ObjectId`] -- Opaque, variable-length identifier handed to the filesystem
//! - [`RelativePath`] / [`PathComponent`] -- Validated repository paths
//! - [`ProxyHash`] -- The (path, revision) pair behind an [`ObjectId`]

pub mod error;
pub mod hash;
pub mod object;
pub mod path;
pub mod proxy;

pub use error::TypeError;
pub use hash::{Hash32, NodeId};
pub use object::ObjectId;
pub use path::{PathComponent, RelativePath};
pub use proxy::{ObjectIdFormat, ProxyHash};
