//! Filesystem object model for vfetch.
//!
//! These are the typed entities the virtual filesystem works with once a
//! record has been imported from the backing store. They are immutable after
//! construction and shared between waiters behind an `Arc`.
//!
//! - [`Tree`] -- name-ordered directory listing
//! - [`TreeEntry`] / [`TreeEntryType`] -- one child of a tree
//! - [`Blob`] -- file contents
//! - [`BlobMetadata`] -- content checksums and size

pub mod blob;
pub mod tree;

pub use blob::{Blob, BlobMetadata};
pub use tree::{Tree, TreeEntry, TreeEntryType};
