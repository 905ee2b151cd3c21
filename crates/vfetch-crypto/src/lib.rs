//! Hashing primitives for vfetch.
//!
//! Provides domain-separated BLAKE3 derivation of revision hashes for store
//! writers, and the SHA-256 / BLAKE3 digest pair recorded in blob metadata.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod digest;
pub mod hasher;

pub use digest::ContentDigests;
pub use hasher::ContentHasher;
