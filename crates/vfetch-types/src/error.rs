use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("path component contains a directory separator: {0:?}")]
    ContainsSeparator(String),

    #[error("path component is empty")]
    EmptyComponent,

    #[error("reserved path component: {0:?}")]
    ReservedComponent(String),

    #[error("invalid relative path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("unknown object id type byte {0:#04x}")]
    UnknownObjectIdType(u8),

    #[error("malformed object id: {0}")]
    MalformedObjectId(String),
}
