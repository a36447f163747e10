use thiserror::Error;

/// Errors produced by type conversions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown hash algorithm version: {0}")]
    UnknownHashVersion(i64),

    #[error("invalid hash algorithm version label: {0}")]
    InvalidVersionLabel(String),

    #[error("digest must not be empty")]
    EmptyDigest,
}
