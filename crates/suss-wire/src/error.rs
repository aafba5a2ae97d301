//! Wire errors

use thiserror::Error;

/// Encoding and decoding failures
#[derive(Error, Debug)]
pub enum WireError {
    // Encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Integrity errors
    #[error("Digest mismatch: envelope says {expected}, content hashes to {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("Unsupported format: {0}")]
    UnsupportedVersion(String),

    // Content errors
    #[error("Invalid lineage {lineage:?} on node {node}")]
    InvalidLineage { node: String, lineage: String },
}

pub type WireResult<T> = std::result::Result<T, WireError>;

impl WireError {
    /// Whether the payload was damaged or tampered with, as opposed to
    /// malformed or written by an incompatible encoder
    pub fn is_integrity(&self) -> bool {
        matches!(self, WireError::DigestMismatch { .. })
    }
}
