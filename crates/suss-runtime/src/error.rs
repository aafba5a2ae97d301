//! Runtime error types

use suss_core::SussError;
use suss_wire::WireError;
use thiserror::Error;

/// Runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    // State errors
    #[error(transparent)]
    State(#[from] SussError),

    // Encoding errors
    #[error(transparent)]
    Wire(#[from] WireError),

    // Commit errors
    #[error("snapshot conflict: expected version {expected}, found {actual}")]
    SnapshotConflict { expected: u64, actual: u64 },

    #[error("snapshot update gave up after {attempts} attempts")]
    Contended { attempts: usize },
}

impl RuntimeError {
    /// A retry against a fresh snapshot may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RuntimeError::SnapshotConflict { .. } | RuntimeError::Contended { .. }
        )
    }
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
