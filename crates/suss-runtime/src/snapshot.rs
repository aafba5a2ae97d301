//! Versioned snapshot store
//!
//! Propagation never mutates its input, so concurrent callers can each
//! derive a new network from the same base. The store arbitrates: a
//! derived network commits only if the base it was computed from is still
//! current.

use std::sync::Arc;

use parking_lot::RwLock;
use suss_state::Network;
use tracing::{debug, warn};

use crate::{RuntimeError, RuntimeResult};

/// A committed network and its version
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub version: u64,
    pub network: Arc<Network>,
}

/// Shared, versioned network with compare-and-swap commits
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Snapshot>,
}

impl SnapshotStore {
    pub fn new(network: Network) -> Self {
        SnapshotStore {
            current: RwLock::new(Snapshot {
                version: 0,
                network: Arc::new(network),
            }),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Snapshot {
        self.current.read().clone()
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Commit `network` if the store is still at `expected`
    pub fn compare_and_swap(&self, expected: u64, network: Network) -> RuntimeResult<u64> {
        let mut current = self.current.write();
        if current.version != expected {
            return Err(RuntimeError::SnapshotConflict {
                expected,
                actual: current.version,
            });
        }
        current.version += 1;
        current.network = Arc::new(network);
        debug!(version = current.version, "snapshot committed");
        Ok(current.version)
    }

    /// Derive from the current snapshot and commit, retrying on conflict.
    ///
    /// `derive` may run several times and must not have side effects.
    pub fn update<F>(&self, attempts: usize, mut derive: F) -> RuntimeResult<u64>
    where
        F: FnMut(&Network) -> RuntimeResult<Network>,
    {
        for attempt in 1..=attempts {
            let base = self.load();
            let next = derive(&base.network)?;
            match self.compare_and_swap(base.version, next) {
                Ok(version) => return Ok(version),
                Err(RuntimeError::SnapshotConflict { actual, .. }) => {
                    debug!(attempt, actual, "snapshot moved, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        warn!(attempts, "snapshot update abandoned");
        Err(RuntimeError::Contended { attempts })
    }
}
