//! Sway Rule - fusing a remote timestamp into the local clock
//!
//! The fused Epoch strictly exceeds both inputs' Epochs. Local SyncedWall and
//! Idx are preserved, so fusion never rewrites local causal history.

use suss_core::Timestamp;

/// Fuse `remote` into `local`
pub fn apply_sway_rule(local: &Timestamp, remote: &Timestamp) -> Timestamp {
    let epoch = if local < remote {
        remote.epoch + 1
    } else {
        local.epoch.max(remote.epoch) + 1
    };
    Timestamp::new(epoch, local.wall, local.idx)
}

/// Whether the remote timestamp is ahead of the local clock
#[inline]
pub fn would_sway_advance(local: &Timestamp, remote: &Timestamp) -> bool {
    local < remote
}
