//! Suss Runtime - Replica orchestration and main loop
//!
//! A replica owns one network and evolves it from pulses. Each tick runs
//! the staged loop:
//! 1. Ingest queued pulses
//! 2. Fuse remote timestamps into the local clock (Sway Rule)
//! 3. Dispatch by tag: Observe, Sync, Clock
//! 4. Start or continue Sync rounds for conflicted nodes
//! 5. Propagate from the touched nodes until quiescent
//! 6. Lift the clock to the network and schedule outbound pulses
//!
//! Transport is external: callers move pulses between `pop_outgoing` and
//! `queue_incoming`.

pub mod error;
pub mod replica;
pub mod snapshot;
pub mod telemetry;

pub use error::*;
pub use replica::*;
pub use snapshot::*;
pub use telemetry::*;
