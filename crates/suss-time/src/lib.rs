//! Suss Time - Causal clock arithmetic
//!
//! This crate implements the hybrid logical clock:
//! - Timestamp construction and round refinement within a causal step
//! - The Sway Rule fusing remote timestamps into the local clock
//! - A replica clock engine with a pluggable wall-time source

pub mod clock;
pub mod engine;
pub mod sway;

pub use clock::*;
pub use engine::*;
pub use sway::*;
