//! Suss Wire - structural encoding of networks
//!
//! A packed network is a JSON envelope:
//! - `format`: encoding version
//! - `digest`: SHA-256 of the encoded network, hex
//! - `network`: nodes, links, relation descriptors, meta and `as_of`
//!
//! Timestamps travel as `[epoch, wall, idx]`. Node and link order are
//! preserved. Executable relations never travel; only their descriptors do,
//! and a [`RelationFactory`](suss_state::RelationFactory) rebuilds them on
//! load.

pub mod envelope;
pub mod error;
pub mod pack;

pub use envelope::*;
pub use error::*;
pub use pack::*;
