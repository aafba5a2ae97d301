//! Suss Standard Relations
//!
//! Ready-made relations for common network shapes:
//! - linear: `y = a + b·x`, solved in either direction
//! - map: forward/backward transforms picked by recency
//! - join: key-matched propagation
//! - mark: copy the source value onto the target
//! - reduce: fold the source into an accumulating target
//! - constrain: residual check with a caller-supplied repair
//! - gather: many-to-one fold, run as an op relation
//!
//! Relations that need no closures can be rebuilt from their descriptors
//! by [`StandardRelations`].

pub mod constrain;
pub mod factory;
pub mod gather;
pub mod linear;
pub mod map;
pub mod reduce;

pub use constrain::*;
pub use factory::*;
pub use gather::*;
pub use linear::*;
pub use map::*;
pub use reduce::*;
