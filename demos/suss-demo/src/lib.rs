//! Suss Demo - example networks
//!
//! - [`temperature`]: celsius and fahrenheit bound by a linear relation
//! - [`shadow`]: a flat object mirrored as observed nodes and read back

pub mod shadow;
pub mod temperature;

pub use shadow::*;
pub use temperature::*;
