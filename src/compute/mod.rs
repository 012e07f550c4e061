//! Compute module - Numerical machinery for pathway parameter fitting.

mod codec;
mod integrator;
mod model;
mod steady_state;

pub mod evolution;

pub use codec::*;
pub use integrator::*;
pub use model::*;
pub use steady_state::*;
