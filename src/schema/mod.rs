//! Schema module - Configuration, data and result types for pathway fitting.

mod config;
mod conversion;
mod dataset;
mod evolution;

pub use config::*;
pub use conversion::*;
pub use dataset::*;
pub use evolution::*;
