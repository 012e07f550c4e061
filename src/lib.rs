//! Pathway Fit - Evolutionary kinetic-parameter estimation for signaling
//! pathway ODE models.
//!
//! Candidate parameter sets are encoded as genomes on the unit hypercube,
//! decoded into physical rate constants, simulated against multi-dose
//! time-course data and scored by squared error. A generational genetic
//! algorithm searches for the lowest loss over several independent runs.
//!
//! # Architecture
//!
//! The crate is split into three main modules:
//!
//! - `schema`: Configuration, dataset and evolution record types
//! - `compute`: Numerical computation (codec, model, steady state,
//!   integrator) and the evolutionary search
//! - `storage`: CSV ingestion and run artifact persistence
//!
//! # Example
//!
//! ```rust,no_run
//! use pathway_fit::{
//!     compute::RelayModel,
//!     compute::evolution::{FitContext, FitnessEvaluator},
//!     schema::{ConversionSpec, FitConfig, Genome},
//!     storage::load_dataset,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FitConfig::default();
//! let dataset = load_dataset("data/phospho", "data/nuclear")?;
//! let conversion = ConversionSpec::log_uniform(&[-2.0; 4], &[2.0; 4])?;
//! let context = FitContext::new(
//!     RelayModel,
//!     conversion,
//!     dataset,
//!     vec![0.0, 0.0],
//!     vec![1.0],
//!     &config,
//! )?;
//! let evaluator = FitnessEvaluator::new(context, &config);
//!
//! let loss = evaluator.evaluate(&Genome::new(vec![0.5; 4])?)?;
//! println!("Loss at the centre of the search box: {loss}");
//! # Ok(())
//! # }
//! ```

pub mod compute;
pub mod schema;
pub mod storage;

// Re-export commonly used types
pub use compute::evolution::{EvolutionEngine, FitContext, FitnessEvaluator, RunOrchestrator};
pub use compute::{PathwayModel, RelayModel};
pub use schema::{ConversionSpec, FitConfig, Genome, JobConfig};
