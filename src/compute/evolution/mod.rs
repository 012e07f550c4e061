//! Evolutionary search over kinetic parameters.
//!
//! # Overview
//!
//! - **Fitness** (`fitness`): simulate a decoded parameter set against the
//!   dataset and score the squared error, with sentinel penalties for
//!   infeasible parameters
//! - **Genome Operations** (`genome`): random generation, two-point
//!   crossover and polynomial-bounded mutation on [0, 1]
//! - **Hall of Fame** (`archive`): best individual seen during a run
//! - **Search** (`search`): the generational state machine of one run
//! - **Runs** (`runs`): repeated independent runs and persistence
//!
//! # Example
//!
//! ```rust,no_run
//! use pathway_fit::compute::RelayModel;
//! use pathway_fit::compute::evolution::{FitContext, FitnessEvaluator, RunOrchestrator};
//! use pathway_fit::schema::{ConversionSpec, FitConfig};
//! use pathway_fit::storage::{MemorySink, load_dataset};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FitConfig::default();
//! let dataset = load_dataset("data/phospho", "data/nuclear")?;
//! let conversion = ConversionSpec::log_uniform(&[-3.0; 4], &[3.0; 4])?;
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
//! let orchestrator = RunOrchestrator::new(config, evaluator)?.with_callback(|progress| {
//!     println!("Run {} generation {}: best = {:.3e}",
//!         progress.run, progress.generation, progress.best_fitness);
//! });
//! let mut sink = MemorySink::default();
//! orchestrator.run_all(&mut sink)?;
//! # Ok(())
//! # }
//! ```

mod archive;
mod fitness;
mod genome;
mod runs;
mod search;

pub use archive::HallOfFame;
pub use fitness::{Evaluation, FitContext, FitnessEvaluator, nearest_index};
pub use genome::GenomeRng;
pub use runs::{ProgressCallback, RunError, RunOrchestrator, RunSummary};
pub use search::{EvolutionEngine, RunOutcome};
