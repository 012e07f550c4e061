//! Independent repeated runs and result persistence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;

use crate::compute::{Integrator, NewtonSolver, PathwayModel, Rk4Integrator, SteadyStateSolver};
use crate::schema::{ConfigError, EvolutionProgress, EvolutionStats, FitConfig, Individual};
use crate::storage::{ResultSink, StorageError};

use super::fitness::FitnessEvaluator;
use super::genome::GenomeRng;
use super::search::{EvolutionEngine, RunOutcome};

/// Progress callback type.
pub type ProgressCallback = Box<dyn Fn(&EvolutionProgress) + Send + Sync>;

/// Failure of a batch of runs.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Run could not start: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of one run as reported by the orchestrator.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: usize,
    /// Seed the run's engine was created with.
    pub seed: u64,
    /// Decoded parameters of the run's best individual.
    pub best_parameters: Option<Vec<f64>>,
    pub stats: EvolutionStats,
}

/// Executes `population.runs` independent evolutions and hands each trace
/// to a [`ResultSink`].
pub struct RunOrchestrator<M, S = NewtonSolver, I = Rk4Integrator> {
    config: FitConfig,
    evaluator: FitnessEvaluator<M, S, I>,
    cancelled: Arc<AtomicBool>,
    callback: Option<ProgressCallback>,
}

impl<M, S, I> RunOrchestrator<M, S, I>
where
    M: PathwayModel,
    S: SteadyStateSolver + Clone,
    I: Integrator + Clone,
{
    pub fn new(
        config: FitConfig,
        evaluator: FitnessEvaluator<M, S, I>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            evaluator,
            cancelled: Arc::new(AtomicBool::new(false)),
            callback: None,
        })
    }

    /// Report progress after every recorded generation of every run.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&EvolutionProgress) + Send + Sync + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Flag shared by all runs. Setting it stops the active runs at their next
    /// checkpoint and skips runs not yet started.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Run every evolution and persist each trace as soon as it finishes.
    ///
    /// Runs execute sequentially unless `parallel_runs` is set, in which case
    /// they are persisted in completion order. Summaries are returned in run
    /// order.
    pub fn run_all<R>(&self, sink: &mut R) -> Result<Vec<RunSummary>, RunError>
    where
        R: ResultSink + Send,
    {
        let mut master = match self.config.random_seed {
            Some(seed) => GenomeRng::new(seed),
            None => GenomeRng::random(),
        };
        let seeds: Vec<u64> = (0..self.config.population.runs)
            .map(|_| master.next_seed())
            .collect();

        log::info!(
            "Starting {} run(s): population {}, {} generations{}",
            seeds.len(),
            self.config.population.size,
            self.config.population.generations,
            if self.config.parallel_runs {
                ", parallel"
            } else {
                ""
            }
        );

        if self.config.parallel_runs {
            let sink = Mutex::new(sink);
            let summaries: Vec<Option<RunSummary>> = seeds
                .par_iter()
                .enumerate()
                .map(|(run, &seed)| -> Result<Option<RunSummary>, RunError> {
                    let Some(outcome) = self.execute(run, seed)? else {
                        return Ok(None);
                    };
                    let summary = self.summarize(run, seed, &outcome);
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .persist(outcome.result)?;
                    Ok(Some(summary))
                })
                .collect::<Result<_, RunError>>()?;
            Ok(summaries.into_iter().flatten().collect())
        } else {
            let mut summaries = Vec::with_capacity(seeds.len());
            for (run, &seed) in seeds.iter().enumerate() {
                let Some(outcome) = self.execute(run, seed)? else {
                    break;
                };
                summaries.push(self.summarize(run, seed, &outcome));
                sink.persist(outcome.result)?;
            }
            Ok(summaries)
        }
    }

    /// Run one evolution, or `None` when cancelled before it started.
    fn execute(&self, run: usize, seed: u64) -> Result<Option<RunOutcome>, ConfigError> {
        if self.cancelled.load(Ordering::Relaxed) {
            log::info!("Run {run} skipped: cancelled");
            return Ok(None);
        }

        let mut engine = EvolutionEngine::new(&self.config, self.evaluator.clone(), run, seed)
            .inspect_err(|e| log::error!("Run {run} could not start: {e}"))?
            .with_cancel_handle(Arc::clone(&self.cancelled));

        log::info!("Run {run} started (seed {seed})");
        let outcome = engine.run_with_callback(|progress| {
            if let Some(callback) = &self.callback {
                callback(progress);
            }
        });
        log::info!(
            "Run {run} finished: best {:.6e} after {} generations in {:.1}s ({:?})",
            outcome.stats.best_fitness,
            outcome.stats.generations,
            outcome.stats.elapsed_seconds,
            outcome.stats.stop_reason
        );
        Ok(Some(outcome))
    }

    fn summarize(&self, run: usize, seed: u64, outcome: &RunOutcome) -> RunSummary {
        RunSummary {
            run,
            seed,
            best_parameters: outcome
                .hall_of_fame
                .as_ref()
                .map(Individual::genome)
                .map(|genome| self.evaluator.decode_sampled(genome)),
            stats: outcome.stats.clone(),
        }
    }
}
