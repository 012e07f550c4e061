//! Generational genetic algorithm driving one independent run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::compute::{Integrator, NewtonSolver, PathwayModel, Rk4Integrator, SteadyStateSolver};
use crate::schema::{
    ConfigError, EvolutionPhase, EvolutionProgress, EvolutionStats, FitConfig, GenerationRecord,
    Individual, RunResult, StopReason,
};

use super::archive::HallOfFame;
use super::fitness::FitnessEvaluator;
use super::genome::GenomeRng;

/// Everything a finished (or stopped) run hands back.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Per-generation trace.
    pub result: RunResult,
    /// Best individual seen during the run.
    pub hall_of_fame: Option<Individual>,
    /// Last evaluated population.
    pub population: Vec<Individual>,
    pub stats: EvolutionStats,
}

/// Evolution engine that runs the search.
///
/// The generation loop is an explicit state machine (see [`EvolutionPhase`])
/// that can be driven one phase at a time with [`advance`](Self::advance) or
/// to completion with [`run`](Self::run).
pub struct EvolutionEngine<M, S = NewtonSolver, I = Rk4Integrator> {
    config: FitConfig,
    evaluator: FitnessEvaluator<M, S, I>,
    rng: GenomeRng,
    run: usize,
    phase: EvolutionPhase,
    population: Vec<Individual>,
    hall_of_fame: HallOfFame,
    result: RunResult,
    total_evaluations: u64,
    generation_evaluations: usize,
    started: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl<M, S, I> EvolutionEngine<M, S, I>
where
    M: PathwayModel,
    S: SteadyStateSolver,
    I: Integrator,
{
    /// Create an engine for run number `run`, seeded with `seed`.
    pub fn new(
        config: &FitConfig,
        evaluator: FitnessEvaluator<M, S, I>,
        run: usize,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            evaluator,
            rng: GenomeRng::new(seed),
            run,
            phase: EvolutionPhase::Init,
            population: Vec::new(),
            hall_of_fame: HallOfFame::new(1),
            result: RunResult::new(run),
            total_evaluations: 0,
            generation_evaluations: 0,
            started: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an external cancellation flag.
    pub fn with_cancel_handle(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn phase(&self) -> EvolutionPhase {
        self.phase
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    /// Trace recorded so far.
    pub fn result(&self) -> &RunResult {
        &self.result
    }

    /// Execute the current phase and move to the next one.
    pub fn advance(&mut self) -> EvolutionPhase {
        self.phase = match self.phase {
            EvolutionPhase::Init => {
                self.initialize();
                EvolutionPhase::Evaluate
            }
            EvolutionPhase::Evaluate => {
                self.evaluate_population();
                EvolutionPhase::Record
            }
            EvolutionPhase::Record => {
                self.record_generation();
                match self.should_stop() {
                    Some(reason) => {
                        self.result.stop_reason = Some(reason);
                        EvolutionPhase::Terminal
                    }
                    None => EvolutionPhase::Select,
                }
            }
            EvolutionPhase::Select => {
                self.select();
                EvolutionPhase::Vary
            }
            EvolutionPhase::Vary => {
                self.vary();
                EvolutionPhase::Elitism
            }
            EvolutionPhase::Elitism => {
                self.reinsert_elite();
                EvolutionPhase::Evaluate
            }
            EvolutionPhase::Terminal => EvolutionPhase::Terminal,
        };
        self.phase
    }

    /// Sample a fresh population and reset the run state.
    fn initialize(&mut self) {
        let genome_len = self.evaluator.context().genome_len();
        self.population = (0..self.config.population.size)
            .map(|_| Individual::new(self.rng.random_genome(genome_len)))
            .collect();
        self.hall_of_fame.clear();
        self.result = RunResult::new(self.run);
        self.total_evaluations = 0;
        self.started = Some(Instant::now());
    }

    /// Evaluate every individual without a loss.
    fn evaluate_population(&mut self) {
        for (index, individual) in self.population.iter_mut().enumerate() {
            if individual.genome().is_within_bounds() {
                continue;
            }
            let mut genome = individual.take_genome();
            let clamped = genome.repair();
            log::warn!(
                "Run {}: clamped {clamped} out-of-range gene(s) of individual {index}",
                self.run
            );
            individual.replace_genome(genome);
        }

        let evaluator = &self.evaluator;
        let evaluated = self
            .population
            .par_iter_mut()
            .filter(|individual| individual.fitness().is_none())
            .map(|individual| {
                let loss = evaluator.score_sampled(individual.genome());
                individual.set_fitness(loss);
            })
            .count();

        self.generation_evaluations = evaluated;
        self.total_evaluations += evaluated as u64;
    }

    /// Append the generation minimum to the trace and update the hall of fame.
    fn record_generation(&mut self) {
        let Some(best) = self
            .population
            .iter()
            .min_by(|a, b| a.rank_key().total_cmp(&b.rank_key()))
        else {
            return;
        };

        self.result.generations.push(GenerationRecord {
            best_score: best.rank_key(),
            best_decoded_individual: self.evaluator.decode_sampled(best.genome()),
        });
        self.hall_of_fame.update(&self.population);

        log::debug!(
            "Run {} generation {}: best {:.6e}, {} evaluations",
            self.run,
            self.result.generations.len() - 1,
            best.rank_key(),
            self.generation_evaluations
        );
    }

    /// Tournament selection with replacement; the lowest loss wins.
    fn select(&mut self) {
        let n = self.population.len();
        let size = self.config.algorithm.tournament_size;
        let selected: Vec<Individual> = (0..n)
            .map(|_| {
                let mut winner = self.rng.index(n);
                for _ in 1..size {
                    let aspirant = self.rng.index(n);
                    if self.population[aspirant].rank_key() < self.population[winner].rank_key() {
                        winner = aspirant;
                    }
                }
                self.population[winner].clone()
            })
            .collect();
        self.population = selected;
    }

    /// Pairwise two-point crossover, then polynomial-bounded mutation.
    fn vary(&mut self) {
        let algorithm = &self.config.algorithm;

        for i in (1..self.population.len()).step_by(2) {
            if !self.rng.chance(algorithm.crossover_rate) {
                continue;
            }
            let (left, right) = self.population.split_at_mut(i);
            let (first, second) = (&mut left[i - 1], &mut right[0]);
            let (a, b) = self
                .rng
                .two_point_crossover(first.take_genome(), second.take_genome());
            first.replace_genome(a);
            second.replace_genome(b);
        }

        for individual in &mut self.population {
            if !self.rng.chance(algorithm.mutation_probability) {
                continue;
            }
            let genome = individual.take_genome();
            individual.replace_genome(self.rng.polynomial_mutate(
                genome,
                algorithm.eta,
                algorithm.mutation_rate,
            ));
        }
    }

    /// Overwrite the last slot with the best individual seen so far.
    fn reinsert_elite(&mut self) {
        if let Some(elite) = self.hall_of_fame.best()
            && let Some(last) = self.population.last_mut()
        {
            *last = elite.clone();
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.result.generations.len() >= self.config.population.generations {
            return Some(StopReason::MaxGenerations);
        }

        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if let Some(limit) = self.config.max_run_seconds
            && self.elapsed_seconds() >= limit
        {
            return Some(StopReason::TimeBudget);
        }

        None
    }

    fn elapsed_seconds(&self) -> f64 {
        self.started
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let mut losses: Vec<f64> = self
            .population
            .iter()
            .filter_map(Individual::fitness)
            .collect();
        losses.sort_by(f64::total_cmp);
        let median_fitness = match losses.len() {
            0 => f64::NAN,
            n if n % 2 == 1 => losses[n / 2],
            n => 0.5 * (losses[n / 2 - 1] + losses[n / 2]),
        };

        EvolutionProgress {
            run: self.run,
            generation: self.result.generations.len().saturating_sub(1),
            total_generations: self.config.population.generations,
            best_fitness: self
                .hall_of_fame
                .best()
                .map_or(f64::INFINITY, Individual::rank_key),
            generation_best: self
                .result
                .last()
                .map_or(f64::INFINITY, |record| record.best_score),
            median_fitness,
            evaluations: self.generation_evaluations,
            phase: self.phase,
        }
    }

    /// Run evolution with a callback invoked after every recorded generation.
    pub fn run_with_callback<F>(&mut self, callback: F) -> RunOutcome
    where
        F: Fn(&EvolutionProgress),
    {
        if self.phase == EvolutionPhase::Terminal {
            self.phase = EvolutionPhase::Init;
        }

        loop {
            let phase = self.phase;
            let next = self.advance();
            if phase == EvolutionPhase::Record {
                callback(&self.progress());
            }
            if next == EvolutionPhase::Terminal {
                break;
            }
        }

        let elapsed = self.elapsed_seconds();
        let stop_reason = self
            .result
            .stop_reason
            .unwrap_or(StopReason::MaxGenerations);
        let hall_of_fame = self.hall_of_fame.best().cloned();

        RunOutcome {
            stats: EvolutionStats {
                generations: self.result.generations.len(),
                total_evaluations: self.total_evaluations,
                best_fitness: hall_of_fame
                    .as_ref()
                    .map_or(f64::INFINITY, Individual::rank_key),
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    self.total_evaluations as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
            result: self.result.clone(),
            hall_of_fame,
            population: self.population.clone(),
        }
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> RunOutcome {
        self.run_with_callback(|_| {})
    }
}
