//! Configuration types for the evolutionary fit.
//!
//! Everything here is fixed configuration supplied at startup, usually
//! deserialized from a JSON file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration for a parameter fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitConfig {
    /// Genetic operator settings.
    #[serde(default)]
    pub algorithm: GeneticAlgorithmConfig,
    /// Population, generation and run counts.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Simulation time grid.
    #[serde(default)]
    pub grid: TimeGridConfig,
    /// Sentinel penalties for infeasible parameter sets.
    #[serde(default)]
    pub penalties: PenaltyConfig,
    /// Master random seed. Each run derives its own seed from it.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Execute independent runs concurrently.
    #[serde(default)]
    pub parallel_runs: bool,
    /// Wall-clock budget per run in seconds, checked after every generation.
    #[serde(default)]
    pub max_run_seconds: Option<f64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            algorithm: GeneticAlgorithmConfig::default(),
            population: PopulationConfig::default(),
            grid: TimeGridConfig::default(),
            penalties: PenaltyConfig::default(),
            random_seed: None,
            parallel_runs: false,
            max_run_seconds: None,
        }
    }
}

impl FitConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.algorithm.validate()?;
        self.population.validate()?;
        self.grid.validate()?;
        self.penalties.validate()?;
        if let Some(seconds) = self.max_run_seconds
            && !(seconds.is_finite() && seconds > 0.0)
        {
            return Err(ConfigError::InvalidTimeBudget(seconds));
        }
        Ok(())
    }
}

/// Genetic algorithm operator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticAlgorithmConfig {
    /// Probability that a selected pair undergoes two-point crossover.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Probability that an individual is passed through the mutation operator.
    #[serde(default = "default_mutation_probability")]
    pub mutation_probability: f64,
    /// Per-gene mutation probability inside the mutation operator.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Distribution index of polynomial-bounded mutation.
    /// Small values spread offspring across the whole interval.
    #[serde(default = "default_eta")]
    pub eta: f64,
    /// Aspirants drawn per tournament.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
}

impl Default for GeneticAlgorithmConfig {
    fn default() -> Self {
        Self {
            crossover_rate: default_crossover_rate(),
            mutation_probability: default_mutation_probability(),
            mutation_rate: default_mutation_rate(),
            eta: default_eta(),
            tournament_size: default_tournament_size(),
        }
    }
}

fn default_crossover_rate() -> f64 {
    0.5
}
fn default_mutation_probability() -> f64 {
    0.2
}
fn default_mutation_rate() -> f64 {
    0.2
}
fn default_eta() -> f64 {
    0.1
}
fn default_tournament_size() -> usize {
    3
}

impl GeneticAlgorithmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("crossover_rate", self.crossover_rate),
            ("mutation_probability", self.mutation_probability),
            ("mutation_rate", self.mutation_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidProbability { name, value });
            }
        }
        if !(self.eta.is_finite() && self.eta >= 0.0) {
            return Err(ConfigError::InvalidEta(self.eta));
        }
        if self.tournament_size == 0 {
            return Err(ConfigError::InvalidTournamentSize);
        }
        Ok(())
    }
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Individuals per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Recorded generations per run, the initial population included.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Independent runs executed by the orchestrator.
    #[serde(default = "default_runs")]
    pub runs: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            generations: default_generations(),
            runs: default_runs(),
        }
    }
}

fn default_population_size() -> usize {
    500
}
fn default_generations() -> usize {
    1000
}
fn default_runs() -> usize {
    5
}

impl PopulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.generations == 0 {
            return Err(ConfigError::NoGenerations);
        }
        Ok(())
    }
}

/// Fixed simulation time grid: `steps` points spaced `dt` apart from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeGridConfig {
    /// Spacing between grid points.
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Number of grid points, the initial time included.
    #[serde(default = "default_steps")]
    pub steps: usize,
    /// RK4 substeps between consecutive grid points.
    #[serde(default = "default_substeps")]
    pub substeps: usize,
}

impl Default for TimeGridConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            steps: default_steps(),
            substeps: default_substeps(),
        }
    }
}

fn default_dt() -> f64 {
    0.1
}
fn default_steps() -> usize {
    601
}
fn default_substeps() -> usize {
    4
}

impl TimeGridConfig {
    /// Materialize the grid times.
    pub fn times(&self) -> Vec<f64> {
        (0..self.steps).map(|i| i as f64 * self.dt).collect()
    }

    /// Last time point of the grid.
    pub fn horizon(&self) -> f64 {
        self.steps.saturating_sub(1) as f64 * self.dt
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::InvalidTimeStep(self.dt));
        }
        if self.steps < 2 {
            return Err(ConfigError::InvalidGridLength(self.steps));
        }
        if self.substeps == 0 {
            return Err(ConfigError::InvalidSubsteps);
        }
        Ok(())
    }
}

/// Sentinel losses substituted for infeasible parameter sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyConfig {
    /// Returned when no non-negative steady state exists.
    #[serde(default = "default_steady_state_penalty")]
    pub steady_state: f64,
    /// Returned when a simulated trajectory turns negative or non-finite.
    #[serde(default = "default_integration_penalty")]
    pub integration_failure: f64,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            steady_state: default_steady_state_penalty(),
            integration_failure: default_integration_penalty(),
        }
    }
}

fn default_steady_state_penalty() -> f64 {
    (195.0f64 * 100.0).powi(2)
}
fn default_integration_penalty() -> f64 {
    (45.0f64 * 100.0).powi(2)
}

impl PenaltyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for value in [self.steady_state, self.integration_failure] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidPenalty(value));
            }
        }
        if self.steady_state == self.integration_failure {
            return Err(ConfigError::IndistinctPenalties(self.steady_state));
        }
        Ok(())
    }

    /// Largest score a genuine loss may take: just below the smaller penalty.
    pub fn loss_ceiling(&self) -> f64 {
        self.steady_state.min(self.integration_failure).next_down()
    }
}

/// Locations and model inputs for one fitting job, read by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemConfig {
    /// Directory of per-dose CSV files for the phosphorylation channel.
    pub phospho_dir: PathBuf,
    /// Directory of per-dose CSV files for the nuclear channel.
    pub nuclear_dir: PathBuf,
    /// Base filename naming the output directory and artifacts.
    pub save_filename: String,
    /// Directory under which the output directory is created.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Initial guess for the steady-state solve.
    pub initial_state: Vec<f64>,
    /// Total protein concentrations passed to the model.
    pub total_protein: Vec<f64>,
    /// Lower exponent bound per parameter.
    pub minimums: Vec<f64>,
    /// Upper exponent bound per parameter.
    pub maximums: Vec<f64>,
}

fn default_output_root() -> PathBuf {
    PathBuf::from(".")
}

/// A fitting job: search settings plus the problem definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub fit: FitConfig,
    pub problem: ProblemConfig,
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("Mutation distribution index must be finite and non-negative, got {0}")]
    InvalidEta(f64),
    #[error("Tournament size must be non-zero")]
    InvalidTournamentSize,
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("Generation count must be non-zero")]
    NoGenerations,
    #[error("Time step must be positive, got {0}")]
    InvalidTimeStep(f64),
    #[error("Time grid needs at least two points, got {0}")]
    InvalidGridLength(usize),
    #[error("Integrator substeps must be non-zero")]
    InvalidSubsteps,
    #[error("Penalty must be finite and positive, got {0}")]
    InvalidPenalty(f64),
    #[error("Steady-state and integration penalties must differ, both are {0}")]
    IndistinctPenalties(f64),
    #[error("Run time budget must be finite and positive, got {0}")]
    InvalidTimeBudget(f64),
    #[error("Conversion bounds have {minimums} minimums but {maximums} maximums")]
    BoundsLengthMismatch { minimums: usize, maximums: usize },
    #[error("Parameter {index}: range [{min}, {max}] is invalid")]
    InvalidRange { index: usize, min: f64, max: f64 },
    #[error("Parameter {index}: exponent base {base} must be finite and positive")]
    InvalidBase { index: usize, base: f64 },
    #[error("Model expects {model} parameters but the conversion spec has {conversion}")]
    ParameterCountMismatch { model: usize, conversion: usize },
    #[error("Model has {model} state variables but the initial state has {initial}")]
    StateLengthMismatch { model: usize, initial: usize },
    #[error("Model expects {model} total protein values but {provided} were given")]
    TotalProteinLengthMismatch { model: usize, provided: usize },
    #[error("Genome has {actual} genes but the conversion spec has {expected} parameters")]
    GenomeLengthMismatch { expected: usize, actual: usize },
    #[error("Conversion spec must describe at least one parameter")]
    NoParameters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        FitConfig::default().validate().unwrap();
    }

    #[test]
    fn test_default_penalty_magnitudes() {
        let penalties = PenaltyConfig::default();
        assert_eq!(penalties.steady_state, 380_250_000.0);
        assert_eq!(penalties.integration_failure, 20_250_000.0);
    }

    #[test]
    fn test_loss_ceiling_below_both_penalties() {
        let penalties = PenaltyConfig::default();
        let ceiling = penalties.loss_ceiling();
        assert!(ceiling < penalties.integration_failure);
        assert!(ceiling < penalties.steady_state);
        assert!(ceiling > 20_249_999.0);
    }

    #[test]
    fn test_equal_penalties_rejected() {
        let penalties = PenaltyConfig {
            steady_state: 10.0,
            integration_failure: 10.0,
        };
        assert!(matches!(
            penalties.validate(),
            Err(ConfigError::IndistinctPenalties(_))
        ));
    }

    #[test]
    fn test_rates_out_of_range_rejected() {
        let config = GeneticAlgorithmConfig {
            crossover_rate: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbability {
                name: "crossover_rate",
                ..
            })
        ));

        let config = GeneticAlgorithmConfig {
            tournament_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTournamentSize)
        ));
    }

    #[test]
    fn test_time_grid() {
        let grid = TimeGridConfig::default();
        let times = grid.times();
        assert_eq!(times.len(), 601);
        assert_eq!(times[0], 0.0);
        assert!((grid.horizon() - 60.0).abs() < 1e-9);
        assert!((times[600] - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FitConfig =
            serde_json::from_str(r#"{"population": {"size": 20}, "random_seed": 7}"#).unwrap();
        assert_eq!(config.population.size, 20);
        assert_eq!(config.population.generations, 1000);
        assert_eq!(config.algorithm.tournament_size, 3);
        assert_eq!(config.random_seed, Some(7));
    }

    #[test]
    fn test_time_budget_validation() {
        let config = FitConfig {
            max_run_seconds: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeBudget(_))
        ));
    }
}
