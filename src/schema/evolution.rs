//! Evolution state and result types.
//!
//! Genomes, individuals, per-generation records and run summaries shared by
//! the search engine, the orchestrator and the result sinks.

use serde::{Deserialize, Serialize};

/// Normalized search-space representation of a parameter set.
///
/// Every gene lies in [0, 1]. The constructor enforces the bound; the
/// variation operators in `compute::evolution` preserve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Genome {
    genes: Vec<f64>,
}

impl Genome {
    /// Build a genome, rejecting genes outside [0, 1].
    pub fn new(genes: Vec<f64>) -> Result<Self, GenomeError> {
        if genes.is_empty() {
            return Err(GenomeError::Empty);
        }
        if let Some((index, &value)) = genes
            .iter()
            .enumerate()
            .find(|(_, g)| !(0.0..=1.0).contains(*g))
        {
            return Err(GenomeError::OutOfBounds { index, value });
        }
        Ok(Self { genes })
    }

    /// Build without the bound check. Used by operators that bound their
    /// output themselves and by callers probing the codec's extrapolation.
    pub fn from_raw(genes: Vec<f64>) -> Self {
        Self { genes }
    }

    #[inline]
    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn into_genes(self) -> Vec<f64> {
        self.genes
    }

    /// True when every gene lies in [0, 1].
    pub fn is_within_bounds(&self) -> bool {
        self.genes.iter().all(|g| (0.0..=1.0).contains(g))
    }

    /// Clamp every gene into [0, 1]. NaN genes become 0.
    /// Returns the number of genes that changed.
    pub fn repair(&mut self) -> usize {
        let mut repaired = 0;
        for gene in &mut self.genes {
            if !(0.0..=1.0).contains(gene) {
                *gene = if gene.is_nan() { 0.0 } else { gene.clamp(0.0, 1.0) };
                repaired += 1;
            }
        }
        repaired
    }
}

impl TryFrom<Vec<f64>> for Genome {
    type Error = GenomeError;

    fn try_from(genes: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(genes)
    }
}

impl From<Genome> for Vec<f64> {
    fn from(genome: Genome) -> Self {
        genome.genes
    }
}

/// Genome construction errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenomeError {
    #[error("Genome must contain at least one gene")]
    Empty,
    #[error("Gene {index} is {value}, outside [0, 1]")]
    OutOfBounds { index: usize, value: f64 },
}

/// A genome with its lazily computed loss.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    genome: Genome,
    fitness: Option<f64>,
}

impl Individual {
    pub fn new(genome: Genome) -> Self {
        Self {
            genome,
            fitness: None,
        }
    }

    #[inline]
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Cached loss, `None` until evaluated or after the genome changed.
    #[inline]
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    /// Swap in a new genome and drop the cached loss.
    pub fn replace_genome(&mut self, genome: Genome) {
        self.genome = genome;
        self.fitness = None;
    }

    /// Take the genome out for variation, leaving the individual unevaluated.
    pub fn take_genome(&mut self) -> Genome {
        self.fitness = None;
        std::mem::replace(&mut self.genome, Genome::from_raw(Vec::new()))
    }

    pub fn invalidate(&mut self) {
        self.fitness = None;
    }

    /// Loss used for ranking: unevaluated individuals rank last.
    #[inline]
    pub fn rank_key(&self) -> f64 {
        self.fitness.unwrap_or(f64::INFINITY)
    }
}

/// Best individual of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Lowest loss in the generation.
    pub best_score: f64,
    /// Physical parameters of that individual.
    pub best_decoded_individual: Vec<f64>,
}

/// Per-generation trace of one independent run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// Zero-based run index within the orchestrator.
    pub run: usize,
    /// One record per generation, the initial population first.
    pub generations: Vec<GenerationRecord>,
    /// Why the run ended. `None` while still running.
    pub stop_reason: Option<StopReason>,
}

impl RunResult {
    pub fn new(run: usize) -> Self {
        Self {
            run,
            generations: Vec::new(),
            stop_reason: None,
        }
    }

    /// Best score per generation.
    pub fn best_scores(&self) -> Vec<f64> {
        self.generations.iter().map(|g| g.best_score).collect()
    }

    /// Decoded best individual per generation.
    pub fn best_individuals(&self) -> Vec<Vec<f64>> {
        self.generations
            .iter()
            .map(|g| g.best_decoded_individual.clone())
            .collect()
    }

    /// Record of the last generation.
    pub fn last(&self) -> Option<&GenerationRecord> {
        self.generations.last()
    }
}

/// Phase of the generation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvolutionPhase {
    /// Population not yet sampled.
    #[default]
    Init,
    /// Individuals without a loss await evaluation.
    Evaluate,
    /// Population fully evaluated; generation best to be recorded.
    Record,
    /// Tournament selection of the next population.
    Select,
    /// Crossover and mutation of the selected population.
    Vary,
    /// Hall-of-fame reinsertion.
    Elitism,
    /// Run finished.
    Terminal,
}

/// Snapshot reported after every recorded generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Run index within the orchestrator.
    pub run: usize,
    /// Generation just recorded (0 = initial population).
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Best loss seen in this run.
    pub best_fitness: f64,
    /// Best loss of this generation.
    pub generation_best: f64,
    /// Median loss of this generation.
    pub median_fitness: f64,
    /// Individuals evaluated during this generation.
    pub evaluations: usize,
    /// Current phase.
    pub phase: EvolutionPhase,
}

/// Final statistics of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations recorded.
    pub generations: usize,
    /// Fitness evaluations performed.
    pub total_evaluations: u64,
    /// Best loss achieved.
    pub best_fitness: f64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Reached the configured generation count.
    MaxGenerations,
    /// Cancel handle was set.
    Cancelled,
    /// Wall-clock budget exhausted.
    TimeBudget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genome_bounds_enforced() {
        assert!(Genome::new(vec![0.0, 0.5, 1.0]).is_ok());
        assert_eq!(Genome::new(vec![]), Err(GenomeError::Empty));
        assert_eq!(
            Genome::new(vec![0.2, 1.5]),
            Err(GenomeError::OutOfBounds {
                index: 1,
                value: 1.5
            })
        );
        assert!(matches!(
            Genome::new(vec![f64::NAN]),
            Err(GenomeError::OutOfBounds { index: 0, .. })
        ));
    }

    #[test]
    fn test_genome_repair() {
        let mut genome = Genome::from_raw(vec![-0.5, 0.3, 2.0, f64::NAN]);
        assert!(!genome.is_within_bounds());
        assert_eq!(genome.repair(), 3);
        assert_eq!(genome.genes(), &[0.0, 0.3, 1.0, 0.0]);
        assert!(genome.is_within_bounds());
    }

    #[test]
    fn test_genome_deserialize_validates() {
        let ok: Genome = serde_json::from_str("[0.1, 0.9]").unwrap();
        assert_eq!(ok.genes(), &[0.1, 0.9]);
        assert!(serde_json::from_str::<Genome>("[0.1, 1.9]").is_err());
    }

    #[test]
    fn test_replacing_genome_invalidates_fitness() {
        let mut individual = Individual::new(Genome::new(vec![0.5]).unwrap());
        assert_eq!(individual.fitness(), None);
        assert_eq!(individual.rank_key(), f64::INFINITY);

        individual.set_fitness(3.0);
        assert_eq!(individual.fitness(), Some(3.0));

        individual.replace_genome(Genome::new(vec![0.25]).unwrap());
        assert_eq!(individual.fitness(), None);
        assert_eq!(individual.genome().genes(), &[0.25]);
    }

    #[test]
    fn test_run_result_sequences() {
        let mut result = RunResult::new(0);
        result.generations.push(GenerationRecord {
            best_score: 4.0,
            best_decoded_individual: vec![1.0, 2.0],
        });
        result.generations.push(GenerationRecord {
            best_score: 2.0,
            best_decoded_individual: vec![3.0, 4.0],
        });
        assert_eq!(result.best_scores(), vec![4.0, 2.0]);
        assert_eq!(result.best_individuals()[1], vec![3.0, 4.0]);
        assert_eq!(result.last().map(|r| r.best_score), Some(2.0));
    }
}
