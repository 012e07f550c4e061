//! Simulation-based loss for candidate parameter sets.
//!
//! A genome is decoded, the model is relaxed to its unstimulated steady
//! state, and every dose is simulated and compared against the measured
//! traces. Infeasible parameter sets score fixed sentinel penalties so that
//! selection pushes the search away from them.

use std::sync::Arc;

use crate::compute::{
    Integrator, ModelInputs, NewtonSolver, PathwayModel, Rk4Integrator, SteadyStateSolver, decode,
    decode_genes,
};
use crate::schema::{
    Channel, ConfigError, ConversionSpec, ExperimentalDataset, FitConfig, Genome, PenaltyConfig,
};

/// Immutable inputs shared by every evaluation of a fit.
pub struct FitContext<M> {
    model: M,
    conversion: ConversionSpec,
    dataset: ExperimentalDataset,
    initial_state: Vec<f64>,
    total_protein: Vec<f64>,
    times: Vec<f64>,
    /// Grid index nearest each experimental time, per channel.
    sample_indices: [Vec<usize>; 2],
    penalties: PenaltyConfig,
}

impl<M: PathwayModel> FitContext<M> {
    /// Bundle and validate the fit inputs.
    ///
    /// Fails when the model, conversion spec, initial state and total protein
    /// disagree on their dimensions, or when the grid or penalties are invalid.
    pub fn new(
        model: M,
        conversion: ConversionSpec,
        dataset: ExperimentalDataset,
        initial_state: Vec<f64>,
        total_protein: Vec<f64>,
        config: &FitConfig,
    ) -> Result<Self, ConfigError> {
        conversion.validate()?;
        config.grid.validate()?;
        config.penalties.validate()?;

        if model.param_count() != conversion.len() {
            return Err(ConfigError::ParameterCountMismatch {
                model: model.param_count(),
                conversion: conversion.len(),
            });
        }
        if model.state_len() != initial_state.len() {
            return Err(ConfigError::StateLengthMismatch {
                model: model.state_len(),
                initial: initial_state.len(),
            });
        }
        if model.total_protein_len() != total_protein.len() {
            return Err(ConfigError::TotalProteinLengthMismatch {
                model: model.total_protein_len(),
                provided: total_protein.len(),
            });
        }

        // Loss of an all-zero simulation; genuine losses of this size get capped.
        let ceiling = config.penalties.loss_ceiling();
        let data_scale: f64 = Channel::ALL
            .into_iter()
            .flat_map(|channel| dataset.channel(channel).traces.iter().flatten())
            .map(|value| value * value)
            .sum();
        if data_scale >= ceiling {
            log::warn!(
                "Measured data scale {data_scale:.3e} reaches the penalty ceiling {ceiling:.3e}; \
                 raise the penalties so infeasible sets stay ranked below genuine fits"
            );
        }

        let times = config.grid.times();
        let sample_indices = Channel::ALL.map(|channel| {
            dataset
                .channel(channel)
                .times
                .iter()
                .map(|&t| nearest_index(&times, t))
                .collect()
        });

        Ok(Self {
            model,
            conversion,
            dataset,
            initial_state,
            total_protein,
            times,
            sample_indices,
            penalties: config.penalties.clone(),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn conversion(&self) -> &ConversionSpec {
        &self.conversion
    }

    pub fn dataset(&self) -> &ExperimentalDataset {
        &self.dataset
    }

    pub fn penalties(&self) -> &PenaltyConfig {
        &self.penalties
    }

    /// Simulation grid times.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of genes a genome must carry.
    pub fn genome_len(&self) -> usize {
        self.conversion.len()
    }

    fn sample_indices(&self, channel: Channel) -> &[usize] {
        match channel {
            Channel::Phospho => &self.sample_indices[0],
            Channel::Nuclear => &self.sample_indices[1],
        }
    }
}

/// Index of the grid point closest to `t`; ties resolve to the lower index.
pub fn nearest_index(grid: &[f64], t: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, &g) in grid.iter().enumerate() {
        let distance = (g - t).abs();
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// Detailed outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// Sum of squared errors over all doses and channels.
    Loss(f64),
    /// No finite, non-negative steady state was found.
    SteadyStateInfeasible,
    /// A trajectory went negative or non-finite.
    IntegrationFailure {
        /// Index of the offending dose.
        dose_index: usize,
    },
}

impl Evaluation {
    /// Collapse to a scalar loss, substituting the sentinel penalties.
    ///
    /// Genuine losses are capped just below the smaller penalty so that no
    /// feasible parameter set ever ranks behind an infeasible one.
    pub fn score(self, penalties: &PenaltyConfig) -> f64 {
        match self {
            Evaluation::Loss(loss) => loss.min(penalties.loss_ceiling()),
            Evaluation::SteadyStateInfeasible => penalties.steady_state,
            Evaluation::IntegrationFailure { .. } => penalties.integration_failure,
        }
    }
}

/// Turns genomes into scalar losses. Lower is better.
pub struct FitnessEvaluator<M, S = NewtonSolver, I = Rk4Integrator> {
    context: Arc<FitContext<M>>,
    solver: S,
    integrator: I,
}

impl<M, S: Clone, I: Clone> Clone for FitnessEvaluator<M, S, I> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            solver: self.solver.clone(),
            integrator: self.integrator.clone(),
        }
    }
}

impl<M: PathwayModel> FitnessEvaluator<M> {
    /// Evaluator with the default Newton solver and an RK4 integrator using
    /// the configured substeps.
    pub fn new(context: FitContext<M>, config: &FitConfig) -> Self {
        Self {
            context: Arc::new(context),
            solver: NewtonSolver::default(),
            integrator: Rk4Integrator::new(config.grid.substeps),
        }
    }
}

impl<M, S, I> FitnessEvaluator<M, S, I>
where
    M: PathwayModel,
    S: SteadyStateSolver,
    I: Integrator,
{
    /// Evaluator with explicit numerical primitives.
    pub fn with_primitives(context: Arc<FitContext<M>>, solver: S, integrator: I) -> Self {
        Self {
            context,
            solver,
            integrator,
        }
    }

    pub fn context(&self) -> &FitContext<M> {
        &self.context
    }

    /// Decode a genome into physical parameters.
    pub fn decode(&self, genome: &Genome) -> Result<Vec<f64>, ConfigError> {
        decode(genome, &self.context.conversion)
    }

    /// Scalar loss of a genome.
    ///
    /// Fails only when the genome length differs from the conversion spec.
    pub fn evaluate(&self, genome: &Genome) -> Result<f64, ConfigError> {
        Ok(self.evaluate_detailed(genome)?.score(&self.context.penalties))
    }

    /// Loss of a genome with the failure mode kept apart.
    pub fn evaluate_detailed(&self, genome: &Genome) -> Result<Evaluation, ConfigError> {
        let params = self.decode(genome)?;
        Ok(self.simulate(&params))
    }

    /// Decode a genome sampled for this context, so of matching length.
    pub(super) fn decode_sampled(&self, genome: &Genome) -> Vec<f64> {
        decode_genes(genome.genes(), &self.context.conversion)
    }

    /// Score a genome sampled for this context.
    pub(super) fn score_sampled(&self, genome: &Genome) -> f64 {
        self.simulate(&self.decode_sampled(genome))
            .score(&self.context.penalties)
    }

    fn simulate(&self, params: &[f64]) -> Evaluation {
        let ctx = &*self.context;
        let total_protein = ctx.total_protein.as_slice();

        let steady = self.solver.solve(
            |state, out| {
                ctx.model.derivatives(
                    state,
                    ModelInputs {
                        time: 0.0,
                        total_protein,
                        signal: 0.0,
                        params,
                    },
                    out,
                )
            },
            &ctx.initial_state,
        );
        if !steady.is_feasible() {
            return Evaluation::SteadyStateInfeasible;
        }

        let mut total = 0.0;
        for (dose_index, &dose) in ctx.dataset.doses().iter().enumerate() {
            let trajectory = self.integrator.integrate(
                |time, state, out| {
                    ctx.model.derivatives(
                        state,
                        ModelInputs {
                            time,
                            total_protein,
                            signal: dose,
                            params,
                        },
                        out,
                    )
                },
                &steady.state,
                &ctx.times,
            );
            if trajectory.first_invalid().is_some() {
                return Evaluation::IntegrationFailure { dose_index };
            }

            let mut dose_loss = 0.0;
            for channel in Channel::ALL {
                let measured = &ctx.dataset.channel(channel).traces[dose_index];
                dose_loss += ctx
                    .sample_indices(channel)
                    .iter()
                    .zip(measured)
                    .map(|(&idx, &value)| {
                        let simulated =
                            ctx.model.observe(channel, trajectory.point(idx), total_protein);
                        (value - simulated).powi(2)
                    })
                    .sum::<f64>();
            }
            // Observable projection produced NaN/inf; treat like a failed simulation.
            if !dose_loss.is_finite() {
                return Evaluation::IntegrationFailure { dose_index };
            }
            total += dose_loss;
        }

        Evaluation::Loss(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::RelayModel;
    use crate::schema::{ChannelSeries, ParameterConversion};

    /// Single-state model `dx/dt = a - b x - signal`.
    ///
    /// Steady state `a / b`; a dose above `a` drives x below zero.
    struct DrainModel;

    impl PathwayModel for DrainModel {
        fn state_len(&self) -> usize {
            1
        }
        fn param_count(&self) -> usize {
            2
        }
        fn total_protein_len(&self) -> usize {
            0
        }
        fn derivatives(&self, state: &[f64], inputs: ModelInputs<'_>, out: &mut [f64]) {
            out[0] = inputs.params[0] - inputs.params[1] * state[0] - inputs.signal;
        }
        fn observe(&self, _channel: Channel, state: &[f64], _total: &[f64]) -> f64 {
            state[0]
        }
    }

    fn linear_spec(ranges: &[(f64, f64)]) -> ConversionSpec {
        ConversionSpec::new(
            ranges
                .iter()
                .map(|&(lo, hi)| ParameterConversion::linear(lo, hi))
                .collect(),
        )
        .unwrap()
    }

    fn dataset(doses: &[f64], times: &[f64], value: f64) -> ExperimentalDataset {
        let series = || {
            ChannelSeries::new(
                times.to_vec(),
                doses.iter().map(|&d| (d, vec![value; times.len()])).collect(),
            )
        };
        ExperimentalDataset::new(series(), series()).unwrap()
    }

    fn small_config() -> FitConfig {
        let mut config = FitConfig::default();
        config.grid.steps = 51;
        config
    }

    /// Drain dynamics whose observation is undefined near the resting level.
    struct GatedDrain;

    impl PathwayModel for GatedDrain {
        fn state_len(&self) -> usize {
            1
        }
        fn param_count(&self) -> usize {
            2
        }
        fn total_protein_len(&self) -> usize {
            0
        }
        fn derivatives(&self, state: &[f64], inputs: ModelInputs<'_>, out: &mut [f64]) {
            DrainModel.derivatives(state, inputs, out);
        }
        fn observe(&self, _channel: Channel, state: &[f64], _total: &[f64]) -> f64 {
            if state[0] > 0.95 { f64::NAN } else { state[0] }
        }
    }

    fn drain_evaluator(doses: &[f64], value: f64) -> FitnessEvaluator<DrainModel> {
        evaluator_for(DrainModel, doses, value)
    }

    fn evaluator_for<M: PathwayModel>(model: M, doses: &[f64], value: f64) -> FitnessEvaluator<M> {
        let config = small_config();
        let context = FitContext::new(
            model,
            linear_spec(&[(-2.0, 2.0), (0.5, 1.5)]),
            dataset(doses, &[0.0, 1.0, 2.5], value),
            vec![0.5],
            vec![],
            &config,
        )
        .unwrap();
        FitnessEvaluator::new(context, &config)
    }

    #[test]
    fn test_nearest_index() {
        let grid = [0.0, 0.1, 0.2, 0.3];
        assert_eq!(nearest_index(&grid, 0.0), 0);
        assert_eq!(nearest_index(&grid, 0.14), 1);
        assert_eq!(nearest_index(&grid, 0.16), 2);
        assert_eq!(nearest_index(&grid, 9.0), 3);
        assert_eq!(nearest_index(&[0.0, 1.0], 0.5), 0);
    }

    #[test]
    fn test_exact_fit_scores_zero() {
        // a = 1, b = 1: steady state 1, zero dose keeps it there.
        let evaluator = drain_evaluator(&[0.0], 1.0);
        let genome = Genome::new(vec![0.75, 0.5]).unwrap();
        assert_eq!(evaluator.decode(&genome).unwrap(), vec![1.0, 1.0]);
        let loss = evaluator.evaluate(&genome).unwrap();
        assert!(loss.abs() < 1e-12, "loss = {loss}");
    }

    #[test]
    fn test_loss_accumulates_squared_error() {
        // Steady state 1, measured 0.5 at 3 times on 2 channels for 2 doses of 0.
        let evaluator = drain_evaluator(&[0.0, 0.0], 0.5);
        let genome = Genome::new(vec![0.75, 0.5]).unwrap();
        let loss = evaluator.evaluate(&genome).unwrap();
        assert!((loss - 2.0 * 2.0 * 3.0 * 0.25).abs() < 1e-9, "loss = {loss}");
    }

    #[test]
    fn test_negative_steady_state_returns_sentinel_a() {
        // a = -1 gives a steady state of -1 regardless of the data.
        let evaluator = drain_evaluator(&[0.0, 0.1], 0.0);
        let genome = Genome::new(vec![0.25, 0.5]).unwrap();
        assert_eq!(
            evaluator.evaluate_detailed(&genome).unwrap(),
            Evaluation::SteadyStateInfeasible
        );
        assert_eq!(
            evaluator.evaluate(&genome).unwrap(),
            evaluator.context().penalties().steady_state
        );
    }

    #[test]
    fn test_negative_trajectory_returns_sentinel_b_after_clean_dose() {
        // Steady state 1; dose 0.5 settles at 0.5, dose 3 drives x below zero.
        let evaluator = drain_evaluator(&[0.5, 3.0], 0.0);
        let genome = Genome::new(vec![0.75, 0.5]).unwrap();
        assert_eq!(
            evaluator.evaluate_detailed(&genome).unwrap(),
            Evaluation::IntegrationFailure { dose_index: 1 }
        );
        let penalties = evaluator.context().penalties();
        assert_eq!(evaluator.evaluate(&genome).unwrap(), penalties.integration_failure);
        assert_ne!(penalties.integration_failure, penalties.steady_state);
    }

    #[test]
    fn test_deterministic() {
        let evaluator = drain_evaluator(&[0.0, 0.5], 0.3);
        let genome = Genome::new(vec![0.6, 0.3]).unwrap();
        assert_eq!(evaluator.evaluate(&genome).unwrap(), evaluator.evaluate(&genome).unwrap());
    }

    #[test]
    fn test_parameter_count_mismatch_rejected() {
        let config = small_config();
        let result = FitContext::new(
            RelayModel,
            linear_spec(&[(0.0, 1.0)]),
            dataset(&[0.0], &[0.0], 0.0),
            vec![0.0, 0.0],
            vec![1.0],
            &config,
        );
        assert!(matches!(
            result,
            Err(ConfigError::ParameterCountMismatch {
                model: 4,
                conversion: 1
            })
        ));
    }

    #[test]
    fn test_state_length_mismatch_rejected() {
        let config = small_config();
        let result = FitContext::new(
            RelayModel,
            ConversionSpec::log_uniform(&[-1.0; 4], &[1.0; 4]).unwrap(),
            dataset(&[0.0], &[0.0], 0.0),
            vec![0.0],
            vec![1.0],
            &config,
        );
        assert!(matches!(
            result,
            Err(ConfigError::StateLengthMismatch {
                model: 2,
                initial: 1
            })
        ));
    }

    #[test]
    fn test_total_protein_length_mismatch_rejected() {
        let config = small_config();
        let result = FitContext::new(
            RelayModel,
            ConversionSpec::log_uniform(&[-1.0; 4], &[1.0; 4]).unwrap(),
            dataset(&[0.0], &[0.0], 0.0),
            vec![0.0, 0.0],
            vec![],
            &config,
        );
        assert!(matches!(
            result,
            Err(ConfigError::TotalProteinLengthMismatch {
                model: 1,
                provided: 0
            })
        ));
    }

    #[test]
    fn test_genome_length_mismatch_is_an_error() {
        let evaluator = drain_evaluator(&[0.0], 1.0);
        let short = Genome::new(vec![0.5]).unwrap();
        assert!(matches!(
            evaluator.evaluate(&short),
            Err(ConfigError::GenomeLengthMismatch {
                expected: 2,
                actual: 1
            })
        ));
        let long = Genome::new(vec![0.5; 3]).unwrap();
        assert!(evaluator.evaluate_detailed(&long).is_err());
        assert!(evaluator.decode(&long).is_err());
    }

    #[test]
    fn test_large_genuine_loss_stays_below_penalties() {
        // Steady state 1 against fluorescence-scale data of 3000.
        let evaluator = drain_evaluator(&[0.0], 3000.0);
        let genome = Genome::new(vec![0.75, 0.5]).unwrap();
        let Evaluation::Loss(raw) = evaluator.evaluate_detailed(&genome).unwrap() else {
            panic!("expected a genuine loss");
        };
        let penalties = evaluator.context().penalties();
        assert!(raw > penalties.integration_failure);

        let score = evaluator.evaluate(&genome).unwrap();
        assert!(score < penalties.integration_failure);
        assert!(score < penalties.steady_state);
    }

    #[test]
    fn test_non_finite_observation_reports_offending_dose() {
        // Dose 0 rests at 1, where the observation is undefined; dose 0.5 is
        // never reached.
        let evaluator = evaluator_for(GatedDrain, &[0.0, 0.5], 0.0);
        let genome = Genome::new(vec![0.75, 0.5]).unwrap();
        assert_eq!(
            evaluator.evaluate_detailed(&genome).unwrap(),
            Evaluation::IntegrationFailure { dose_index: 0 }
        );
    }
}
