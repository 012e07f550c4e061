//! Model interface for pathway ODE systems.
//!
//! The fitting machinery treats the model as a black box: a right-hand side
//! and a projection from state vectors onto measured observables.

use crate::schema::Channel;

/// Inputs other than the state vector passed to the right-hand side.
#[derive(Debug, Clone, Copy)]
pub struct ModelInputs<'a> {
    /// Current time.
    pub time: f64,
    /// Total protein concentrations (conserved quantities).
    pub total_protein: &'a [f64],
    /// External stimulus. Zero when solving for the unstimulated steady state.
    pub signal: f64,
    /// Decoded physical parameters.
    pub params: &'a [f64],
}

/// An ODE model of a signaling pathway.
pub trait PathwayModel: Send + Sync {
    /// Number of state variables.
    fn state_len(&self) -> usize;

    /// Number of kinetic parameters the model expects.
    fn param_count(&self) -> usize;

    /// Number of total protein concentrations the model reads.
    fn total_protein_len(&self) -> usize;

    /// Write `d(state)/dt` into `out`.
    fn derivatives(&self, state: &[f64], inputs: ModelInputs<'_>, out: &mut [f64]);

    /// Project a state onto the measured value of `channel`.
    fn observe(&self, channel: Channel, state: &[f64], total_protein: &[f64]) -> f64;
}

/// Two-stage kinase relay used by the demo binary, tests and benches.
///
/// State: `[P, N]`, the phosphorylated kinase and its nuclear pool.
/// Parameters: `[k_act, k_deact, k_import, k_export]`.
///
/// ```text
/// dP/dt = k_act * signal * (K_tot - P) - k_deact * P
/// dN/dt = k_import * P - k_export * N
/// ```
///
/// Observables: `P / K_tot` for phospho, `N / K_tot` for nuclear, with
/// `K_tot = total_protein[0]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayModel;

impl RelayModel {
    pub const PARAMS: usize = 4;
}

impl PathwayModel for RelayModel {
    fn state_len(&self) -> usize {
        2
    }

    fn param_count(&self) -> usize {
        Self::PARAMS
    }

    fn total_protein_len(&self) -> usize {
        1
    }

    fn derivatives(&self, state: &[f64], inputs: ModelInputs<'_>, out: &mut [f64]) {
        let [k_act, k_deact, k_import, k_export] = [
            inputs.params[0],
            inputs.params[1],
            inputs.params[2],
            inputs.params[3],
        ];
        let total = inputs.total_protein[0];
        let (p, n) = (state[0], state[1]);

        out[0] = k_act * inputs.signal * (total - p) - k_deact * p;
        out[1] = k_import * p - k_export * n;
    }

    fn observe(&self, channel: Channel, state: &[f64], total_protein: &[f64]) -> f64 {
        let total = total_protein[0];
        match channel {
            Channel::Phospho => state[0] / total,
            Channel::Nuclear => state[1] / total,
        }
    }
}
