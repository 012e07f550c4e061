//! Steady-state root finding.
//!
//! Solves `f(x) = 0` for the unstimulated model, starting from a caller
//! supplied guess.

/// Outcome of a steady-state solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SteadyState {
    /// Final iterate.
    pub state: Vec<f64>,
    /// Whether the residual met the tolerance.
    pub converged: bool,
    /// Newton iterations taken.
    pub iterations: usize,
}

impl SteadyState {
    /// True when the solve converged to a finite, non-negative state.
    pub fn is_feasible(&self) -> bool {
        self.converged && self.state.iter().all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Root finder contract used by the fitness evaluator.
///
/// `system(x, out)` writes `f(x)` into `out`; both slices have the length
/// of `initial`.
pub trait SteadyStateSolver: Send + Sync {
    fn solve<F>(&self, system: F, initial: &[f64]) -> SteadyState
    where
        F: FnMut(&[f64], &mut [f64]);
}

/// Damped Newton iteration with a forward-difference Jacobian.
#[derive(Debug, Clone)]
pub struct NewtonSolver {
    /// Converged when the max-norm of the residual drops below this.
    pub residual_tolerance: f64,
    /// Also converged when a full step is this small relative to the state
    /// and the residual is within `sqrt(residual_tolerance)`.
    pub step_tolerance: f64,
    /// Iteration cap.
    pub max_iterations: usize,
    /// Relative perturbation for the finite-difference Jacobian.
    pub jacobian_step: f64,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            residual_tolerance: 1e-10,
            step_tolerance: 1.5e-8,
            max_iterations: 200,
            jacobian_step: 1.5e-8,
        }
    }
}

impl SteadyStateSolver for NewtonSolver {
    fn solve<F>(&self, mut system: F, initial: &[f64]) -> SteadyState
    where
        F: FnMut(&[f64], &mut [f64]),
    {
        let n = initial.len();
        let mut x = initial.to_vec();
        let mut fx = vec![0.0; n];
        let mut trial = vec![0.0; n];
        let mut f_trial = vec![0.0; n];
        let mut jacobian = vec![0.0; n * n];
        let mut step = vec![0.0; n];

        system(&x, &mut fx);
        let mut residual = max_norm(&fx);

        for iteration in 0..self.max_iterations {
            if !residual.is_finite() {
                return SteadyState {
                    state: x,
                    converged: false,
                    iterations: iteration,
                };
            }
            if residual <= self.residual_tolerance {
                return SteadyState {
                    state: x,
                    converged: true,
                    iterations: iteration,
                };
            }

            self.jacobian(&mut system, &x, &fx, &mut jacobian, &mut trial, &mut f_trial);
            for (s, f) in step.iter_mut().zip(&fx) {
                *s = -f;
            }
            if !solve_linear(&mut jacobian, &mut step, n) {
                return SteadyState {
                    state: x,
                    converged: false,
                    iterations: iteration,
                };
            }

            // Backtrack until the residual decreases.
            let mut lambda = 1.0;
            let mut accepted = false;
            while lambda >= 1e-4 {
                for i in 0..n {
                    trial[i] = x[i] + lambda * step[i];
                }
                system(&trial, &mut f_trial);
                let trial_residual = max_norm(&f_trial);
                if trial_residual.is_finite() && trial_residual < residual {
                    accepted = true;
                    break;
                }
                lambda *= 0.5;
            }

            if !accepted {
                let converged = residual <= self.residual_tolerance.sqrt()
                    && max_norm(&step) <= self.step_tolerance * (1.0 + max_norm(&x));
                return SteadyState {
                    state: x,
                    converged,
                    iterations: iteration + 1,
                };
            }

            std::mem::swap(&mut x, &mut trial);
            std::mem::swap(&mut fx, &mut f_trial);
            residual = max_norm(&fx);

            let step_size = lambda * max_norm(&step);
            if step_size <= self.step_tolerance * (1.0 + max_norm(&x))
                && residual <= self.residual_tolerance.sqrt()
            {
                return SteadyState {
                    state: x,
                    converged: true,
                    iterations: iteration + 1,
                };
            }
        }

        SteadyState {
            converged: residual <= self.residual_tolerance,
            state: x,
            iterations: self.max_iterations,
        }
    }
}

impl NewtonSolver {
    /// Forward-difference Jacobian, row-major `jacobian[row * n + col]`.
    fn jacobian<F>(
        &self,
        system: &mut F,
        x: &[f64],
        fx: &[f64],
        jacobian: &mut [f64],
        perturbed: &mut [f64],
        f_perturbed: &mut [f64],
    ) where
        F: FnMut(&[f64], &mut [f64]),
    {
        let n = x.len();
        perturbed.copy_from_slice(x);
        for col in 0..n {
            let h = self.jacobian_step * x[col].abs().max(1.0);
            perturbed[col] = x[col] + h;
            system(perturbed, f_perturbed);
            for row in 0..n {
                jacobian[row * n + col] = (f_perturbed[row] - fx[row]) / h;
            }
            perturbed[col] = x[col];
        }
    }
}

/// Max-norm that propagates NaN.
fn max_norm(v: &[f64]) -> f64 {
    let mut norm = 0.0f64;
    for x in v {
        if x.is_nan() {
            return f64::NAN;
        }
        norm = norm.max(x.abs());
    }
    norm
}

/// Gaussian elimination with partial pivoting. Solves `a * x = b` in place,
/// leaving the solution in `b`. Returns false for a singular matrix.
fn solve_linear(a: &mut [f64], b: &mut [f64], n: usize) -> bool {
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i * n + col].abs().total_cmp(&a[j * n + col].abs()))
            .unwrap_or(col);
        let pivot = a[pivot_row * n + col];
        if !pivot.is_finite() || pivot.abs() < 1e-300 {
            return false;
        }

        if pivot_row != col {
            for k in 0..n {
                a.swap(col * n + k, pivot_row * n + k);
            }
            b.swap(col, pivot_row);
        }

        for row in (col + 1)..n {
            let factor = a[row * n + col] / a[col * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row * n + k] -= factor * a[col * n + k];
            }
            b[row] -= factor * b[col];
        }
    }

    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[row * n + k] * b[k];
        }
        b[row] = sum / a[row * n + row];
    }

    b.iter().all(|v| v.is_finite())
}
