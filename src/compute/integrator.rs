//! Time integration of model trajectories onto a fixed output grid.

/// States sampled at each output time, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    state_len: usize,
    data: Vec<f64>,
}

impl Trajectory {
    fn with_capacity(state_len: usize, points: usize) -> Self {
        Self {
            state_len,
            data: Vec::with_capacity(state_len * points),
        }
    }

    /// Number of output points.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len().checked_div(self.state_len).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn state_len(&self) -> usize {
        self.state_len
    }

    /// State at output point `index`.
    #[inline]
    pub fn point(&self, index: usize) -> &[f64] {
        &self.data[index * self.state_len..(index + 1) * self.state_len]
    }

    /// Iterate over the output points in time order.
    pub fn points(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.state_len.max(1))
    }

    /// Index of the first point with a negative or non-finite component.
    pub fn first_invalid(&self) -> Option<usize> {
        self.points()
            .position(|p| p.iter().any(|v| !v.is_finite() || *v < 0.0))
    }

    fn push(&mut self, state: &[f64]) {
        self.data.extend_from_slice(state);
    }
}

/// Integrator contract used by the fitness evaluator.
///
/// `rhs(t, y, dydt)` writes the derivative. The returned trajectory has one
/// point per entry of `times`, the first equal to `initial`.
pub trait Integrator: Send + Sync {
    fn integrate<F>(&self, rhs: F, initial: &[f64], times: &[f64]) -> Trajectory
    where
        F: FnMut(f64, &[f64], &mut [f64]);
}

/// Classical fourth-order Runge-Kutta with a fixed number of substeps
/// between output points.
#[derive(Debug, Clone)]
pub struct Rk4Integrator {
    /// Substeps per output interval.
    pub substeps: usize,
}

impl Default for Rk4Integrator {
    fn default() -> Self {
        Self { substeps: 4 }
    }
}

impl Rk4Integrator {
    pub fn new(substeps: usize) -> Self {
        Self {
            substeps: substeps.max(1),
        }
    }
}

impl Integrator for Rk4Integrator {
    fn integrate<F>(&self, mut rhs: F, initial: &[f64], times: &[f64]) -> Trajectory
    where
        F: FnMut(f64, &[f64], &mut [f64]),
    {
        let n = initial.len();
        let mut trajectory = Trajectory::with_capacity(n, times.len());
        let Some(&first) = times.first() else {
            return trajectory;
        };

        let mut y = initial.to_vec();
        let mut scratch = Rk4Scratch::new(n);
        trajectory.push(&y);

        let substeps = self.substeps.max(1);
        let mut t = first;
        for &next in &times[1..] {
            let h = (next - t) / substeps as f64;
            for k in 0..substeps {
                rk4_step(&mut rhs, t + k as f64 * h, h, &mut y, &mut scratch);
            }
            t = next;

            if y.iter().any(|v| !v.is_finite()) {
                // Blown up: pad the remainder so callers see a full-length trajectory.
                trajectory.push(&y);
                let nan = vec![f64::NAN; n];
                while trajectory.len() < times.len() {
                    trajectory.push(&nan);
                }
                return trajectory;
            }
            trajectory.push(&y);
        }

        trajectory
    }
}

/// Stage buffers reused across steps.
struct Rk4Scratch {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl Rk4Scratch {
    fn new(n: usize) -> Self {
        Self {
            k1: vec![0.0; n],
            k2: vec![0.0; n],
            k3: vec![0.0; n],
            k4: vec![0.0; n],
            tmp: vec![0.0; n],
        }
    }
}

fn rk4_step<F>(rhs: &mut F, t: f64, h: f64, y: &mut [f64], s: &mut Rk4Scratch)
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let half = 0.5 * h;

    rhs(t, y, &mut s.k1);

    for i in 0..y.len() {
        s.tmp[i] = y[i] + half * s.k1[i];
    }
    rhs(t + half, &s.tmp, &mut s.k2);

    for i in 0..y.len() {
        s.tmp[i] = y[i] + half * s.k2[i];
    }
    rhs(t + half, &s.tmp, &mut s.k3);

    for i in 0..y.len() {
        s.tmp[i] = y[i] + h * s.k3[i];
    }
    rhs(t + h, &s.tmp, &mut s.k4);

    for i in 0..y.len() {
        y[i] += h / 6.0 * (s.k1[i] + 2.0 * s.k2[i] + 2.0 * s.k3[i] + s.k4[i]);
    }
}
