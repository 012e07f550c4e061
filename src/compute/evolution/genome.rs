//! Genome manipulation utilities for evolutionary search.
//!
//! Provides random generation, two-point crossover, and polynomial-bounded
//! mutation on the unit interval.

use rand::prelude::*;
use rand_distr::Uniform;

use crate::schema::Genome;

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Genome of `len` genes drawn i.i.d. uniform on [0, 1].
    pub fn random_genome(&mut self, len: usize) -> Genome {
        let unit = Uniform::new_inclusive(0.0, 1.0);
        Genome::from_raw((&mut self.rng).sample_iter(unit).take(len).collect())
    }

    /// True with probability `p`.
    #[inline]
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.r#gen::<f64>() < p
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    #[inline]
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Two-point crossover: swap the gene slice between two cut points.
    ///
    /// Cut points are drawn so the swapped slice is never empty. Genomes
    /// shorter than two genes are returned unchanged.
    pub fn two_point_crossover(&mut self, first: Genome, second: Genome) -> (Genome, Genome) {
        let size = first.len().min(second.len());
        if size < 2 {
            return (first, second);
        }

        let mut cx1 = self.rng.gen_range(1..=size);
        let mut cx2 = self.rng.gen_range(1..size);
        if cx2 >= cx1 {
            cx2 += 1;
        } else {
            std::mem::swap(&mut cx1, &mut cx2);
        }

        let mut a = first.into_genes();
        let mut b = second.into_genes();
        a[cx1..cx2].swap_with_slice(&mut b[cx1..cx2]);
        (Genome::from_raw(a), Genome::from_raw(b))
    }

    /// Polynomial-bounded mutation on [0, 1].
    ///
    /// Each gene mutates with probability `indpb`. `eta` is the distribution
    /// index: small values spread offspring over the whole interval, large
    /// values keep them close to the parent.
    pub fn polynomial_mutate(&mut self, genome: Genome, eta: f64, indpb: f64) -> Genome {
        let mut genes = genome.into_genes();
        let mut_pow = 1.0 / (eta + 1.0);

        for x in &mut genes {
            if !self.chance(indpb) {
                continue;
            }
            let r = self.rng.r#gen::<f64>();
            let delta_q = if r < 0.5 {
                let xy = 1.0 - *x;
                let val = 2.0 * r + (1.0 - 2.0 * r) * xy.powf(eta + 1.0);
                val.powf(mut_pow) - 1.0
            } else {
                let xy = *x;
                let val = 2.0 * (1.0 - r) + 2.0 * (r - 0.5) * xy.powf(eta + 1.0);
                1.0 - val.powf(mut_pow)
            };
            *x = (*x + delta_q).clamp(0.0, 1.0);
        }

        Genome::from_raw(genes)
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_random_genome() {
        let mut rng = GenomeRng::new(42);
        let genome = rng.random_genome(16);
        assert_eq!(genome.len(), 16);
        assert!(genome.is_within_bounds());
    }

    #[test]
    fn test_same_seed_same_genomes() {
        let a = GenomeRng::new(7).random_genome(8);
        let b = GenomeRng::new(7).random_genome(8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_crossover_swaps_contiguous_slice() {
        let mut rng = GenomeRng::new(42);
        for _ in 0..100 {
            let a = Genome::from_raw(vec![0.0; 6]);
            let b = Genome::from_raw(vec![1.0; 6]);
            let (c, d) = rng.two_point_crossover(a, b);

            let swapped: Vec<usize> = (0..6).filter(|&i| c.genes()[i] == 1.0).collect();
            assert!(!swapped.is_empty());
            assert!(swapped.windows(2).all(|w| w[1] == w[0] + 1));
            // Offspring are complementary.
            for i in 0..6 {
                assert_eq!(c.genes()[i] + d.genes()[i], 1.0);
            }
        }
    }

    #[test]
    fn test_crossover_single_gene_is_noop() {
        let mut rng = GenomeRng::new(1);
        let (a, b) =
            rng.two_point_crossover(Genome::from_raw(vec![0.2]), Genome::from_raw(vec![0.8]));
        assert_eq!(a.genes(), &[0.2]);
        assert_eq!(b.genes(), &[0.8]);
    }

    #[test]
    fn test_mutation_zero_rate_is_identity() {
        let mut rng = GenomeRng::new(3);
        let genome = rng.random_genome(10);
        let mutated = rng.polynomial_mutate(genome.clone(), 0.1, 0.0);
        assert_eq!(mutated, genome);
    }

    #[test]
    fn test_mutation_changes_genes() {
        let mut rng = GenomeRng::new(5);
        let genome = Genome::from_raw(vec![0.5; 32]);
        let mutated = rng.polynomial_mutate(genome.clone(), 0.1, 1.0);
        assert_ne!(mutated, genome);
    }

    proptest! {
        #[test]
        fn prop_mutation_stays_in_bounds(
            seed in any::<u64>(),
            genes in prop::collection::vec(0.0f64..=1.0, 1..20),
            eta in 0.0f64..50.0,
        ) {
            let mut rng = GenomeRng::new(seed);
            let mutated = rng.polynomial_mutate(Genome::from_raw(genes), eta, 1.0);
            prop_assert!(mutated.is_within_bounds());
        }

        #[test]
        fn prop_crossover_preserves_gene_multiset(
            seed in any::<u64>(),
            a in prop::collection::vec(0.0f64..=1.0, 2..12),
        ) {
            let b: Vec<f64> = a.iter().map(|x| 1.0 - x).collect();
            let mut rng = GenomeRng::new(seed);
            let (c, d) = rng.two_point_crossover(
                Genome::from_raw(a.clone()),
                Genome::from_raw(b.clone()),
            );
            for i in 0..a.len() {
                let pair = (c.genes()[i], d.genes()[i]);
                prop_assert!(pair == (a[i], b[i]) || pair == (b[i], a[i]));
            }
        }
    }
}
