//! Hall of fame: the best individuals ever seen during a run.

use crate::schema::Individual;

/// Bounded archive of the lowest-loss evaluated individuals, best first.
#[derive(Debug, Clone)]
pub struct HallOfFame {
    members: Vec<Individual>,
    capacity: usize,
}

impl HallOfFame {
    /// Create an empty hall of fame holding at most `capacity` individuals.
    pub fn new(capacity: usize) -> Self {
        Self {
            members: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Offer every evaluated individual of a population.
    ///
    /// An individual enters only when strictly better than the current worst
    /// member (or while there is room), so earlier members win ties.
    pub fn update(&mut self, population: &[Individual]) {
        if self.capacity == 0 {
            return;
        }
        for individual in population {
            let Some(loss) = individual.fitness() else {
                continue;
            };
            if self.members.len() == self.capacity
                && self
                    .members
                    .last()
                    .is_some_and(|worst| loss >= worst.rank_key())
            {
                continue;
            }

            let position = self.members.partition_point(|m| m.rank_key() <= loss);
            self.members.insert(position, individual.clone());
            self.members.truncate(self.capacity);
        }
    }

    /// Best individual ever seen.
    pub fn best(&self) -> Option<&Individual> {
        self.members.first()
    }

    /// Members ordered from best to worst.
    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Genome;

    fn individual(gene: f64, loss: Option<f64>) -> Individual {
        let mut individual = Individual::new(Genome::from_raw(vec![gene]));
        if let Some(loss) = loss {
            individual.set_fitness(loss);
        }
        individual
    }

    #[test]
    fn test_keeps_best_ever() {
        let mut hof = HallOfFame::new(1);
        hof.update(&[individual(0.1, Some(5.0)), individual(0.2, Some(3.0))]);
        assert_eq!(hof.best().and_then(Individual::fitness), Some(3.0));

        // A worse generation does not displace the member.
        hof.update(&[individual(0.3, Some(4.0))]);
        assert_eq!(hof.best().map(|i| i.genome().genes()[0]), Some(0.2));

        hof.update(&[individual(0.4, Some(1.0))]);
        assert_eq!(hof.best().and_then(Individual::fitness), Some(1.0));
        assert_eq!(hof.len(), 1);
    }

    #[test]
    fn test_ties_keep_incumbent() {
        let mut hof = HallOfFame::new(1);
        hof.update(&[individual(0.1, Some(2.0)), individual(0.9, Some(2.0))]);
        assert_eq!(hof.best().map(|i| i.genome().genes()[0]), Some(0.1));
    }

    #[test]
    fn test_unevaluated_ignored() {
        let mut hof = HallOfFame::new(2);
        hof.update(&[individual(0.1, None)]);
        assert!(hof.is_empty());
    }

    #[test]
    fn test_sorted_members() {
        let mut hof = HallOfFame::new(3);
        hof.update(&[
            individual(0.1, Some(4.0)),
            individual(0.2, Some(1.0)),
            individual(0.3, Some(3.0)),
            individual(0.4, Some(2.0)),
        ]);
        let losses: Vec<_> = hof.members().iter().filter_map(Individual::fitness).collect();
        assert_eq!(losses, vec![1.0, 2.0, 3.0]);
    }
}
