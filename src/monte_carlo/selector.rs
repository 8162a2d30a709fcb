//! Node selection policies

use rand::rngs::StdRng;
use rand::Rng;

/// What a selector sees of each sibling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Position among siblings, the deterministic tie-break.
    pub ordinal: usize,
    pub visits: u64,
    /// Relative sampling weight (outcome probability; 1 for decisions).
    pub weight: f64,
}

pub trait NodeSelector {
    /// Index into `candidates` of the chosen node. `candidates` is never empty.
    fn select(&self, rng: &mut StdRng, candidates: &[Candidate]) -> usize;
}

/// Visit every unvisited node once, lowest ordinal first, then sample by weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnselectedThenRandom;

impl NodeSelector for UnselectedThenRandom {
    fn select(&self, rng: &mut StdRng, candidates: &[Candidate]) -> usize {
        if let Some((i, _)) = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.visits == 0)
            .min_by_key(|(_, c)| c.ordinal)
        {
            return i;
        }

        let total: f64 = candidates.iter().map(|c| c.weight.max(0.0)).sum();
        if total <= 0.0 {
            return rng.gen_range(0..candidates.len());
        }
        let mut threshold = rng.gen::<f64>() * total;
        for (i, c) in candidates.iter().enumerate() {
            threshold -= c.weight.max(0.0);
            if threshold < 0.0 {
                return i;
            }
        }
        candidates.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn candidate(ordinal: usize, visits: u64, weight: f64) -> Candidate {
        Candidate { ordinal, visits, weight }
    }

    #[test]
    fn test_unvisited_first_by_ordinal() {
        let mut rng = StdRng::seed_from_u64(1);
        let candidates = [candidate(0, 3, 1.0), candidate(2, 0, 1.0), candidate(1, 0, 1.0)];
        assert_eq!(UnselectedThenRandom.select(&mut rng, &candidates), 2);
    }

    #[test]
    fn test_zero_weight_never_sampled() {
        let mut rng = StdRng::seed_from_u64(7);
        let candidates = [candidate(0, 1, 0.0), candidate(1, 1, 1.0)];
        for _ in 0..100 {
            assert_eq!(UnselectedThenRandom.select(&mut rng, &candidates), 1);
        }
    }
}
