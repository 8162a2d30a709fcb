//! Distance-weighted KDMA prediction

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::info;

use crate::config::defaults::MIN_NEIGHBOR_DISTANCE;
use crate::config::{WeightSettings, Weights};

use super::case::Case;
use super::retrieval::top_k;

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub value: f64,
    /// Indices of the neighbours used, nearest first. Unindexed cases are omitted.
    pub neighbors: Vec<usize>,
}

/// Estimate `kdma` for `query` from its nearest neighbours.
///
/// Each neighbour is weighted by `total / max(d, 0.01)`, where `total` sums the
/// floored distances. Returns `None` when no usable neighbour exists.
pub fn estimate_kdma<'a>(
    query: &Case,
    weights: &Weights,
    kdma: &str,
    cases: impl IntoIterator<Item = &'a Case>,
    k: usize,
    rng: &mut StdRng,
    print_neighbors: bool,
) -> Option<Estimate> {
    let neighbors = top_k(query, weights, kdma, cases, k, rng);
    if neighbors.is_empty() {
        return None;
    }

    let floored: Vec<f64> = neighbors.iter().map(|n| n.distance.max(MIN_NEIGHBOR_DISTANCE)).collect();
    let total: f64 = floored.iter().sum();
    let (mut weighted, mut divisor) = (0.0, 0.0);
    for (neighbor, d) in neighbors.iter().zip(&floored) {
        let value = neighbor.case.kdma_value(kdma)?;
        let similarity = total / d;
        weighted += value * similarity;
        divisor += similarity;
    }
    let value = weighted / divisor;

    if print_neighbors {
        for (i, n) in neighbors.iter().enumerate() {
            info!(
                kdma,
                neighbor = i,
                index = ?n.case.index,
                distance = n.distance,
                value = ?n.case.kdma_value(kdma),
                action = %n.case.features.action_name,
                "Neighbor"
            );
        }
        info!(kdma, estimate = value, "KDMA estimate");
    }

    Some(Estimate {
        value,
        neighbors: neighbors.iter().filter_map(|n| n.case.index).collect(),
    })
}

/// Mean absolute error of estimating each case's `kdma` from all the others.
///
/// Each held-out case is weighted by composing `settings` for its own case
/// types. Cases run in parallel, each with its own generator derived from
/// `seed` and its position. Returns infinity when nothing could be estimated.
pub fn leave_one_out_error(settings: &WeightSettings, kdma: &str, cases: &[Case], k: usize, seed: u64) -> f64 {
    let errors: Vec<f64> = cases
        .par_iter()
        .enumerate()
        .filter_map(|(i, case)| {
            let actual = case.kdma_value(kdma)?;
            let weights = settings.compose(&case.case_types(), kdma);
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let others = cases.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, c)| c);
            estimate_kdma(case, &weights, kdma, others, k, &mut rng, false)
                .map(|e| (actual - e.value).abs())
        })
        .collect();
    if errors.is_empty() {
        return f64::INFINITY;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = errors.len() as f64;
    errors.iter().sum::<f64>() / n
}
