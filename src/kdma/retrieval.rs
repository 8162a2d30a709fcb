//! Nearest-neighbour retrieval
//!
//! ## Top-K
//!
//! Cases without a value for the KDMA, or whose action class is incompatible
//! with the query, are skipped. The running list keeps every case within
//! `TIE_BAND` of the K-th best distance, so near-ties survive. When more than K
//! remain, cases clearly inside the band (`GUARANTEE_BAND`) are kept and the
//! rest of the slots are filled by `construct_distanced_list`, which favours
//! cases far from those already chosen.

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::defaults::{DIVERSITY_KDMA_WEIGHT, GUARANTEE_BAND, INITIAL_MAX_DISTANCE, TIE_BAND};
use crate::config::Weights;

use super::case::Case;
use super::distance::distance;

#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub distance: f64,
    pub case: &'a Case,
}

/// Whether `candidate` may stand in for `query`: every action class the query
/// carries must be carried by the candidate, and tags must match.
pub fn compatible(query: &Case, candidate: &Case) -> bool {
    let q = &query.features;
    let c = &candidate.features;
    !(q.treating && !c.treating
        || q.tagging && (!c.tagging || c.category != q.category)
        || q.leaving && !c.leaving
        || q.assessing && !c.assessing
        || q.questioning && !c.questioning)
}

fn sort_by_distance(list: &mut [Neighbor<'_>]) {
    list.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

/// The `k` nearest usable cases to `query` for `kdma`.
pub fn top_k<'a>(
    query: &Case,
    weights: &Weights,
    kdma: &str,
    cases: impl IntoIterator<Item = &'a Case>,
    k: usize,
    rng: &mut StdRng,
) -> Vec<Neighbor<'a>> {
    if k == 0 {
        return Vec::new();
    }
    let mut list: Vec<Neighbor<'a>> = Vec::new();
    let mut max_distance = INITIAL_MAX_DISTANCE;
    for case in cases {
        if case.kdma_value(kdma).is_none() || !compatible(query, case) {
            continue;
        }
        let d = distance(case, query, weights);
        if d > max_distance {
            continue;
        }
        list.push(Neighbor { distance: d, case });
        if list.len() < k {
            continue;
        }
        sort_by_distance(&mut list);
        max_distance = list[k - 1].distance * TIE_BAND;
        list.retain(|n| n.distance <= max_distance);
    }

    if list.len() > k {
        let guarantee = max_distance * GUARANTEE_BAND;
        let (guaranteed, pool): (Vec<&Neighbor<'a>>, Vec<&Neighbor<'a>>) =
            list.iter().partition(|n| n.distance < guarantee);
        let mut diversity = weights.clone();
        diversity.insert(kdma.to_string(), DIVERSITY_KDMA_WEIGHT);
        let chosen = construct_distanced_list(
            guaranteed.into_iter().map(|n| n.case).collect(),
            pool.into_iter().map(|n| n.case).collect(),
            &diversity,
            k,
            rng,
        );
        list = chosen
            .into_iter()
            .map(|case| Neighbor { distance: distance(case, query, weights), case })
            .collect();
    }
    list
}

/// Grow `chosen` to `max_count` from `pool`, each time picking uniformly among
/// the pool items whose distance to the nearest chosen item is within 1% of the
/// largest such distance. Picked items leave the pool.
pub fn construct_distanced_list<'a>(
    mut chosen: Vec<&'a Case>,
    mut pool: Vec<&'a Case>,
    weights: &Weights,
    max_count: usize,
    rng: &mut StdRng,
) -> Vec<&'a Case> {
    while chosen.len() < max_count && !pool.is_empty() {
        let mut farthest: Vec<usize> = Vec::new();
        if !chosen.is_empty() {
            let (mut low, mut high) = (0.0, 0.0);
            for (i, item) in pool.iter().enumerate() {
                let nearest = chosen
                    .iter()
                    .map(|c| distance(item, c, weights))
                    .fold(f64::INFINITY, f64::min);
                if nearest > high {
                    farthest = vec![i];
                    low = nearest * GUARANTEE_BAND;
                    high = nearest * TIE_BAND;
                } else if nearest > low {
                    farthest.push(i);
                }
            }
        }
        let pick = if farthest.is_empty() {
            rng.gen_range(0..pool.len())
        } else {
            farthest[rng.gen_range(0..farthest.len())]
        };
        chosen.push(pool.remove(pick));
    }
    chosen
}
