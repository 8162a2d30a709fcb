//! Decision selection
//!
//! ## Selectors
//! - `KdmaEstimationSelector`: predicts each target KDMA for every candidate
//!   from similar past cases and picks the candidate closest to the target
//! - `SeveritySelector`: picks the largest simulated severity reduction
//! - `RandomSelector`: uniform choice
//!
//! Every selector breaks exact ties uniformly with the session generator.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};

use crate::analyzer::metrics::SEVERITY_CHANGE;
use crate::config::{EstimatorConfig, EstimatorVariant, WeightSettings};
use crate::kdma::{estimate_kdma, Case};
use crate::types::{ActionKind, AlignmentTarget, Probe};

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("probe {0} offers no decisions")]
    NoDecisions(String),
    #[error("selector {0} needs an alignment target")]
    NoTarget(&'static str),
}

/// The chosen decision and the cases built along the way.
#[derive(Debug, Clone)]
pub struct Selection {
    pub decision_index: usize,
    /// Squared distance to the target (0 for selectors that do not estimate).
    pub distance: f64,
    /// Case of the chosen decision.
    pub case: Case,
    /// Cases of every candidate, in decision order.
    pub candidates: Vec<Case>,
}

pub trait DecisionSelector {
    fn name(&self) -> &'static str;

    fn select(
        &mut self,
        probe: &Probe,
        target: Option<&AlignmentTarget>,
        cases: &[Case],
        rng: &mut StdRng,
    ) -> Result<Selection, SelectError>;
}

/// Index of a uniformly chosen minimum of `scores`, ignoring `None`.
fn argmin_random(scores: &[Option<f64>], rng: &mut StdRng) -> Option<usize> {
    let best = scores.iter().flatten().copied().fold(f64::INFINITY, f64::min);
    let tied: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, s)| **s == Some(best))
        .map(|(i, _)| i)
        .collect();
    if tied.is_empty() {
        None
    } else {
        Some(tied[rng.gen_range(0..tied.len())])
    }
}

fn candidate_cases(probe: &Probe) -> Vec<Case> {
    probe.decisions.iter().map(|d| Case::from_decision(probe, d)).collect()
}

fn selection(decision_index: usize, distance: f64, candidates: Vec<Case>) -> Selection {
    Selection { decision_index, distance, case: candidates[decision_index].clone(), candidates }
}

// ============================================================================
// KDMA estimation
// ============================================================================

pub struct KdmaEstimationSelector {
    weights: WeightSettings,
    config: EstimatorConfig,
}

impl KdmaEstimationSelector {
    pub const fn new(weights: WeightSettings, config: EstimatorConfig) -> Self {
        Self { weights, config }
    }

    /// Squared distance of one candidate case to the target, recording its estimates.
    fn score_case(
        &self,
        case: &mut Case,
        target: &AlignmentTarget,
        cases: &[Case],
        rng: &mut StdRng,
    ) -> f64 {
        let types = case.case_types();
        let mut squared = 0.0;
        for (kdma, wanted) in target.points() {
            let kdma = kdma.to_lowercase();
            let weights = self.weights.compose(&types, &kdma);
            let estimate = estimate_kdma(
                case,
                &weights,
                &kdma,
                cases,
                self.config.neighbor_count,
                rng,
                self.config.print_neighbors,
            );
            let Some(estimate) = estimate else {
                debug!(kdma = %kdma, action = %case.features.action_name, "No neighbours, applying penalty");
                squared += self.config.missing_estimate_penalty;
                continue;
            };
            for (n, index) in estimate.neighbors.iter().enumerate() {
                case.neighbors.insert(format!("{kdma}_neighbor{}", n + 1), *index);
            }
            case.estimates.insert(kdma, estimate.value);
            let diff = match self.config.variant {
                EstimatorVariant::Aligned => wanted - estimate.value,
                EstimatorVariant::Misaligned => (1.0 - wanted) - estimate.value,
                EstimatorVariant::Baseline => 0.0,
            };
            squared += diff * diff;
        }
        squared
    }
}

impl DecisionSelector for KdmaEstimationSelector {
    fn name(&self) -> &'static str {
        "kdma_estimation"
    }

    fn select(
        &mut self,
        probe: &Probe,
        target: Option<&AlignmentTarget>,
        cases: &[Case],
        rng: &mut StdRng,
    ) -> Result<Selection, SelectError> {
        if probe.decisions.is_empty() {
            return Err(SelectError::NoDecisions(probe.id.clone()));
        }
        let mut candidates = candidate_cases(probe);

        if probe.decisions.iter().all(|d| d.action.kind() == ActionKind::EndScenario) {
            info!(probe = %probe.id, "Only END_SCENARIO remains");
            candidates[0].distance = Some(0.0);
            return Ok(selection(0, 0.0, candidates));
        }
        let target = target.ok_or(SelectError::NoTarget(self.name()))?;

        let mut scores = Vec::with_capacity(candidates.len());
        for case in &mut candidates {
            let squared = self.score_case(case, target, cases, rng);
            case.distance = Some(squared);
            debug!(action = %case.features.action_name, decision = %case.decision_id, distance = squared, "Candidate scored");
            scores.push(Some(squared));
        }
        let chosen = argmin_random(&scores, rng).unwrap_or(0);
        let distance = scores[chosen].unwrap_or(f64::INFINITY);
        info!(
            probe = %probe.id,
            action = %probe.decisions[chosen].action,
            distance,
            variant = %self.config.variant,
            "Decision selected"
        );
        Ok(selection(chosen, distance, candidates))
    }
}

// ============================================================================
// Simple selectors
// ============================================================================

/// Largest reduction in simulated severity; uniform when nothing was simulated.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeveritySelector;

impl DecisionSelector for SeveritySelector {
    fn name(&self) -> &'static str {
        "severity"
    }

    fn select(
        &mut self,
        probe: &Probe,
        _target: Option<&AlignmentTarget>,
        _cases: &[Case],
        rng: &mut StdRng,
    ) -> Result<Selection, SelectError> {
        if probe.decisions.is_empty() {
            return Err(SelectError::NoDecisions(probe.id.clone()));
        }
        let changes: Vec<Option<f64>> = probe
            .decisions
            .iter()
            .map(|d| d.scalar_metric(SEVERITY_CHANGE).filter(|v| v.is_finite()))
            .collect();
        let chosen = argmin_random(&changes, rng).unwrap_or_else(|| {
            debug!(probe = %probe.id, "No severity metrics, choosing at random");
            rng.gen_range(0..probe.decisions.len())
        });
        info!(probe = %probe.id, action = %probe.decisions[chosen].action, "Decision selected");
        Ok(selection(chosen, 0.0, candidate_cases(probe)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl DecisionSelector for RandomSelector {
    fn name(&self) -> &'static str {
        "random"
    }

    fn select(
        &mut self,
        probe: &Probe,
        _target: Option<&AlignmentTarget>,
        _cases: &[Case],
        rng: &mut StdRng,
    ) -> Result<Selection, SelectError> {
        if probe.decisions.is_empty() {
            return Err(SelectError::NoDecisions(probe.id.clone()));
        }
        let chosen = rng.gen_range(0..probe.decisions.len());
        Ok(selection(chosen, 0.0, candidate_cases(probe)))
    }
}

/// Build a selector from its command-line name.
pub fn by_name(
    name: &str,
    weights: WeightSettings,
    config: EstimatorConfig,
) -> Option<Box<dyn DecisionSelector>> {
    match name {
        "kdma_estimation" | "kdma" => Some(Box::new(KdmaEstimationSelector::new(weights, config))),
        "severity" => Some(Box::new(SeveritySelector)),
        "random" => Some(Box::new(RandomSelector)),
        _ => None,
    }
}
