//! Decision analysis
//!
//! Scores each candidate decision of a probe by forward simulation and attaches
//! the resulting metric bundle to it.
//!
//! ## Flow
//!
//! 1. Build a one-root Monte Carlo tree on the probe state, seeded with the
//!    probe's candidate actions as the root's decisions.
//! 2. Run the configured number of rollouts to the configured depth.
//! 3. Read each root decision's aggregated scores and derive change metrics
//!    relative to the probe state.
//! 4. Rank every scalar metric across the candidates (`justifier`).
//!
//! A candidate whose simulation fails gets the worst value for each scalar
//! metric (`+inf` when minimized, `0` when maximized); the rest proceed.

pub mod justifier;
pub mod metrics;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::SimulationConfig;
use crate::medsim::{triss, MedicalSimulator};
use crate::monte_carlo::{
    DecisionId, MonteCarloTree, RolloutOutcome, Score, ScoreMap, TreeError, UnselectedThenRandom,
};
use crate::types::{
    Action, ActionKind, Decision, MetricValue, OutcomeSummary, Probe, TriageState,
};

pub use justifier::DecisionJustifier;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("monte carlo tree: {0}")]
    Tree(#[from] TreeError),
}

/// Enriches the decisions of a probe with metrics.
pub trait DecisionAnalyzer {
    fn name(&self) -> &'static str;

    fn analyze(&mut self, probe: &mut Probe, rng: &mut StdRng) -> Result<(), AnalyzerError>;
}

// ============================================================================
// Monte Carlo analyzer
// ============================================================================

#[derive(Debug, Clone)]
pub struct MonteCarloAnalyzer {
    config: SimulationConfig,
}

impl MonteCarloAnalyzer {
    pub const fn new(config: SimulationConfig) -> Self {
        Self { config }
    }
}

/// The probe-state values change metrics are measured against.
struct Baseline {
    severity: f64,
    supplies: f64,
    time: f64,
    casualty_severity: BTreeMap<String, f64>,
}

impl Baseline {
    fn of(state: &TriageState) -> Self {
        Self {
            severity: state.total_severity(),
            supplies: f64::from(state.total_supplies()),
            time: state.time,
            casualty_severity: state.casualties.iter().map(|c| (c.id.clone(), c.severity())).collect(),
        }
    }
}

fn scalar(scores: &ScoreMap, name: &str) -> Option<f64> {
    match scores.get(name)? {
        Score::Scalar(v) => Some(*v),
        Score::Keyed(_) => None,
    }
}

fn keyed<'a>(scores: &'a ScoreMap, name: &str) -> Option<&'a BTreeMap<String, f64>> {
    match scores.get(name)? {
        Score::Keyed(map) => Some(map),
        Score::Scalar(_) => None,
    }
}

fn to_metric(score: &Score) -> MetricValue {
    match score {
        Score::Scalar(v) => MetricValue::Scalar(*v),
        Score::Keyed(map) => MetricValue::PerCasualty(map.clone()),
    }
}

fn failure_metrics() -> BTreeMap<String, MetricValue> {
    metrics::SCALAR_METRICS
        .iter()
        .map(|m| ((*m).to_string(), MetricValue::Scalar(metrics::failure_value(m))))
        .collect()
}

/// Aggregated scores plus change metrics for one simulated decision.
fn simulated_metrics(
    tree: &MonteCarloTree<MedicalSimulator>,
    id: DecisionId,
    action: &Action,
    baseline: &Baseline,
) -> BTreeMap<String, MetricValue> {
    let node = tree.decision(id);
    let scores = &node.scores;
    let mut out: BTreeMap<String, MetricValue> =
        scores.iter().map(|(name, score)| (name.clone(), to_metric(score))).collect();

    let time = scalar(scores, metrics::AVERAGE_TIME_USED).unwrap_or(baseline.time);
    let per_second = (time - baseline.time).max(1.0);

    if let Some(severity) = scalar(scores, metrics::SEVERITY) {
        out.insert(
            metrics::SEVERITY_CHANGE.into(),
            MetricValue::Scalar((severity - baseline.severity) / per_second),
        );
    }
    if let Some(supplies) = scalar(scores, metrics::SUPPLIES_REMAINING) {
        out.insert(metrics::SUPPLIES_USED.into(), MetricValue::Scalar(baseline.supplies - supplies));
    }

    if let Some(severities) = keyed(scores, metrics::CASUALTY_SEVERITY) {
        let changes: BTreeMap<String, f64> = severities
            .iter()
            .map(|(id, s)| {
                let before = baseline.casualty_severity.get(id).copied().unwrap_or(0.0);
                (id.clone(), (s - before) / per_second)
            })
            .collect();

        if let Some(target) = action.casualty() {
            if let (Some(s), Some(c)) = (severities.get(target), changes.get(target)) {
                out.insert(metrics::TARGET_SEVERITY.into(), MetricValue::Scalar(*s));
                out.insert(metrics::TARGET_SEVERITY_CHANGE.into(), MetricValue::Scalar(*c));
            }
        }
        let severest = severities
            .iter()
            .fold(None::<(&String, f64)>, |best, (id, s)| match best {
                Some((_, b)) if b >= *s => best,
                _ => Some((id, *s)),
            });
        if let Some((id, s)) = severest {
            out.insert(metrics::SEVEREST_SEVERITY.into(), MetricValue::Scalar(s));
            if let Some(c) = changes.get(id) {
                out.insert(metrics::SEVEREST_SEVERITY_CHANGE.into(), MetricValue::Scalar(*c));
            }
        }
        out.insert(metrics::CASUALTY_SEVERITY_CHANGE.into(), MetricValue::PerCasualty(changes));
    }

    let outcomes: Vec<OutcomeSummary> = node
        .children
        .iter()
        .map(|child| {
            let outcome = tree.state(*child);
            OutcomeSummary {
                probability: outcome.probability,
                severity: outcome.state.total_severity(),
                p_death: outcome.state.p_death(),
            }
        })
        .collect();
    out.insert(metrics::NONDETERMINISM.into(), MetricValue::Outcomes(outcomes));

    let likeliest = node
        .children
        .iter()
        .map(|child| tree.state(*child))
        .fold(None::<&crate::monte_carlo::StateNode<TriageState>>, |best, s| match best {
            Some(b) if b.probability >= s.probability => Some(b),
            _ => Some(s),
        });
    if let Some(outcome) = likeliest {
        let survival = outcome
            .state
            .casualties
            .iter()
            .map(|c| (c.id.clone(), triss::survival_probability(c)))
            .collect();
        out.insert(metrics::CASUALTY_TRISS.into(), MetricValue::PerCasualty(survival));
    }
    out
}

/// Scaled rank of severity change per second: 1 for the best candidate, 0 for the worst.
fn attach_medical_soundness(decisions: &mut [Decision]) {
    let ranked: Vec<f64> = decisions
        .iter()
        .filter(|d| d.action.kind() != ActionKind::EndScenario)
        .filter_map(|d| d.scalar_metric(metrics::SEVERITY_CHANGE))
        .collect();
    let n = ranked.len();
    for decision in decisions.iter_mut() {
        let Some(change) = decision.scalar_metric(metrics::SEVERITY_CHANGE) else {
            continue;
        };
        let soundness = if change.is_infinite() {
            metrics::failure_value(metrics::MEDICAL_SOUNDNESS)
        } else if n <= 1 {
            1.0
        } else {
            justifier::rank_position(&ranked, change, false).map_or(0.0, |(position, _)| {
                #[allow(clippy::cast_precision_loss)]
                let scaled = (position - 1) as f64 / (n - 1) as f64;
                1.0 - scaled
            })
        };
        decision
            .metrics
            .insert(metrics::MEDICAL_SOUNDNESS.into(), MetricValue::Scalar(soundness));
    }
}

impl DecisionAnalyzer for MonteCarloAnalyzer {
    fn name(&self) -> &'static str {
        "monte_carlo"
    }

    fn analyze(&mut self, probe: &mut Probe, rng: &mut StdRng) -> Result<(), AnalyzerError> {
        if probe.decisions.is_empty() {
            return Ok(());
        }
        let mut tree = MonteCarloTree::new(
            MedicalSimulator::from_config(&self.config),
            vec![probe.state.clone()],
            self.config.max_depth.max(2),
            Box::new(UnselectedThenRandom),
            metrics::score_functions(),
            StdRng::seed_from_u64(rng.gen()),
        );
        let root = tree.roots()[0];
        let ids = tree.add_decisions(root, probe.decisions.iter().map(|d| d.action.clone()).collect());

        let mut completed = 0usize;
        for _ in 0..self.config.rollouts {
            match tree.rollout()? {
                RolloutOutcome::Leaf(_) => completed += 1,
                RolloutOutcome::Failed => {}
                RolloutOutcome::Exhausted => break,
            }
        }
        debug!(probe = %probe.id, rollouts = completed, candidates = ids.len(), "Monte Carlo rollouts finished");

        let baseline = Baseline::of(&probe.state);
        for (decision, id) in probe.decisions.iter_mut().zip(ids) {
            let node = tree.decision(id);
            if let Some(failure) = &node.failure {
                warn!(probe = %probe.id, action = %decision.action, error = %failure, "Candidate simulation failed");
                decision.metrics.extend(failure_metrics());
            } else if node.samples == 0 {
                debug!(action = %decision.action, "Candidate never sampled, no metrics");
            } else {
                let bundle = simulated_metrics(&tree, id, &decision.action, &baseline);
                decision.metrics.extend(bundle);
            }
        }

        attach_medical_soundness(&mut probe.decisions);
        let justifier = DecisionJustifier::new(&probe.decisions);
        for decision in &mut probe.decisions {
            decision.justifications = justifier.justify(decision);
        }
        Ok(())
    }
}
