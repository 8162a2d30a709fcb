//! Decision justifier: where each decision ranks among its siblings
//!
//! Every scalar metric is collected across the probe's decisions. A decision's
//! justification for a metric records its rank (best first, `T-` when tied),
//! how many decisions were ranked, and the min/max/mean of the column.

use std::collections::BTreeMap;

use statrs::statistics::Statistics;

use crate::types::{ActionKind, Decision, MetricRank};

use super::metrics::is_maximized;

fn ordinal_suffix(n: usize) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// 1-based position of `value` in `column` sorted best first, and whether it is shared.
pub fn rank_position(column: &[f64], value: f64, descending: bool) -> Option<(usize, bool)> {
    let mut sorted = column.to_vec();
    sorted.sort_by(f64::total_cmp);
    if descending {
        sorted.reverse();
    }
    let position = sorted.iter().position(|v| *v == value)? + 1;
    let tied = sorted.iter().filter(|v| **v == value).count() > 1;
    Some((position, tied))
}

#[derive(Debug, Clone, Default)]
pub struct DecisionJustifier {
    columns: BTreeMap<String, Vec<f64>>,
}

impl DecisionJustifier {
    /// Collect scalar metric columns. END_SCENARIO is never ranked.
    pub fn new(decisions: &[Decision]) -> Self {
        let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for decision in decisions.iter().filter(|d| d.action.kind() != ActionKind::EndScenario) {
            for (name, value) in &decision.metrics {
                if let Some(v) = value.as_scalar() {
                    columns.entry(name.clone()).or_default().push(v);
                }
            }
        }
        Self { columns }
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, metric: &str) -> Option<&[f64]> {
        self.columns.get(metric).map(Vec::as_slice)
    }

    pub fn rank(&self, metric: &str, value: f64) -> Option<MetricRank> {
        let column = self.columns.get(metric)?;
        let (position, tied) = rank_position(column, value, is_maximized(metric))?;
        Some(MetricRank {
            rank: format!("{}{position}{}", if tied { "T-" } else { "" }, ordinal_suffix(position)),
            rank_total: column.len(),
            min: Statistics::min(column.iter()),
            max: Statistics::max(column.iter()),
            mean: Statistics::mean(column.iter()),
        })
    }

    /// Justifications for every scalar metric the decision carries.
    pub fn justify(&self, decision: &Decision) -> BTreeMap<String, MetricRank> {
        if decision.action.kind() == ActionKind::EndScenario {
            return BTreeMap::new();
        }
        decision
            .metrics
            .iter()
            .filter_map(|(name, value)| {
                let v = value.as_scalar()?;
                self.rank(name, v).map(|r| (name.clone(), r))
            })
            .collect()
    }
}
