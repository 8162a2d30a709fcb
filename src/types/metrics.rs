//! Metric values attached to decisions by the analyzer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named analyzer output. Scalars dominate; some metrics are keyed per
/// casualty and the non-determinism summary is a list of outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    PerCasualty(BTreeMap<String, f64>),
    Outcomes(Vec<OutcomeSummary>),
}

impl MetricValue {
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Flatten into `(suffix, value)` pairs. Scalars have an empty suffix;
    /// keyed values use their key; outcome lists are not flattened.
    pub fn flatten(&self) -> Vec<(Option<String>, f64)> {
        match self {
            MetricValue::Scalar(v) => vec![(None, *v)],
            MetricValue::PerCasualty(map) => {
                map.iter().map(|(k, v)| (Some(k.clone()), *v)).collect()
            }
            MetricValue::Outcomes(_) => Vec::new(),
        }
    }
}

/// One distinct simulated outcome of a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub probability: f64,
    pub severity: f64,
    pub p_death: f64,
}

/// Where a decision placed on one metric relative to its siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRank {
    /// 1-based position, prefixed with `T-` when shared with another decision.
    pub rank: String,
    pub rank_total: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}
