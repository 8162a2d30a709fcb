//! Probes and the candidate decisions they offer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::action::Action;
use super::metrics::{MetricRank, MetricValue};
use super::state::TriageState;

/// A candidate action, enriched by the analyzer before selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub action: Action,
    /// KDMA values the server associates with this choice (training sessions only).
    #[serde(default)]
    pub kdma_association: BTreeMap<String, f64>,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub justifications: BTreeMap<String, MetricRank>,
}

impl Decision {
    pub fn new(id: impl Into<String>, action: Action) -> Self {
        Self {
            id: id.into(),
            action,
            kdma_association: BTreeMap::new(),
            metrics: BTreeMap::new(),
            justifications: BTreeMap::new(),
        }
    }

    pub fn scalar_metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(MetricValue::as_scalar)
    }
}

/// One decision point: state plus the choices on offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub id: String,
    pub scene: String,
    #[serde(default)]
    pub prompt: String,
    pub state: TriageState,
    pub decisions: Vec<Decision>,
}
