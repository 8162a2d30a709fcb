//! Alignment targets and server feedback

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// KDMA name to value.
pub type KdmaValues = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Scalar,
    Kde,
}

/// A target value: a scalar, or samples of a distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetValue {
    Scalar(f64),
    Samples(Vec<f64>),
}

impl TargetValue {
    /// Point value the selector aims for. Distributions resolve to their sample mean.
    pub fn point(&self) -> Option<f64> {
        match self {
            TargetValue::Scalar(v) => Some(*v),
            TargetValue::Samples(samples) if samples.is_empty() => None,
            TargetValue::Samples(samples) => {
                #[allow(clippy::cast_precision_loss)]
                let n = samples.len() as f64;
                Some(samples.iter().sum::<f64>() / n)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentTarget {
    pub id: String,
    pub kdma_names: Vec<String>,
    pub values: BTreeMap<String, TargetValue>,
    #[serde(default)]
    pub target_type: TargetType,
}

impl AlignmentTarget {
    /// Build a scalar target from `(name, value)` pairs.
    pub fn scalar(id: impl Into<String>, values: &[(&str, f64)]) -> Self {
        Self {
            id: id.into(),
            kdma_names: values.iter().map(|(k, _)| (*k).to_string()).collect(),
            values: values
                .iter()
                .map(|(k, v)| ((*k).to_string(), TargetValue::Scalar(*v)))
                .collect(),
            target_type: TargetType::Scalar,
        }
    }

    /// Resolved point targets in `kdma_names` order.
    pub fn points(&self) -> Vec<(String, f64)> {
        self.kdma_names
            .iter()
            .filter_map(|name| {
                let value = self.values.get(name)?.point()?;
                Some((name.clone(), value))
            })
            .collect()
    }
}

/// Per-scene KDMA feedback returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentFeedback {
    pub target_name: String,
    pub kdma_values: KdmaValues,
    pub alignment_score: f64,
    pub source_probes: Vec<String>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub scene_end: bool,
    pub scene: String,
}
