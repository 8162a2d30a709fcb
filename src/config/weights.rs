//! Feature weight settings for case retrieval
//!
//! ## File format
//!
//! ```json
//! {
//!   "default": 0,
//!   "standard_weights": {"age": 1.0},
//!   "activity_weights": {"treating": {"treatment": 3.0}},
//!   "kdma_specific_weights": {"risk_aversion": {"P_DEATH": 2.0}}
//! }
//! ```
//!
//! ## Composition
//!
//! The effective weights for a (case, KDMA) pair are a left fold of overlays:
//! `default` is applied to every feature named anywhere in the file, then
//! `standard_weights`, then the activity overlay of every case type the case
//! carries, then the overlay for the KDMA. Later overlays win.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::types::CaseType;

/// Feature name to weight.
pub type Weights = BTreeMap<String, f64>;

/// Case features weighted 1.0 when no weight file is supplied.
pub const BASIC_TRIAGE_FEATURES: &[&str] = &[
    "unvisited_count",
    "injured_count",
    "others_tagged_or_uninjured",
    "age",
    "tagged",
    "visited",
    "conscious",
    "military_paygrade",
    "mental_status",
    "breathing",
    "hrpmin",
    "avpu",
    "intent",
    "relationship",
    "disposition",
    "directness_of_causality",
    "aid_available",
    "environment_type",
    "action_name",
    "treatment",
    "category",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightSettings {
    #[serde(default)]
    pub default: f64,
    #[serde(default)]
    pub standard_weights: Weights,
    #[serde(default)]
    pub activity_weights: BTreeMap<String, Weights>,
    #[serde(default)]
    pub kdma_specific_weights: BTreeMap<String, Weights>,
}

impl WeightSettings {
    /// Weight 1.0 on the basic triage features and the case-type flags.
    pub fn uniform() -> Self {
        let standard_weights = BASIC_TRIAGE_FEATURES
            .iter()
            .copied()
            .chain(CaseType::ALL.iter().map(|t| t.name()))
            .map(|f| (f.to_string(), 1.0))
            .collect();
        Self { default: 0.0, standard_weights, ..Self::default() }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Load a weight file, falling back to uniform weights on any failure.
    pub fn load_or_uniform(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("No weight file configured, using uniform weights");
            return Self::uniform();
        };
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| Self::from_json(&raw).map_err(|e| e.to_string()));
        match parsed {
            Ok(settings) => {
                info!(
                    path = %path.display(),
                    standard = settings.standard_weights.len(),
                    kdmas = settings.kdma_specific_weights.len(),
                    "Loaded weight settings"
                );
                settings
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load weight file, using uniform weights");
                Self::uniform()
            }
        }
    }

    fn all_feature_names(&self) -> impl Iterator<Item = &String> {
        self.standard_weights
            .keys()
            .chain(self.activity_weights.values().flat_map(BTreeMap::keys))
            .chain(self.kdma_specific_weights.values().flat_map(BTreeMap::keys))
    }

    /// Effective weights for a case carrying `case_types`, estimating `kdma`.
    pub fn compose(&self, case_types: &[CaseType], kdma: &str) -> Weights {
        let base: Weights = self.all_feature_names().map(|f| (f.clone(), self.default)).collect();
        let activity = case_types
            .iter()
            .filter_map(|t| self.activity_weights.get(t.name()));
        std::iter::once(&self.standard_weights)
            .chain(activity)
            .chain(self.kdma_specific_weights.get(kdma))
            .fold(base, |mut acc, overlay| {
                acc.extend(overlay.iter().map(|(k, v)| (k.clone(), *v)));
                acc
            })
    }
}
