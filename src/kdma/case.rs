//! Cases: the feature record of one candidate decision

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{
    rank_ordinal, ActionKind, Avpu, BreathingLevel, CaseType, Decision, Directness, Intent,
    KdmaValues, MentalStatus, MetricValue, Probe, SupplyKind, TriageTag,
};

use super::distance::FeatureValue;

/// The fixed feature schema of a case.
///
/// Casualty features describe the casualty the action targets and are absent
/// for actions without one. Counts exclude that casualty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visited: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    /// Normalized rank ordinal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub military_paygrade: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conscious: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mental_status: Option<MentalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breathing: Option<BreathingLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hrpmin: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avpu: Option<Avpu>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directness_of_causality: Option<Directness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aid_available: Option<bool>,
    pub unvisited_count: usize,
    pub injured_count: usize,
    pub others_tagged_or_uninjured: usize,
    pub action_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment: Option<SupplyKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TriageTag>,
    pub treating: bool,
    pub tagging: bool,
    pub leaving: bool,
    pub questioning: bool,
    pub assessing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Position in the case base, assigned on commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub scene: String,
    pub probe_id: String,
    pub decision_id: String,
    pub features: CaseFeatures,
    /// Analyzer metrics, flattened to `NAME` or `NAME.key`.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// KDMA values attributed by the trainer.
    #[serde(default)]
    pub kdmas: KdmaValues,
    /// KDMA association the server attached to the decision.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub associations: KdmaValues,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub estimates: KdmaValues,
    /// `{kdma}_neighbor{n}` to the index of the case used.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub neighbors: BTreeMap<String, usize>,
    /// Squared distance to the target at selection time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

fn flatten_metrics(metrics: &BTreeMap<String, MetricValue>) -> BTreeMap<String, f64> {
    let mut flat = BTreeMap::new();
    for (name, value) in metrics {
        for (suffix, v) in value.flatten() {
            if !v.is_finite() {
                continue;
            }
            let key = suffix.map_or_else(|| name.clone(), |s| format!("{name}.{s}"));
            flat.insert(key, v);
        }
    }
    flat
}

impl Case {
    /// Build the case for `decision` as offered in `probe`.
    pub fn from_decision(probe: &Probe, decision: &Decision) -> Self {
        let state = &probe.state;
        let action = &decision.action;
        let kind = action.kind();
        let target_id = action.casualty();
        let target = target_id.and_then(|id| state.casualty(id));
        let others = || state.casualties.iter().filter(move |c| Some(c.id.as_str()) != target_id);

        let mut features = CaseFeatures {
            environment_type: state.environment.environment_type.clone(),
            aid_available: state.environment.aid_available,
            unvisited_count: others().filter(|c| !c.assessed).count(),
            injured_count: others().filter(|c| c.is_injured()).count(),
            others_tagged_or_uninjured: others().filter(|c| c.tag.is_some() || !c.is_injured()).count(),
            action_name: kind.name().to_string(),
            ..CaseFeatures::default()
        };
        if let Some(c) = target {
            features.age = c.demographics.age;
            features.tagged = Some(c.tag.is_some());
            features.visited = Some(c.assessed);
            features.relationship.clone_from(&c.relationship);
            features.military_paygrade = c.demographics.rank.as_deref().and_then(rank_ordinal);
            features.conscious = c.vitals.conscious;
            features.mental_status = c.vitals.mental_status;
            features.breathing = c.vitals.breathing;
            features.hrpmin = c.vitals.hrpmin;
            features.avpu = c.vitals.avpu;
            features.intent = c.intent;
            features.directness_of_causality = c.directness_of_causality;
            features.disposition.clone_from(&c.disposition);
        }
        match action {
            crate::types::Action::ApplyTreatment { supply, .. } => features.treatment = Some(*supply),
            crate::types::Action::TagCharacter { tag, .. } => features.category = Some(*tag),
            _ => {}
        }
        match kind.case_type() {
            CaseType::Treating => features.treating = true,
            CaseType::Tagging => features.tagging = true,
            CaseType::Leaving => features.leaving = true,
            CaseType::Questioning => features.questioning = true,
            CaseType::Assessing => features.assessing = true,
        }

        Self {
            index: None,
            scene: probe.scene.clone(),
            probe_id: probe.id.clone(),
            decision_id: decision.id.clone(),
            features,
            metrics: flatten_metrics(&decision.metrics),
            associations: decision.kdma_association.clone(),
            ..Self::default()
        }
    }

    pub fn case_types(&self) -> Vec<CaseType> {
        let f = &self.features;
        CaseType::ALL
            .into_iter()
            .filter(|t| match t {
                CaseType::Treating => f.treating,
                CaseType::Tagging => f.tagging,
                CaseType::Leaving => f.leaving,
                CaseType::Questioning => f.questioning,
                CaseType::Assessing => f.assessing,
            })
            .collect()
    }

    /// Attributed value of `kdma`, matched case-insensitively.
    pub fn kdma_value(&self, kdma: &str) -> Option<f64> {
        self.kdmas.get(kdma).copied().or_else(|| {
            self.kdmas
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(kdma))
                .map(|(_, v)| *v)
        })
    }

    /// Look up a feature by name: fixed schema first, then metrics, then KDMAs.
    pub fn feature(&self, name: &str) -> Option<FeatureValue<'_>> {
        let f = &self.features;
        let count = |n: usize| {
            #[allow(clippy::cast_precision_loss)]
            let v = n as f64;
            Some(FeatureValue::Number(v))
        };
        match name {
            "age" => f.age.map(|a| FeatureValue::Number(f64::from(a))),
            "tagged" => f.tagged.map(FeatureValue::Flag),
            "visited" => f.visited.map(FeatureValue::Flag),
            "relationship" => f.relationship.as_deref().map(FeatureValue::Category),
            "military_paygrade" => f.military_paygrade.map(FeatureValue::Number),
            "conscious" => f.conscious.map(FeatureValue::Flag),
            "mental_status" => f.mental_status.map(|m| FeatureValue::Category(m.name())),
            "breathing" => f.breathing.map(|b| FeatureValue::Category(b.name())),
            "hrpmin" => f.hrpmin.map(|h| FeatureValue::Number(f64::from(h))),
            "avpu" => f.avpu.map(|a| FeatureValue::Category(a.name())),
            "intent" => f.intent.map(|i| FeatureValue::Number(i.valuation())),
            "directness_of_causality" => f.directness_of_causality.map(|d| FeatureValue::Number(d.valuation())),
            "disposition" => f.disposition.as_deref().map(FeatureValue::Category),
            "environment_type" => f.environment_type.as_deref().map(FeatureValue::Category),
            "aid_available" => f.aid_available.map(FeatureValue::Flag),
            "unvisited_count" => count(f.unvisited_count),
            "injured_count" => count(f.injured_count),
            "others_tagged_or_uninjured" => count(f.others_tagged_or_uninjured),
            "action_name" => Some(FeatureValue::Category(&f.action_name)),
            "treatment" => f.treatment.map(|s| FeatureValue::Category(s.name())),
            "category" => f.category.map(|t| FeatureValue::Category(t.name())),
            "treating" => Some(FeatureValue::Flag(f.treating)),
            "tagging" => Some(FeatureValue::Flag(f.tagging)),
            "leaving" => Some(FeatureValue::Flag(f.leaving)),
            "questioning" => Some(FeatureValue::Flag(f.questioning)),
            "assessing" => Some(FeatureValue::Flag(f.assessing)),
            other => self
                .metrics
                .get(other)
                .copied()
                .or_else(|| self.kdma_value(other))
                .map(FeatureValue::Number),
        }
    }

    pub fn is_kind(&self, kind: ActionKind) -> bool {
        self.features.action_name == kind.name()
    }
}
