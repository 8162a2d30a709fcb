//! Wire format of the evaluation server
//!
//! The server speaks loosely typed JSON: labels arrive as free strings,
//! severities as either a label or a number, and actions carry their
//! parameters in a string map. Everything is parsed leniently here and
//! converted into the internal model in one place, so the rest of the crate
//! only ever sees closed variants.
//!
//! ## Conversion rules
//!
//! - Unknown injury names and body locations are rewritten to their fallback
//!   (`Forehead Scrape`, `unspecified`) with a warning.
//! - Unknown vitals, tags, supplies and casualty valuations are dropped with a
//!   warning.
//! - An action is grounded against the current state. Open parameters expand
//!   into several decisions; a fully specified action that names something the
//!   state does not contain is kept as-is and simulates as a no-op.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::medsim::actions::{ground, PartialAction};
use crate::types::{
    Action, ActionKind, Avpu, BodyLocation, BreathingLevel, Casualty, Decision, Demographics,
    Directness, Environment, HeartRate, Injury, InjuryKind, InjurySeverity, Intent, MentalStatus,
    Spo2, Supply, SupplyKind, TriageState, TriageTag, Vitals,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("action {action} is missing {field}")]
    MissingField { action: String, field: &'static str },
    #[error("action {action} has unknown type '{kind}'")]
    UnknownActionKind { action: String, kind: String },
    #[error("action {action} names unknown casualty '{casualty}'")]
    UnknownCasualty { action: String, casualty: String },
    #[error("no action with id '{0}' is on offer")]
    UnknownAction(String),
}

// ============================================================================
// State
// ============================================================================

/// Injury severity as sent: a label such as `"major"` or a score in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalSeverity {
    Score(f64),
    Label(String),
}

impl ExternalSeverity {
    fn score(&self) -> Option<f64> {
        match self {
            ExternalSeverity::Score(v) => Some(*v),
            ExternalSeverity::Label(label) => {
                let parsed = InjurySeverity::from_name(label).map(InjurySeverity::score);
                if parsed.is_none() {
                    warn!(value = %label, "Unknown injury severity, using the injury default");
                }
                parsed
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalInjury {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub severity: Option<ExternalSeverity>,
    #[serde(default)]
    pub treated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalVitals {
    #[serde(default)]
    pub conscious: Option<bool>,
    #[serde(default)]
    pub avpu: Option<String>,
    #[serde(default)]
    pub mental_status: Option<String>,
    #[serde(default)]
    pub breathing: Option<String>,
    #[serde(default)]
    pub heart_rate: Option<String>,
    #[serde(default)]
    pub spo2: Option<String>,
    #[serde(default)]
    pub hrpmin: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCasualty {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unstructured: String,
    #[serde(default)]
    pub injuries: Vec<ExternalInjury>,
    #[serde(default)]
    pub demographics: Demographics,
    #[serde(default)]
    pub vitals: ExternalVitals,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default, alias = "visited")]
    pub assessed: bool,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub directness_of_causality: Option<String>,
    #[serde(default)]
    pub disposition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSupply {
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: u32,
    #[serde(default)]
    pub reusable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalState {
    #[serde(default)]
    pub unstructured: String,
    #[serde(default, alias = "time")]
    pub elapsed_time: f64,
    #[serde(default)]
    pub casualties: Vec<ExternalCasualty>,
    #[serde(default)]
    pub supplies: Vec<ExternalSupply>,
    #[serde(default)]
    pub aid_delay: Option<f64>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub scenario_complete: bool,
    /// Scene the state belongs to, when the server reports one.
    #[serde(default)]
    pub scene_id: Option<String>,
}

/// Parse an optional label, warning when it is present but unknown.
fn label<T>(raw: Option<&str>, field: &'static str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = raw?;
    let parsed = parse(raw);
    if parsed.is_none() {
        warn!(field, value = %raw, "Unknown label, dropping");
    }
    parsed
}

impl ExternalVitals {
    fn to_internal(&self) -> Vitals {
        Vitals {
            conscious: self.conscious,
            avpu: label(self.avpu.as_deref(), "avpu", Avpu::from_name),
            mental_status: label(self.mental_status.as_deref(), "mental_status", MentalStatus::from_name),
            breathing: label(self.breathing.as_deref(), "breathing", BreathingLevel::from_name),
            heart_rate: label(self.heart_rate.as_deref(), "heart_rate", HeartRate::from_name),
            spo2: label(self.spo2.as_deref(), "spo2", Spo2::from_name),
            hrpmin: self.hrpmin,
        }
    }

    fn from_internal(vitals: &Vitals) -> Self {
        Self {
            conscious: vitals.conscious,
            avpu: vitals.avpu.map(|v| v.name().to_string()),
            mental_status: vitals.mental_status.map(|v| v.name().to_string()),
            breathing: vitals.breathing.map(|v| v.name().to_string()),
            heart_rate: vitals.heart_rate.map(|v| v.name().to_string()),
            spo2: vitals.spo2.map(|v| v.name().to_string()),
            hrpmin: vitals.hrpmin,
        }
    }
}

impl ExternalInjury {
    fn to_internal(&self) -> Injury {
        let kind = InjuryKind::parse_lenient(&self.name).unwrap_or(InjuryKind::ForeheadScrape);
        let location = BodyLocation::parse_lenient(&self.location).unwrap_or(BodyLocation::Unspecified);
        let mut injury = Injury::new(kind, location, self.severity.as_ref().and_then(ExternalSeverity::score));
        injury.treated = self.treated;
        injury
    }
}

impl ExternalCasualty {
    fn to_internal(&self) -> Casualty {
        Casualty {
            id: self.id.clone(),
            name: self.name.clone(),
            unstructured: self.unstructured.clone(),
            relationship: self.relationship.clone(),
            intent: label(self.intent.as_deref(), "intent", Intent::from_name),
            directness_of_causality: label(
                self.directness_of_causality.as_deref(),
                "directness_of_causality",
                Directness::from_name,
            ),
            disposition: self.disposition.clone(),
            demographics: self.demographics.clone(),
            vitals: self.vitals.to_internal(),
            injuries: self.injuries.iter().map(ExternalInjury::to_internal).collect(),
            tag: label(self.tag.as_deref(), "tag", TriageTag::from_name),
            assessed: self.assessed,
            ..Casualty::default()
        }
    }

    fn from_internal(casualty: &Casualty) -> Self {
        Self {
            id: casualty.id.clone(),
            name: casualty.name.clone(),
            unstructured: casualty.unstructured.clone(),
            injuries: casualty
                .injuries
                .iter()
                .map(|i| ExternalInjury {
                    name: i.kind.name().to_string(),
                    location: i.location.name().to_string(),
                    severity: Some(ExternalSeverity::Score(i.severity)),
                    treated: i.treated,
                })
                .collect(),
            demographics: casualty.demographics.clone(),
            vitals: ExternalVitals::from_internal(&casualty.vitals),
            tag: casualty.tag.map(|t| t.name().to_string()),
            assessed: casualty.assessed,
            relationship: casualty.relationship.clone(),
            intent: casualty.intent.map(|v| v.name().to_string()),
            directness_of_causality: casualty.directness_of_causality.map(|v| v.name().to_string()),
            disposition: casualty.disposition.clone(),
        }
    }
}

impl ExternalState {
    /// Internal state with freshly computed morbidity.
    pub fn to_internal(&self) -> TriageState {
        let supplies = self
            .supplies
            .iter()
            .filter_map(|s| {
                let kind = label(Some(&s.kind), "supply", SupplyKind::from_name)?;
                Some(Supply { kind, quantity: s.quantity, reusable: s.reusable })
            })
            .collect();
        let mut state = TriageState {
            time: self.elapsed_time,
            casualties: self.casualties.iter().map(ExternalCasualty::to_internal).collect(),
            supplies,
            unstructured: self.unstructured.clone(),
            aid_delay: self.aid_delay,
            environment: self.environment.clone(),
        };
        crate::medsim::morbidity::update_morbidity(&mut state);
        state
    }

    /// Wire form of an internal state, as the local server reports it.
    pub fn from_internal(state: &TriageState, scenario_complete: bool) -> Self {
        Self {
            unstructured: state.unstructured.clone(),
            elapsed_time: state.time,
            casualties: state.casualties.iter().map(ExternalCasualty::from_internal).collect(),
            supplies: state
                .supplies
                .iter()
                .map(|s| ExternalSupply {
                    kind: s.kind.name().to_string(),
                    quantity: s.quantity,
                    reusable: s.reusable,
                })
                .collect(),
            aid_delay: state.aid_delay,
            environment: state.environment.clone(),
            scenario_complete,
            scene_id: None,
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

pub const PARAM_TREATMENT: &str = "treatment";
pub const PARAM_LOCATION: &str = "location";
pub const PARAM_CATEGORY: &str = "category";
pub const PARAM_EVAC_ID: &str = "evac_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalAction {
    pub action_id: String,
    #[serde(default)]
    pub action_type: Option<String>,
    #[serde(default, alias = "character_id")]
    pub casualty_id: Option<String>,
    #[serde(default)]
    pub kdma_association: BTreeMap<String, f64>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub unstructured: String,
}

impl ExternalAction {
    /// Parse into a partial internal action.
    pub fn to_partial(&self) -> Result<PartialAction, ProtocolError> {
        let raw_kind = self.action_type.as_deref().ok_or_else(|| ProtocolError::MissingField {
            action: self.action_id.clone(),
            field: "action_type",
        })?;
        let kind = ActionKind::from_name(raw_kind).ok_or_else(|| ProtocolError::UnknownActionKind {
            action: self.action_id.clone(),
            kind: raw_kind.to_string(),
        })?;
        let param = |name: &str| self.parameters.get(name).map(String::as_str);
        Ok(PartialAction {
            kind: Some(kind),
            casualty: self.casualty_id.clone(),
            supply: label(param(PARAM_TREATMENT), "treatment", SupplyKind::from_name),
            location: param(PARAM_LOCATION).and_then(BodyLocation::parse_lenient),
            tag: label(param(PARAM_CATEGORY), "category", TriageTag::from_name),
            evac_id: param(PARAM_EVAC_ID).map(str::to_string),
        })
    }

    /// The server action that executes `action`, under the offered id.
    pub fn from_action(action_id: &str, action: &Action) -> Self {
        let mut parameters = BTreeMap::new();
        match action {
            Action::ApplyTreatment { supply, location, .. } => {
                parameters.insert(PARAM_TREATMENT.to_string(), supply.name().to_string());
                parameters.insert(PARAM_LOCATION.to_string(), location.name().to_string());
            }
            Action::TagCharacter { tag, .. } => {
                parameters.insert(PARAM_CATEGORY.to_string(), tag.name().to_string());
            }
            Action::MoveToEvac { evac_id: Some(evac), .. } => {
                parameters.insert(PARAM_EVAC_ID.to_string(), evac.clone());
            }
            _ => {}
        }
        Self {
            action_id: action_id.to_string(),
            action_type: Some(action.kind().name().to_string()),
            casualty_id: action.casualty().map(str::to_string),
            kdma_association: BTreeMap::new(),
            parameters,
            unstructured: String::new(),
        }
    }
}

/// The action a fully specified partial describes, without consulting any state.
fn concrete(partial: &PartialAction) -> Option<Action> {
    let casualty = partial.casualty.clone();
    Some(match partial.kind? {
        ActionKind::ApplyTreatment => Action::ApplyTreatment {
            casualty: casualty?,
            supply: partial.supply?,
            location: partial.location?,
        },
        ActionKind::CheckAllVitals => Action::CheckAllVitals { casualty: casualty? },
        ActionKind::CheckPulse => Action::CheckPulse { casualty: casualty? },
        ActionKind::CheckRespiration => Action::CheckRespiration { casualty: casualty? },
        ActionKind::CheckBloodOxygen => Action::CheckBloodOxygen { casualty: casualty? },
        ActionKind::TagCharacter => Action::TagCharacter { casualty: casualty?, tag: partial.tag? },
        ActionKind::MoveToEvac => Action::MoveToEvac { casualty: casualty?, evac_id: partial.evac_id.clone() },
        ActionKind::DirectMobileCasualty => Action::DirectMobileCasualty,
        ActionKind::Search => Action::Search,
        ActionKind::Sitrep => Action::Sitrep { casualty },
        ActionKind::Message => Action::Message,
        ActionKind::EndScene => Action::EndScene,
        ActionKind::EndScenario => Action::EndScenario,
    })
}

/// Candidate decisions for a probe, each remembering the server action it came from.
#[derive(Debug, Clone, Default)]
pub struct GroundedDecisions {
    pub decisions: Vec<Decision>,
    /// Server action id of each decision, in decision order.
    pub origins: Vec<String>,
}

/// Ground every server action against `state`.
///
/// A server action that expands into several concrete actions yields decisions
/// `"{id}.1"`, `"{id}.2"`, and so on. An action that grounds to nothing is
/// dropped, unless it names a casualty the state does not know, which is a
/// protocol error.
pub fn ground_actions(actions: &[ExternalAction], state: &TriageState) -> Result<GroundedDecisions, ProtocolError> {
    let mut grounded = GroundedDecisions::default();
    for external in actions {
        let partial = external.to_partial()?;
        let mut concrete_actions = ground(&partial, state);
        if concrete_actions.is_empty() {
            if let Some(action) = concrete(&partial) {
                debug!(action = %external.action_id, "Action references unknown entities, keeping as no-op");
                concrete_actions.push(action);
            } else if let Some(casualty) = partial.casualty.as_ref().filter(|c| state.casualty(c).is_none()) {
                return Err(ProtocolError::UnknownCasualty {
                    action: external.action_id.clone(),
                    casualty: casualty.clone(),
                });
            } else {
                debug!(action = %external.action_id, "Action has nothing to ground against, skipping");
                continue;
            }
        }

        let expanded = concrete_actions.len() > 1;
        for (n, action) in concrete_actions.into_iter().enumerate() {
            let id = if expanded {
                format!("{}.{}", external.action_id, n + 1)
            } else {
                external.action_id.clone()
            };
            let mut decision = Decision::new(id, action);
            decision.kdma_association = external.kdma_association.clone();
            grounded.decisions.push(decision);
            grounded.origins.push(external.action_id.clone());
        }
    }
    Ok(grounded)
}
