//! Internal action model
//!
//! Actions are closed tagged variants. The JSON form uses an `action_type`
//! discriminator with the server's SCREAMING_SNAKE_CASE names.

use serde::{Deserialize, Serialize};

use super::medical::{BodyLocation, SupplyKind, TriageTag};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    ApplyTreatment {
        casualty: String,
        supply: SupplyKind,
        location: BodyLocation,
    },
    CheckAllVitals {
        casualty: String,
    },
    CheckPulse {
        casualty: String,
    },
    CheckRespiration {
        casualty: String,
    },
    CheckBloodOxygen {
        casualty: String,
    },
    TagCharacter {
        casualty: String,
        tag: TriageTag,
    },
    MoveToEvac {
        casualty: String,
        #[serde(default)]
        evac_id: Option<String>,
    },
    DirectMobileCasualty,
    Search,
    Sitrep {
        #[serde(default)]
        casualty: Option<String>,
    },
    Message,
    EndScene,
    EndScenario,
}

impl Action {
    pub const fn kind(&self) -> ActionKind {
        match self {
            Action::ApplyTreatment { .. } => ActionKind::ApplyTreatment,
            Action::CheckAllVitals { .. } => ActionKind::CheckAllVitals,
            Action::CheckPulse { .. } => ActionKind::CheckPulse,
            Action::CheckRespiration { .. } => ActionKind::CheckRespiration,
            Action::CheckBloodOxygen { .. } => ActionKind::CheckBloodOxygen,
            Action::TagCharacter { .. } => ActionKind::TagCharacter,
            Action::MoveToEvac { .. } => ActionKind::MoveToEvac,
            Action::DirectMobileCasualty => ActionKind::DirectMobileCasualty,
            Action::Search => ActionKind::Search,
            Action::Sitrep { .. } => ActionKind::Sitrep,
            Action::Message => ActionKind::Message,
            Action::EndScene => ActionKind::EndScene,
            Action::EndScenario => ActionKind::EndScenario,
        }
    }

    /// Casualty the action targets, if any.
    pub fn casualty(&self) -> Option<&str> {
        match self {
            Action::ApplyTreatment { casualty, .. }
            | Action::CheckAllVitals { casualty }
            | Action::CheckPulse { casualty }
            | Action::CheckRespiration { casualty }
            | Action::CheckBloodOxygen { casualty }
            | Action::TagCharacter { casualty, .. }
            | Action::MoveToEvac { casualty, .. } => Some(casualty),
            Action::Sitrep { casualty } => casualty.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::ApplyTreatment { casualty, supply, location } => {
                write!(f, "APPLY_TREATMENT({casualty}, {supply}, {location})")
            }
            Action::TagCharacter { casualty, tag } => write!(f, "TAG_CHARACTER({casualty}, {tag})"),
            other => match other.casualty() {
                Some(c) => write!(f, "{}({c})", other.kind()),
                None => write!(f, "{}", other.kind()),
            },
        }
    }
}

// ============================================================================
// Action kinds
// ============================================================================

/// Discriminant of [`Action`], as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    ApplyTreatment,
    CheckAllVitals,
    CheckPulse,
    CheckRespiration,
    CheckBloodOxygen,
    TagCharacter,
    MoveToEvac,
    DirectMobileCasualty,
    Search,
    Sitrep,
    Message,
    EndScene,
    EndScenario,
}

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        ActionKind::ApplyTreatment,
        ActionKind::CheckAllVitals,
        ActionKind::CheckPulse,
        ActionKind::CheckRespiration,
        ActionKind::CheckBloodOxygen,
        ActionKind::TagCharacter,
        ActionKind::MoveToEvac,
        ActionKind::DirectMobileCasualty,
        ActionKind::Search,
        ActionKind::Sitrep,
        ActionKind::Message,
        ActionKind::EndScene,
        ActionKind::EndScenario,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ActionKind::ApplyTreatment => "APPLY_TREATMENT",
            ActionKind::CheckAllVitals => "CHECK_ALL_VITALS",
            ActionKind::CheckPulse => "CHECK_PULSE",
            ActionKind::CheckRespiration => "CHECK_RESPIRATION",
            ActionKind::CheckBloodOxygen => "CHECK_BLOOD_OXYGEN",
            ActionKind::TagCharacter => "TAG_CHARACTER",
            ActionKind::MoveToEvac => "MOVE_TO_EVAC",
            ActionKind::DirectMobileCasualty => "DIRECT_MOBILE_CASUALTY",
            ActionKind::Search => "SEARCH",
            ActionKind::Sitrep => "SITREP",
            ActionKind::Message => "MESSAGE",
            ActionKind::EndScene => "END_SCENE",
            ActionKind::EndScenario => "END_SCENARIO",
        }
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|k| k.name() == wanted)
    }

    /// Whether the action cannot be executed without a casualty.
    pub const fn requires_casualty(self) -> bool {
        matches!(
            self,
            ActionKind::ApplyTreatment
                | ActionKind::CheckAllVitals
                | ActionKind::CheckPulse
                | ActionKind::CheckRespiration
                | ActionKind::CheckBloodOxygen
                | ActionKind::TagCharacter
                | ActionKind::MoveToEvac
        )
    }

    pub const fn case_type(self) -> CaseType {
        match self {
            ActionKind::ApplyTreatment | ActionKind::MoveToEvac => CaseType::Treating,
            ActionKind::CheckAllVitals
            | ActionKind::CheckPulse
            | ActionKind::CheckRespiration
            | ActionKind::CheckBloodOxygen
            | ActionKind::Sitrep => CaseType::Assessing,
            ActionKind::TagCharacter => CaseType::Tagging,
            ActionKind::EndScene | ActionKind::EndScenario => CaseType::Leaving,
            ActionKind::DirectMobileCasualty | ActionKind::Search | ActionKind::Message => {
                CaseType::Questioning
            }
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coarse activity class of an action, used for retrieval filters and weight overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseType {
    Treating,
    Tagging,
    Leaving,
    Questioning,
    Assessing,
}

impl CaseType {
    pub const ALL: [CaseType; 5] = [
        CaseType::Treating,
        CaseType::Tagging,
        CaseType::Leaving,
        CaseType::Questioning,
        CaseType::Assessing,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            CaseType::Treating => "treating",
            CaseType::Tagging => "tagging",
            CaseType::Leaving => "leaving",
            CaseType::Questioning => "questioning",
            CaseType::Assessing => "assessing",
        }
    }
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_json_shape() {
        let action = Action::ApplyTreatment {
            casualty: "casualty_a".into(),
            supply: SupplyKind::Tourniquet,
            location: BodyLocation::RightCalf,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action_type"], "APPLY_TREATMENT");
        assert_eq!(json["supply"], "Tourniquet");
        assert_eq!(json["location"], "right calf");
        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_case_type_classification() {
        assert_eq!(ActionKind::MoveToEvac.case_type(), CaseType::Treating);
        assert_eq!(ActionKind::Sitrep.case_type(), CaseType::Assessing);
        assert_eq!(ActionKind::EndScenario.case_type(), CaseType::Leaving);
        assert_eq!(ActionKind::Message.case_type(), CaseType::Questioning);
    }

    #[test]
    fn test_action_kind_lookup() {
        assert_eq!(ActionKind::from_name("check_pulse"), Some(ActionKind::CheckPulse));
        assert_eq!(ActionKind::from_name("FLY_AWAY"), None);
    }
}
