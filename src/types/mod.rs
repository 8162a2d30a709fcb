//! Shared data model for the triage decision maker
//!
//! - `medical`: fixed-label vocabularies (injuries, locations, supplies, vitals, tags)
//! - `state`: casualties, injuries, supplies and the world state
//! - `action`: the closed action variant and its classification
//! - `probe`: decision points and candidate decisions
//! - `metrics`: analyzer outputs attached to decisions
//! - `kdma`: alignment targets and feedback

pub mod action;
pub mod kdma;
pub mod medical;
pub mod metrics;
pub mod probe;
pub mod state;

pub use action::{Action, ActionKind, CaseType};
pub use kdma::{AlignmentFeedback, AlignmentTarget, KdmaValues, TargetType, TargetValue};
pub use medical::{
    rank_ordinal, Avpu, BodyLocation, BodyRegion, BreathingLevel, Directness, EffectLevel,
    HeartRate, InjuryKind, InjurySeverity, Intent, MentalStatus, Spo2, SupplyKind, TriageTag,
};
pub use metrics::{MetricRank, MetricValue, OutcomeSummary};
pub use probe::{Decision, Probe};
pub use state::{
    Casualty, Demographics, Environment, Injury, Morbidity, Recovery, Supply, TriageState,
    Vitals,
};
