//! Triage ADM: an automated decision maker for mass-casualty triage
//!
//! Picks one action per decision point so that the pattern of choices matches
//! a target profile of decision-maker attributes (KDMAs).
//!
//! ## Architecture
//!
//! - **Medical simulator** (`medsim`): damage, treatment and morbidity model
//! - **Monte Carlo tree** (`monte_carlo`): generic expectation tree over any simulator
//! - **Analyzer** (`analyzer`): per-candidate outcome metrics and their ranks
//! - **KDMA estimator** (`kdma`, `selector`): nearest-neighbour prediction of
//!   each candidate's KDMA values from past cases
//! - **Case base** (`storage`) and **trainer**: learning from scene feedback
//! - **Driver** (`driver`): session loop against an evaluation server

pub mod analyzer;
pub mod config;
pub mod driver;
pub mod kdma;
pub mod medsim;
pub mod monte_carlo;
pub mod selector;
pub mod storage;
pub mod trainer;
pub mod types;

pub use config::AdmConfig;

pub use types::{
    Action, ActionKind, AlignmentFeedback, AlignmentTarget, Casualty, Decision, Injury, Probe,
    Supply, TriageState,
};

pub use analyzer::{DecisionAnalyzer, MonteCarloAnalyzer};
pub use driver::{LocalServer, Session, SessionOptions, SessionReport, TriageServer};
pub use kdma::Case;
pub use medsim::MedicalSimulator;
pub use selector::{DecisionSelector, KdmaEstimationSelector};
pub use storage::CaseBase;
pub use trainer::Trainer;
