//! Session driver
//!
//! Runs a full evaluation session against a [`TriageServer`]: for every probe
//! it grounds the offered actions, analyzes them, selects one, and sends it
//! back. In training sessions the cases built for each chosen decision wait
//! until the server closes the scene with feedback, then the trainer attributes
//! the scene's KDMA values to them and commits them to the case base.
//!
//! ## Error boundaries
//!
//! Protocol and server errors end the session. Analyzer failures are logged
//! and the probe proceeds without metrics. Feedback that cannot be attributed
//! is logged and its cases are dropped.

pub mod external;
pub mod server;

use rand::rngs::StdRng;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::analyzer::DecisionAnalyzer;
use crate::kdma::Case;
use crate::selector::{DecisionSelector, SelectError};
use crate::storage::{CaseBase, CaseBaseError, DecisionRecord, DumpWriter};
use crate::trainer::{Trainer, TrainerError};
use crate::types::{AlignmentFeedback, AlignmentTarget, Probe};

pub use external::{ground_actions, ExternalAction, ExternalState, GroundedDecisions, ProtocolError};
pub use server::{
    alignment_score, LocalServer, ScenarioDescriptor, ScenarioFile, ServerError, SessionAlignment,
    SessionRequest, SessionType, TakeActionResponse, TriageServer,
};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("server: {0}")]
    Server(#[from] ServerError),
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("selector: {0}")]
    Select(#[from] SelectError),
    #[error("case base: {0}")]
    CaseBase(#[from] CaseBaseError),
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub adm_name: String,
    pub session_type: SessionType,
    pub max_scenarios: Option<usize>,
    /// Commit cases from scene feedback.
    pub training: bool,
    /// Run only this scenario.
    pub scenario: Option<String>,
    /// Replaces the server's alignment target.
    pub target: Option<AlignmentTarget>,
    pub dump: Option<PathBuf>,
}

/// Outcome of a finished session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub scenarios: usize,
    pub decisions: usize,
    pub cases_committed: usize,
    pub alignment: Option<SessionAlignment>,
}

pub struct Session<S: TriageServer> {
    server: S,
    analyzer: Box<dyn DecisionAnalyzer>,
    selector: Box<dyn DecisionSelector>,
    case_base: CaseBase,
    trainer: Trainer,
    rng: StdRng,
    options: SessionOptions,
    dump: Option<DumpWriter>,
    pending: Vec<Case>,
}

impl<S: TriageServer> Session<S> {
    pub fn new(
        server: S,
        analyzer: Box<dyn DecisionAnalyzer>,
        selector: Box<dyn DecisionSelector>,
        case_base: CaseBase,
        rng: StdRng,
        options: SessionOptions,
    ) -> Result<Self, DriverError> {
        let dump = options.dump.as_ref().map(DumpWriter::create).transpose()?;
        Ok(Self {
            server,
            analyzer,
            selector,
            case_base,
            trainer: Trainer::new(),
            rng,
            options,
            dump,
            pending: Vec::new(),
        })
    }

    pub const fn case_base(&self) -> &CaseBase {
        &self.case_base
    }

    pub const fn server(&self) -> &S {
        &self.server
    }

    /// Play scenarios until the server reports the session complete.
    pub fn run(&mut self) -> Result<SessionReport, DriverError> {
        let request = SessionRequest {
            adm_name: self.options.adm_name.clone(),
            session_type: self.options.session_type,
            max_scenarios: self.options.max_scenarios,
            kdma_training: self.options.training,
        };
        let session_id = self.server.start_session(&request)?;
        let committed_before = self.case_base.len();
        let mut report = SessionReport { session_id: session_id.clone(), ..SessionReport::default() };
        let mut last_target = self.options.target.clone();

        loop {
            let scenario = self
                .server
                .start_scenario(&session_id, self.options.scenario.as_deref())?;
            if scenario.session_complete {
                break;
            }
            let target = match &self.options.target {
                Some(target) => Some(target.clone()),
                None => self.server.get_alignment_target(&session_id, &scenario.id)?,
            };
            info!(
                scenario = %scenario.id,
                target = target.as_ref().map_or("none", |t| t.id.as_str()),
                "Scenario started"
            );
            report.decisions += self.run_scenario(&session_id, &scenario, target.as_ref())?;
            report.scenarios += 1;
            if target.is_some() {
                last_target = target;
            }
        }

        if let Some(target) = last_target {
            match self.server.get_session_alignment(&session_id, &target.id) {
                Ok(alignment) => {
                    info!(target = %alignment.target_id, score = alignment.score, "Session alignment");
                    report.alignment = Some(alignment);
                }
                Err(e) => warn!(error = %e, "Session alignment unavailable"),
            }
        }
        report.cases_committed = self.case_base.len() - committed_before;
        info!(
            session = %report.session_id,
            scenarios = report.scenarios,
            decisions = report.decisions,
            cases = report.cases_committed,
            "Session complete"
        );
        Ok(report)
    }

    /// Play one scenario; returns the number of decisions made.
    fn run_scenario(
        &mut self,
        session_id: &str,
        scenario: &ScenarioDescriptor,
        target: Option<&AlignmentTarget>,
    ) -> Result<usize, DriverError> {
        let mut state = scenario.state.clone();
        let mut decisions = 0usize;

        while !state.scenario_complete {
            let actions = self.server.get_available_actions(session_id, &scenario.id)?;
            if actions.is_empty() {
                warn!(scenario = %scenario.id, "No actions on offer, ending scenario");
                break;
            }
            let internal = state.to_internal();
            let grounded = ground_actions(&actions, &internal)?;
            if grounded.decisions.is_empty() {
                warn!(scenario = %scenario.id, "No action could be grounded, ending scenario");
                break;
            }

            let mut probe = Probe {
                id: format!("{}.{}", scenario.id, decisions + 1),
                scene: state.scene_id.clone().unwrap_or_else(|| scenario.id.clone()),
                prompt: internal.unstructured.clone(),
                state: internal,
                decisions: grounded.decisions,
            };
            info!(scenario = %scenario.id, probe = %probe.id, candidates = probe.decisions.len(), "Probe received");
            self.analyze(&mut probe);

            let selection = self
                .selector
                .select(&probe, target, self.case_base.cases(), &mut self.rng)?;
            let chosen = &probe.decisions[selection.decision_index];
            info!(
                probe = %probe.id,
                action = %chosen.action,
                distance = selection.distance,
                selector = self.selector.name(),
                "Action chosen"
            );
            if let Some(dump) = self.dump.as_mut() {
                dump.write(&DecisionRecord {
                    dumped_at: chrono::Utc::now(),
                    scenario: scenario.id.clone(),
                    probe: probe.clone(),
                    candidates: selection.candidates.clone(),
                    chosen: chosen.id.clone(),
                    distance: selection.distance,
                })?;
            }

            let wire = ExternalAction::from_action(&grounded.origins[selection.decision_index], &chosen.action);
            if self.options.training {
                self.pending.push(selection.case);
            }
            let response = self.server.take_action(session_id, &wire)?;
            decisions += 1;
            if let Some(feedback) = response.feedback.as_ref() {
                self.absorb_feedback(feedback)?;
            }
            state = response.state;
        }

        if !self.pending.is_empty() {
            debug!(scenario = %scenario.id, dropped = self.pending.len(), "Discarding cases without feedback");
            self.pending.clear();
        }
        Ok(decisions)
    }

    fn analyze(&mut self, probe: &mut Probe) {
        if let Err(e) = self.analyzer.analyze(probe, &mut self.rng) {
            warn!(probe = %probe.id, analyzer = self.analyzer.name(), error = %e, "Analysis failed, continuing without metrics");
        }
    }

    fn absorb_feedback(&mut self, feedback: &AlignmentFeedback) -> Result<(), DriverError> {
        debug!(scene = %feedback.scene, score = feedback.alignment_score, "Feedback received");
        if !self.options.training {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        match self.trainer.train(feedback, pending, &mut self.case_base) {
            Ok(_) => Ok(()),
            Err(TrainerError::CaseBase(e)) => Err(e.into()),
            Err(e) => {
                warn!(scene = %feedback.scene, error = %e, "Feedback not attributed, dropping scene cases");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MonteCarloAnalyzer;
    use crate::config::{EstimatorConfig, SimulationConfig, WeightSettings};
    use crate::selector::{KdmaEstimationSelector, RandomSelector};
    use rand::SeedableRng;
    use server::{ProbeSpec, ScenarioSpec, SceneSpec};
    use std::collections::BTreeMap;

    fn action(id: &str, kind: &str, casualty: Option<&str>, risk: f64) -> ExternalAction {
        ExternalAction {
            action_id: id.into(),
            action_type: Some(kind.into()),
            casualty_id: casualty.map(str::to_string),
            kdma_association: BTreeMap::from([("risk".to_string(), risk)]),
            ..ExternalAction::default()
        }
    }

    fn file() -> ScenarioFile {
        let state: ExternalState = serde_json::from_str(
            r#"{"casualties": [{"id": "p1", "injuries": [{"name": "Laceration", "location": "left forearm"}]}],
                "supplies": [{"type": "Pressure bandage", "quantity": 2}]}"#,
        )
        .unwrap();
        let probe = |id: &str| ProbeSpec {
            id: id.into(),
            state: None,
            actions: vec![
                action("check", "CHECK_PULSE", Some("p1"), 0.9),
                action("search", "SEARCH", None, 0.1),
            ],
        };
        ScenarioFile {
            target: Some(AlignmentTarget::scalar("low-risk", &[("risk", 0.0)])),
            scenarios: vec![ScenarioSpec {
                id: "s1".into(),
                state,
                target: None,
                scenes: vec![
                    SceneSpec { id: "A".into(), probes: vec![probe("a1"), probe("a2")] },
                    SceneSpec { id: "B".into(), probes: vec![probe("b1")] },
                ],
            }],
        }
    }

    fn simulation() -> SimulationConfig {
        SimulationConfig { rollouts: 20, ..SimulationConfig::default() }
    }

    #[test]
    fn test_training_session_commits_attributed_cases() {
        let server = LocalServer::new(file(), &simulation());
        let options = SessionOptions {
            adm_name: "test".into(),
            session_type: SessionType::Train,
            training: true,
            ..SessionOptions::default()
        };
        let mut session = Session::new(
            server,
            Box::new(MonteCarloAnalyzer::new(simulation())),
            Box::new(RandomSelector),
            CaseBase::in_memory(),
            StdRng::seed_from_u64(7),
            options,
        )
        .unwrap();
        let report = session.run().unwrap();
        assert_eq!(report.scenarios, 1);
        assert_eq!(report.decisions, 3);
        assert_eq!(report.cases_committed, 3);
        assert!(session.case_base().cases().iter().all(|c| c.kdmas.contains_key("risk")));
        assert!(report.alignment.is_some());
    }

    #[test]
    fn test_learned_cases_steer_estimation_selector() {
        let mut base = CaseBase::in_memory();
        for (kind, risk) in [("CHECK_PULSE", 0.9), ("SEARCH", 0.1)] {
            let state = file().scenarios[0].state.to_internal();
            let grounded = ground_actions(&[action("x", kind, Some("p1"), risk)], &state).unwrap();
            let probe = Probe {
                id: "old".into(),
                scene: "old".into(),
                prompt: String::new(),
                state,
                decisions: grounded.decisions,
            };
            let mut case = Case::from_decision(&probe, &probe.decisions[0]);
            case.kdmas.insert("risk".into(), risk);
            base.commit(case).unwrap();
        }

        let mut session = Session::new(
            LocalServer::new(file(), &simulation()),
            Box::new(MonteCarloAnalyzer::new(simulation())),
            Box::new(KdmaEstimationSelector::new(WeightSettings::uniform(), EstimatorConfig::default())),
            base,
            StdRng::seed_from_u64(3),
            SessionOptions { adm_name: "test".into(), ..SessionOptions::default() },
        )
        .unwrap();
        let report = session.run().unwrap();
        assert_eq!(report.cases_committed, 0);
        let alignment = report.alignment.unwrap();
        assert!((alignment.kdma_values["risk"] - 0.1).abs() < 1e-12);
    }
}
