//! Evaluation server contract and the file-backed local server
//!
//! [`TriageServer`] is the seam between the session loop and whatever hosts
//! the scenarios. [`LocalServer`] plays scenarios from a JSON file so that a
//! full session (including training feedback) runs offline.
//!
//! ## Scenario file
//!
//! ```json
//! {
//!   "target": { "id": "...", "kdma_names": [...], "values": {...} },
//!   "scenarios": [{
//!     "id": "s1",
//!     "state": { "casualties": [...], "supplies": [...] },
//!     "scenes": [{
//!       "id": "scene-a",
//!       "probes": [{ "id": "p1", "actions": [{ "action_id": "a1", ... }] }]
//!     }]
//!   }]
//! }
//! ```
//!
//! A probe may carry its own `state`, which replaces the simulated one when
//! the probe comes up. Otherwise the state evolves by simulating each chosen
//! action.
//!
//! ## Feedback
//!
//! In training sessions, the end of each scene produces feedback: for every
//! KDMA, the mean over the scenario's finished scenes of each scene's mean
//! association among the chosen actions. The alignment score is
//! `1 - mean |target - observed|`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::medsim::MedicalSimulator;
use crate::types::{Action, ActionKind, AlignmentFeedback, AlignmentTarget, KdmaValues, TriageState};

use super::external::{ground_actions, ExternalAction, ExternalState, ProtocolError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to read scenario file {0}: {1}")]
    Io(PathBuf, String),
    #[error("failed to parse scenario file {0}: {1}")]
    Parse(PathBuf, String),
    #[error("unknown session '{0}'")]
    UnknownSession(String),
    #[error("no scenario is running")]
    NoActiveScenario,
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    #[default]
    Test,
    Eval,
    Train,
}

impl std::str::FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "test" => Ok(SessionType::Test),
            "eval" => Ok(SessionType::Eval),
            "train" => Ok(SessionType::Train),
            other => Err(format!("unknown session type '{other}' (expected test, eval or train)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRequest {
    pub adm_name: String,
    pub session_type: SessionType,
    pub max_scenarios: Option<usize>,
    pub kdma_training: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDescriptor {
    pub id: String,
    pub state: ExternalState,
    pub session_complete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TakeActionResponse {
    pub state: ExternalState,
    pub feedback: Option<AlignmentFeedback>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAlignment {
    pub target_id: String,
    pub score: f64,
    pub kdma_values: KdmaValues,
}

/// Operations the session loop needs from an evaluation server.
pub trait TriageServer {
    fn start_session(&mut self, request: &SessionRequest) -> Result<String, ServerError>;

    /// Start the next scenario, or a named one. Returns `session_complete` once
    /// the session has run out of scenarios.
    fn start_scenario(&mut self, session_id: &str, scenario_id: Option<&str>) -> Result<ScenarioDescriptor, ServerError>;

    fn get_scenario_state(&self, session_id: &str, scenario_id: &str) -> Result<ExternalState, ServerError>;

    fn get_available_actions(&self, session_id: &str, scenario_id: &str) -> Result<Vec<ExternalAction>, ServerError>;

    fn get_alignment_target(&self, session_id: &str, scenario_id: &str) -> Result<Option<AlignmentTarget>, ServerError>;

    fn take_action(&mut self, session_id: &str, action: &ExternalAction) -> Result<TakeActionResponse, ServerError>;

    fn get_session_alignment(&self, session_id: &str, target_id: &str) -> Result<SessionAlignment, ServerError>;
}

// ============================================================================
// Scenario file
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub target: Option<AlignmentTarget>,
    pub scenarios: Vec<ScenarioSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub id: String,
    #[serde(default)]
    pub state: ExternalState,
    #[serde(default)]
    pub target: Option<AlignmentTarget>,
    pub scenes: Vec<SceneSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSpec {
    pub id: String,
    pub probes: Vec<ProbeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub id: String,
    #[serde(default)]
    pub state: Option<ExternalState>,
    pub actions: Vec<ExternalAction>,
}

impl ScenarioFile {
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let raw = fs::read_to_string(path).map_err(|e| ServerError::Io(path.to_path_buf(), e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| ServerError::Parse(path.to_path_buf(), e.to_string()))
    }
}

// ============================================================================
// Local server
// ============================================================================

/// Progress through one scenario.
#[derive(Debug)]
struct RunningScenario {
    index: usize,
    scene: usize,
    probe: usize,
    state: TriageState,
    /// Chosen associations of the scene in progress.
    scene_choices: Vec<KdmaValues>,
    /// Mean association of each finished scene, in order.
    finished_scenes: Vec<(String, KdmaValues)>,
    complete: bool,
}

#[derive(Debug)]
struct LocalSession {
    id: String,
    request: SessionRequest,
    started: usize,
    running: Option<RunningScenario>,
    /// Associations of every choice in the session.
    choices: Vec<KdmaValues>,
}

pub struct LocalServer {
    file: ScenarioFile,
    sim: MedicalSimulator,
    session: Option<LocalSession>,
    sessions_started: usize,
}

#[allow(clippy::cast_precision_loss)]
fn mean_values<'a>(values: impl IntoIterator<Item = &'a KdmaValues>) -> KdmaValues {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for map in values {
        for (kdma, value) in map {
            let entry = sums.entry(kdma.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter().map(|(k, (sum, n))| (k, sum / n as f64)).collect()
}

/// `1 - mean |target - observed|` over the target KDMAs that were observed.
pub fn alignment_score(target: &AlignmentTarget, observed: &KdmaValues) -> f64 {
    let gaps: Vec<f64> = target
        .points()
        .into_iter()
        .filter_map(|(kdma, wanted)| observed.get(&kdma).map(|seen| (wanted - seen).abs()))
        .collect();
    if gaps.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = gaps.len() as f64;
    1.0 - gaps.iter().sum::<f64>() / n
}

impl LocalServer {
    pub fn new(file: ScenarioFile, config: &SimulationConfig) -> Self {
        Self { file, sim: MedicalSimulator::from_config(config), session: None, sessions_started: 0 }
    }

    pub fn from_path(path: &Path, config: &SimulationConfig) -> Result<Self, ServerError> {
        let file = ScenarioFile::load(path)?;
        info!(path = %path.display(), scenarios = file.scenarios.len(), "Scenario file loaded");
        Ok(Self::new(file, config))
    }

    fn session(&self, session_id: &str) -> Result<&LocalSession, ServerError> {
        self.session
            .as_ref()
            .filter(|s| s.id == session_id)
            .ok_or_else(|| ServerError::UnknownSession(session_id.to_string()))
    }

    fn session_mut(&mut self, session_id: &str) -> Result<&mut LocalSession, ServerError> {
        self.session
            .as_mut()
            .filter(|s| s.id == session_id)
            .ok_or_else(|| ServerError::UnknownSession(session_id.to_string()))
    }

    fn running(&self, session_id: &str) -> Result<&RunningScenario, ServerError> {
        self.session(session_id)?.running.as_ref().ok_or(ServerError::NoActiveScenario)
    }

    fn probe_spec(&self, running: &RunningScenario) -> Option<&ProbeSpec> {
        self.file.scenarios.get(running.index)?.scenes.get(running.scene)?.probes.get(running.probe)
    }

    fn wire_state(&self, running: &RunningScenario) -> ExternalState {
        let mut state = ExternalState::from_internal(&running.state, running.complete);
        if let Some(scene) = self.file.scenarios.get(running.index).and_then(|s| s.scenes.get(running.scene)) {
            state.scene_id = Some(scene.id.clone());
        }
        state
    }

    /// Apply a probe's explicit state, if it has one.
    fn enter_probe(&self, running: &mut RunningScenario) {
        if let Some(state) = self.probe_spec(running).and_then(|p| p.state.as_ref()) {
            running.state = state.to_internal();
        }
    }

    /// Close the current scene; returns its feedback and whether it was the last.
    fn finish_scene(&self, running: &mut RunningScenario, request: &SessionRequest) -> Option<AlignmentFeedback> {
        let spec = &self.file.scenarios[running.index];
        let scene_id = spec.scenes[running.scene].id.clone();
        let scene_mean = mean_values(&running.scene_choices);
        running.scene_choices.clear();
        running.finished_scenes.push((scene_id.clone(), scene_mean));

        running.scene += 1;
        running.probe = 0;
        let is_final = running.complete || running.scene >= spec.scenes.len();
        running.complete = is_final;
        if !is_final {
            self.enter_probe(running);
        }
        debug!(scene = %scene_id, is_final, "Scene finished");

        let training = request.kdma_training || request.session_type == SessionType::Train;
        if !training {
            return None;
        }
        let kdma_values = mean_values(running.finished_scenes.iter().map(|(_, v)| v));
        let target = spec.target.as_ref().or(self.file.target.as_ref());
        Some(AlignmentFeedback {
            target_name: target.map(|t| t.id.clone()).unwrap_or_default(),
            alignment_score: target.map_or(0.0, |t| alignment_score(t, &kdma_values)),
            kdma_values,
            source_probes: running.finished_scenes.iter().map(|(id, _)| id.clone()).collect(),
            is_final,
            scene_end: true,
            scene: scene_id,
        })
    }

    /// Internal form of a chosen server action, grounded against `state`.
    fn resolve_action(action: &ExternalAction, state: &TriageState) -> Result<Action, ServerError> {
        let grounded = ground_actions(std::slice::from_ref(action), state)?;
        grounded
            .decisions
            .into_iter()
            .next()
            .map(|d| d.action)
            .ok_or_else(|| ServerError::Protocol(ProtocolError::UnknownAction(action.action_id.clone())))
    }
}

impl TriageServer for LocalServer {
    fn start_session(&mut self, request: &SessionRequest) -> Result<String, ServerError> {
        self.sessions_started += 1;
        let id = format!("local-{}", self.sessions_started);
        info!(session = %id, adm = %request.adm_name, session_type = ?request.session_type, "Session started");
        self.session = Some(LocalSession {
            id: id.clone(),
            request: request.clone(),
            started: 0,
            running: None,
            choices: Vec::new(),
        });
        Ok(id)
    }

    fn start_scenario(&mut self, session_id: &str, scenario_id: Option<&str>) -> Result<ScenarioDescriptor, ServerError> {
        let session = self.session(session_id)?;
        let limit = session.request.max_scenarios.unwrap_or(usize::MAX);
        let index = match scenario_id {
            Some(wanted) if session.started == 0 => Some(
                self.file
                    .scenarios
                    .iter()
                    .position(|s| s.id == wanted)
                    .ok_or_else(|| ServerError::UnknownScenario(wanted.to_string()))?,
            ),
            Some(_) => None,
            None => Some(session.started).filter(|i| *i < self.file.scenarios.len()),
        };
        let Some(index) = index.filter(|_| session.started < limit) else {
            return Ok(ScenarioDescriptor {
                id: String::new(),
                state: ExternalState::default(),
                session_complete: true,
            });
        };

        let spec = &self.file.scenarios[index];
        let mut running = RunningScenario {
            index,
            scene: 0,
            probe: 0,
            state: spec.state.to_internal(),
            scene_choices: Vec::new(),
            finished_scenes: Vec::new(),
            complete: spec.scenes.is_empty(),
        };
        self.enter_probe(&mut running);
        let descriptor = ScenarioDescriptor {
            id: spec.id.clone(),
            state: self.wire_state(&running),
            session_complete: false,
        };

        let session = self.session_mut(session_id)?;
        session.started += 1;
        session.running = Some(running);
        Ok(descriptor)
    }

    fn get_scenario_state(&self, session_id: &str, _scenario_id: &str) -> Result<ExternalState, ServerError> {
        Ok(self.wire_state(self.running(session_id)?))
    }

    fn get_available_actions(&self, session_id: &str, _scenario_id: &str) -> Result<Vec<ExternalAction>, ServerError> {
        let running = self.running(session_id)?;
        if running.complete {
            return Ok(Vec::new());
        }
        Ok(self.probe_spec(running).map(|p| p.actions.clone()).unwrap_or_default())
    }

    fn get_alignment_target(&self, session_id: &str, _scenario_id: &str) -> Result<Option<AlignmentTarget>, ServerError> {
        let running = self.running(session_id)?;
        Ok(self.file.scenarios[running.index]
            .target
            .clone()
            .or_else(|| self.file.target.clone()))
    }

    fn take_action(&mut self, session_id: &str, action: &ExternalAction) -> Result<TakeActionResponse, ServerError> {
        let mut session = self.session.take().filter(|s| s.id == session_id);
        let result = match session.as_mut() {
            None => Err(ServerError::UnknownSession(session_id.to_string())),
            Some(session) => self.step(session, action),
        };
        if session.is_some() {
            self.session = session;
        }
        result
    }

    fn get_session_alignment(&self, session_id: &str, target_id: &str) -> Result<SessionAlignment, ServerError> {
        let session = self.session(session_id)?;
        let observed = mean_values(&session.choices);
        let target = self
            .file
            .scenarios
            .iter()
            .filter_map(|s| s.target.as_ref())
            .chain(self.file.target.as_ref())
            .find(|t| t.id == target_id);
        Ok(SessionAlignment {
            target_id: target_id.to_string(),
            score: target.map_or(0.0, |t| alignment_score(t, &observed)),
            kdma_values: observed,
        })
    }
}

impl LocalServer {
    fn step(&self, session: &mut LocalSession, action: &ExternalAction) -> Result<TakeActionResponse, ServerError> {
        let request = session.request.clone();
        let running = session.running.as_mut().ok_or(ServerError::NoActiveScenario)?;
        if running.complete {
            return Err(ServerError::NoActiveScenario);
        }
        let offered = self
            .probe_spec(running)
            .and_then(|p| p.actions.iter().find(|a| a.action_id == action.action_id))
            .ok_or_else(|| ProtocolError::UnknownAction(action.action_id.clone()))?;
        running.scene_choices.push(offered.kdma_association.clone());
        session.choices.push(offered.kdma_association.clone());

        let internal = Self::resolve_action(action, &running.state)?;
        running.state = self.sim.apply(&running.state, &internal, true);
        debug!(action = %internal, time = running.state.time, "Local server applied action");

        let scene_len = self.file.scenarios[running.index].scenes[running.scene].probes.len();
        running.probe += 1;
        let feedback = match internal.kind() {
            ActionKind::EndScenario => {
                running.complete = true;
                self.finish_scene(running, &request)
            }
            ActionKind::EndScene => self.finish_scene(running, &request),
            _ if running.probe >= scene_len => self.finish_scene(running, &request),
            _ => {
                self.enter_probe(running);
                None
            }
        };
        Ok(TakeActionResponse { state: self.wire_state(running), feedback })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(id: &str, kind: &str, risk: f64) -> ExternalAction {
        ExternalAction {
            action_id: id.into(),
            action_type: Some(kind.into()),
            kdma_association: BTreeMap::from([("risk".to_string(), risk)]),
            ..ExternalAction::default()
        }
    }

    fn probe(id: &str) -> ProbeSpec {
        ProbeSpec {
            id: id.into(),
            state: None,
            actions: vec![action("search", "SEARCH", 0.8), action("end", "END_SCENE", 0.2)],
        }
    }

    fn file() -> ScenarioFile {
        ScenarioFile {
            target: Some(AlignmentTarget::scalar("high-risk", &[("risk", 1.0)])),
            scenarios: vec![ScenarioSpec {
                id: "s1".into(),
                state: ExternalState::default(),
                target: None,
                scenes: vec![
                    SceneSpec { id: "A".into(), probes: vec![probe("a1"), probe("a2")] },
                    SceneSpec { id: "B".into(), probes: vec![probe("b1")] },
                ],
            }],
        }
    }

    fn train_request() -> SessionRequest {
        SessionRequest { adm_name: "t".into(), session_type: SessionType::Train, ..SessionRequest::default() }
    }

    #[test]
    fn test_scene_feedback_is_running_mean() {
        let mut server = LocalServer::new(file(), &SimulationConfig::default());
        let session = server.start_session(&train_request()).unwrap();
        let scenario = server.start_scenario(&session, None).unwrap();
        assert!(!scenario.session_complete);

        let first = server.take_action(&session, &action("search", "SEARCH", 0.0)).unwrap();
        assert!(first.feedback.is_none());
        let second = server.take_action(&session, &action("end", "END_SCENE", 0.0)).unwrap();
        let feedback = second.feedback.unwrap();
        assert_eq!(feedback.scene, "A");
        assert!((feedback.kdma_values["risk"] - 0.5).abs() < 1e-12);
        assert!(!feedback.is_final);

        let third = server.take_action(&session, &action("end", "END_SCENE", 0.0)).unwrap();
        let feedback = third.feedback.unwrap();
        assert_eq!(feedback.source_probes, vec!["A".to_string(), "B".to_string()]);
        assert!((feedback.kdma_values["risk"] - 0.35).abs() < 1e-12);
        assert!(feedback.is_final);
        assert!(third.state.scenario_complete);

        assert!(server.start_scenario(&session, None).unwrap().session_complete);
    }

    #[test]
    fn test_no_feedback_outside_training() {
        let mut server = LocalServer::new(file(), &SimulationConfig::default());
        let session = server.start_session(&SessionRequest::default()).unwrap();
        server.start_scenario(&session, None).unwrap();
        let response = server.take_action(&session, &action("end", "END_SCENE", 0.0)).unwrap();
        assert!(response.feedback.is_none());
        assert!(response.state.elapsed_time > 0.0);
    }

    #[test]
    fn test_unoffered_action_is_rejected() {
        let mut server = LocalServer::new(file(), &SimulationConfig::default());
        let session = server.start_session(&SessionRequest::default()).unwrap();
        server.start_scenario(&session, None).unwrap();
        assert!(matches!(
            server.take_action(&session, &action("fly", "SEARCH", 0.0)),
            Err(ServerError::Protocol(ProtocolError::UnknownAction(_)))
        ));
    }

    #[test]
    fn test_session_alignment() {
        let mut server = LocalServer::new(file(), &SimulationConfig::default());
        let session = server.start_session(&train_request()).unwrap();
        server.start_scenario(&session, None).unwrap();
        server.take_action(&session, &action("search", "SEARCH", 0.0)).unwrap();
        let alignment = server.get_session_alignment(&session, "high-risk").unwrap();
        assert!((alignment.score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_max_scenarios_limits_session() {
        let mut server = LocalServer::new(file(), &SimulationConfig::default());
        let request = SessionRequest { max_scenarios: Some(0), ..SessionRequest::default() };
        let session = server.start_session(&request).unwrap();
        assert!(server.start_scenario(&session, None).unwrap().session_complete);
    }
}
