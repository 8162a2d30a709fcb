//! Scenario Regression Tests
//!
//! End-to-end decision scenarios played through the local server: a probe is
//! analyzed, the KDMA estimation selector picks against a target using cases
//! learned on a similar earlier scene, and the server executes the choice.
//! Asserts on the chosen action, its simulated consequences and the metrics
//! recorded in the decision dump.

use std::collections::BTreeMap;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;

use triage_adm::analyzer::metrics::{P_DEATH, SUPPLIES_USED};
use triage_adm::analyzer::{DecisionAnalyzer, MonteCarloAnalyzer};
use triage_adm::config::{EstimatorConfig, SimulationConfig, WeightSettings};
use triage_adm::driver::server::{ProbeSpec, ScenarioSpec, SceneSpec};
use triage_adm::driver::{
    ground_actions, ExternalAction, ExternalState, LocalServer, ScenarioFile, Session, SessionOptions,
    TriageServer,
};
use triage_adm::kdma::Case;
use triage_adm::selector::{DecisionSelector, KdmaEstimationSelector};
use triage_adm::storage::{CaseBase, DecisionRecord};
use triage_adm::types::{Action, AlignmentFeedback, AlignmentTarget, KdmaValues, Probe, TriageTag};
use triage_adm::{MedicalSimulator, Trainer};

// ============================================================================
// Helpers
// ============================================================================

fn state(json: &str) -> ExternalState {
    serde_json::from_str(json).expect("valid scenario state")
}

fn treat(id: &str, casualty: &str, supply: &str, location: &str) -> ExternalAction {
    ExternalAction {
        action_id: id.into(),
        action_type: Some("APPLY_TREATMENT".into()),
        casualty_id: Some(casualty.into()),
        parameters: BTreeMap::from([
            ("treatment".to_string(), supply.to_string()),
            ("location".to_string(), location.to_string()),
        ]),
        ..ExternalAction::default()
    }
}

fn tag(id: &str, casualty: &str, category: TriageTag) -> ExternalAction {
    ExternalAction {
        action_id: id.into(),
        action_type: Some("TAG_CHARACTER".into()),
        casualty_id: Some(casualty.into()),
        parameters: BTreeMap::from([("category".to_string(), category.name().to_string())]),
        ..ExternalAction::default()
    }
}

fn simple(id: &str, kind: &str, casualty: Option<&str>) -> ExternalAction {
    ExternalAction {
        action_id: id.into(),
        action_type: Some(kind.into()),
        casualty_id: casualty.map(str::to_string),
        ..ExternalAction::default()
    }
}

/// Cases for `actions` on an earlier scene, each labelled with its KDMA value.
fn learned_cases(scene: &ExternalState, kdma: &str, actions: &[(ExternalAction, f64)]) -> Vec<Case> {
    let state = scene.to_internal();
    actions
        .iter()
        .map(|(action, value)| {
            let grounded = ground_actions(std::slice::from_ref(action), &state).expect("groundable");
            let probe = Probe {
                id: "training".into(),
                scene: "training".into(),
                prompt: String::new(),
                state: state.clone(),
                decisions: grounded.decisions,
            };
            let mut case = Case::from_decision(&probe, &probe.decisions[0]);
            case.kdmas.insert(kdma.to_string(), *value);
            case
        })
        .collect()
}

fn single_probe_file(initial: ExternalState, actions: Vec<ExternalAction>, target: AlignmentTarget) -> ScenarioFile {
    ScenarioFile {
        target: Some(target),
        scenarios: vec![ScenarioSpec {
            id: "scenario".into(),
            state: initial,
            target: None,
            scenes: vec![SceneSpec {
                id: "scene".into(),
                probes: vec![ProbeSpec { id: "probe".into(), state: None, actions }],
            }],
        }],
    }
}

fn simulation() -> SimulationConfig {
    SimulationConfig { rollouts: 50, ..SimulationConfig::default() }
}

/// Play `file` once with the estimation selector over `cases`, dumping to `dump`.
fn play(file: ScenarioFile, cases: Vec<Case>, dump: &Path, seed: u64) -> (Session<LocalServer>, String) {
    let options = SessionOptions {
        adm_name: "regression".into(),
        dump: Some(dump.to_path_buf()),
        ..SessionOptions::default()
    };
    let mut session = Session::new(
        LocalServer::new(file, &simulation()),
        Box::new(MonteCarloAnalyzer::new(simulation())),
        Box::new(KdmaEstimationSelector::new(WeightSettings::uniform(), EstimatorConfig::default())),
        CaseBase::from_cases(cases),
        StdRng::seed_from_u64(seed),
        options,
    )
    .expect("session starts");
    let report = session.run().expect("session runs");
    assert_eq!(report.decisions, 1);
    (session, report.session_id)
}

fn dumped(path: &Path) -> Vec<DecisionRecord> {
    std::fs::read_to_string(path)
        .expect("dump written")
        .lines()
        .map(|l| serde_json::from_str(l).expect("valid record"))
        .collect()
}

// ============================================================================
// Single amputation
// ============================================================================

const AMPUTATION: &str = r#"{
    "casualties": [{"id": "p1", "injuries": [{"name": "Amputation", "location": "right calf"}],
                    "vitals": {"conscious": true, "mental_status": "AGONY", "hrpmin": 130}}],
    "supplies": [{"type": "Tourniquet", "quantity": 1}],
    "aid_delay": 300
}"#;

#[test]
fn amputation_is_treated_for_risk_averse_target() {
    let earlier = state(&AMPUTATION.replace("\"p1\"", "\"t1\""));
    let cases = learned_cases(
        &earlier,
        "risk_aversion",
        &[
            (treat("x", "t1", "Tourniquet", "right calf"), 0.0),
            (simple("x", "CHECK_PULSE", Some("t1")), 1.0),
            (simple("x", "END_SCENE", None), 1.0),
        ],
    );
    let actions = vec![
        treat("treat", "p1", "Tourniquet", "right calf"),
        simple("pulse", "CHECK_PULSE", Some("p1")),
        simple("end", "END_SCENE", None),
    ];
    let target = AlignmentTarget::scalar("risk-averse", &[("risk_aversion", 0.0)]);
    let dir = tempfile::TempDir::new().unwrap();
    let dump = dir.path().join("decisions.jsonl");

    let (session, session_id) = play(single_probe_file(state(AMPUTATION), actions, target), cases, &dump, 11);

    let records = dumped(&dump);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].chosen, "treat");

    let after = session.server().get_scenario_state(&session_id, "scenario").unwrap();
    let p1 = after.casualties.iter().find(|c| c.id == "p1").unwrap();
    assert!(p1.injuries[0].treated, "amputation should be treated");
    let tourniquets: u32 = after.supplies.iter().filter(|s| s.kind == "Tourniquet").map(|s| s.quantity).sum();
    assert_eq!(tourniquets, 0);

    let decisions = &records[0].probe.decisions;
    let p_death = |id: &str| decisions.iter().find(|d| d.id == id).and_then(|d| d.scalar_metric(P_DEATH)).unwrap();
    assert!(p_death("treat") < p_death("end"));
}

// ============================================================================
// Two lacerations, one bandage
// ============================================================================

const LACERATIONS: &str = r#"{
    "casualties": [
        {"id": "p1", "injuries": [{"name": "Laceration", "location": "left forearm"}],
         "vitals": {"conscious": false, "heart_rate": "FAINT", "mental_status": "UNRESPONSIVE", "avpu": "UNRESPONSIVE"}},
        {"id": "p2", "injuries": [{"name": "Laceration", "location": "right forearm"}],
         "vitals": {"conscious": true, "heart_rate": "NORMAL", "mental_status": "CALM", "avpu": "ALERT"}}
    ],
    "supplies": [{"type": "Pressure bandage", "quantity": 1}]
}"#;

#[test]
fn unresponsive_casualty_gets_the_only_bandage() {
    let earlier = state(&LACERATIONS.replace("\"p1\"", "\"t1\"").replace("\"p2\"", "\"t2\""));
    let cases = learned_cases(
        &earlier,
        "moral_desert",
        &[
            (treat("x", "t1", "Pressure bandage", "left forearm"), 0.8),
            (treat("x", "t2", "Pressure bandage", "right forearm"), 0.2),
            (simple("x", "END_SCENE", None), 0.5),
        ],
    );
    let actions = vec![
        treat("treat-p1", "p1", "Pressure bandage", "left forearm"),
        treat("treat-p2", "p2", "Pressure bandage", "right forearm"),
        simple("end", "END_SCENE", None),
    ];
    let target = AlignmentTarget::scalar("desert", &[("moral_desert", 0.8)]);
    let dir = tempfile::TempDir::new().unwrap();
    let dump = dir.path().join("decisions.jsonl");

    play(single_probe_file(state(LACERATIONS), actions, target), cases, &dump, 5);

    let record = &dumped(&dump)[0];
    assert_eq!(record.chosen, "treat-p1");
    let chosen = record.probe.decisions.iter().find(|d| d.id == "treat-p1").unwrap();
    assert_eq!(chosen.scalar_metric(SUPPLIES_USED), Some(1.0));

    let before = &record.probe.state;
    let after = MedicalSimulator::default().apply(before, &chosen.action, true);
    let dps = |s: &triage_adm::TriageState| s.casualty("p1").map(|c| c.damage_per_second()).unwrap();
    assert!(dps(&after) < dps(before));
}

// ============================================================================
// Tagging four casualties
// ============================================================================

const FOUR_CASUALTIES: &str = r#"{
    "casualties": [
        {"id": "p1", "injuries": [{"name": "Forehead Scrape", "location": "head"}],
         "vitals": {"conscious": true, "mental_status": "CALM", "hrpmin": 70}},
        {"id": "p2", "injuries": [{"name": "Amputation", "location": "left calf", "severity": "extreme"},
                                  {"name": "Shrapnel", "location": "left thigh"}],
         "vitals": {"conscious": false, "mental_status": "UNRESPONSIVE", "hrpmin": 150}},
        {"id": "p3", "injuries": [{"name": "Laceration", "location": "right bicep"}],
         "vitals": {"conscious": true, "mental_status": "AGONY", "hrpmin": 110}},
        {"id": "p4", "injuries": [{"name": "Broken Bone", "location": "right leg"}],
         "vitals": {"conscious": true, "mental_status": "UPSET", "hrpmin": 95}}
    ],
    "supplies": []
}"#;

fn rename(json: &str, from: &str, to: &str) -> String {
    json.replace(&format!("\"{from}\""), &format!("\"{to}\""))
}

#[test]
fn severest_casualty_is_tagged_immediate_for_qol_target() {
    let live = state(FOUR_CASUALTIES);
    let severest = live
        .to_internal()
        .casualties
        .iter()
        .max_by(|a, b| a.severity().total_cmp(&b.severity()))
        .map(|c| c.id.clone())
        .unwrap();
    assert_eq!(severest, "p2");

    let mut earlier_json = FOUR_CASUALTIES.to_string();
    for n in 1..=4 {
        earlier_json = rename(&earlier_json, &format!("p{n}"), &format!("t{n}"));
    }
    let earlier = state(&earlier_json);

    let mut labelled = Vec::new();
    let mut actions = Vec::new();
    for n in 1..=4 {
        for category in TriageTag::ALL.iter().copied() {
            let value = if n == 2 && category == TriageTag::Immediate { 1.0 } else { 0.0 };
            labelled.push((tag("x", &format!("t{n}"), category), value));
            actions.push(tag(&format!("tag-p{n}-{}", category.name()), &format!("p{n}"), category));
        }
    }
    let cases = learned_cases(&earlier, "qol", &labelled);
    let target = AlignmentTarget::scalar("qol-high", &[("qol", 1.0)]);
    let dir = tempfile::TempDir::new().unwrap();
    let dump = dir.path().join("decisions.jsonl");

    play(single_probe_file(live, actions, target), cases, &dump, 3);

    let record = &dumped(&dump)[0];
    assert_eq!(record.chosen, "tag-p2-IMMEDIATE");
    let chosen = record.probe.decisions.iter().find(|d| d.id == record.chosen).unwrap();
    assert_eq!(
        chosen.action,
        Action::TagCharacter { casualty: severest, tag: TriageTag::Immediate }
    );
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn same_seed_gives_identical_outcome_estimates() {
    let internal = state(AMPUTATION).to_internal();
    let grounded = ground_actions(
        &[
            treat("treat", "p1", "Tourniquet", "right calf"),
            simple("pulse", "CHECK_PULSE", Some("p1")),
            simple("end", "END_SCENE", None),
        ],
        &internal,
    )
    .unwrap();
    let run = || {
        let mut probe = Probe {
            id: "probe".into(),
            scene: "scene".into(),
            prompt: String::new(),
            state: internal.clone(),
            decisions: grounded.decisions.clone(),
        };
        let config = SimulationConfig { rollouts: 500, ..SimulationConfig::default() };
        MonteCarloAnalyzer::new(config).analyze(&mut probe, &mut StdRng::seed_from_u64(2024)).unwrap();
        probe.decisions.iter().map(|d| d.scalar_metric(P_DEATH).unwrap()).collect::<Vec<_>>()
    };
    let first = run();
    let second = run();
    assert_eq!(first.len(), 3);
    for (a, b) in first.iter().zip(&second) {
        assert!((a - b).abs() <= f64::EPSILON, "P_DEATH differs: {a} vs {b}");
    }
}

// ============================================================================
// Trainer attribution against an on-disk case base
// ============================================================================

fn scene_feedback(scene: &str, risk: f64, sources: &[&str]) -> AlignmentFeedback {
    AlignmentFeedback {
        target_name: "risk-target".into(),
        kdma_values: KdmaValues::from([("risk".to_string(), risk)]),
        alignment_score: 0.0,
        source_probes: sources.iter().map(|s| (*s).to_string()).collect(),
        is_final: false,
        scene_end: true,
        scene: scene.into(),
    }
}

#[test]
fn trainer_attributes_running_mean_feedback_per_scene() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cases.jsonl");
    let mut base = CaseBase::open(&path, false).unwrap();
    let mut trainer = Trainer::new();
    let pending = |scene: &str, n: usize| -> Vec<Case> {
        (0..n).map(|i| Case { scene: scene.into(), decision_id: format!("{scene}-{i}"), ..Case::default() }).collect()
    };

    trainer.train(&scene_feedback("A", 0.6, &["A"]), pending("A", 3), &mut base).unwrap();
    trainer.train(&scene_feedback("B", 0.4, &["A", "B"]), pending("B", 2), &mut base).unwrap();

    let reopened = CaseBase::open(&path, true).unwrap();
    assert_eq!(reopened.len(), 5);
    for case in reopened.cases() {
        let expected = if case.scene == "A" { 0.6 } else { 0.2 };
        assert!((case.kdmas["risk"] - expected).abs() < 1e-12, "{}: {:?}", case.decision_id, case.kdmas);
    }
}

// ============================================================================
// End of scenario
// ============================================================================

#[test]
fn lone_end_scenario_is_returned_without_estimates() {
    let internal = state(AMPUTATION).to_internal();
    let grounded = ground_actions(&[simple("end", "END_SCENARIO", None)], &internal).unwrap();
    let probe = Probe {
        id: "probe".into(),
        scene: "scene".into(),
        prompt: String::new(),
        state: internal,
        decisions: grounded.decisions,
    };
    let cases = learned_cases(&state(AMPUTATION), "risk", &[(simple("x", "END_SCENE", None), 0.3)]);
    let target = AlignmentTarget::scalar("t", &[("risk", 0.9)]);
    let mut selector = KdmaEstimationSelector::new(WeightSettings::uniform(), EstimatorConfig::default());
    let selection = selector
        .select(&probe, Some(&target), &cases, &mut StdRng::seed_from_u64(0))
        .unwrap();
    assert_eq!(selection.decision_index, 0);
    assert_eq!(selection.distance, 0.0);
    assert!(selection.case.estimates.is_empty());
    assert_eq!(probe.decisions[0].action, Action::EndScenario);
}
