//! Case Base Integration Tests
//!
//! Persistence guarantees of the JSON-lines case base: the file read back in
//! order is always a prefix of the in-memory list, records survive a
//! serialize/parse cycle byte for byte, and damaged files are rejected on load.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use triage_adm::config::WeightSettings;
use triage_adm::kdma::{estimate_kdma, Case, CaseFeatures};
use triage_adm::storage::{CaseBase, CaseBaseError};
use triage_adm::types::{CaseType, MentalStatus, SupplyKind};

fn rich_case(scene: &str, age: u32, risk: f64) -> Case {
    Case {
        index: None,
        scene: scene.into(),
        probe_id: format!("{scene}.1"),
        decision_id: "treat.2".into(),
        features: CaseFeatures {
            age: Some(age),
            tagged: Some(false),
            visited: Some(true),
            conscious: Some(false),
            mental_status: Some(MentalStatus::Unresponsive),
            hrpmin: Some(142),
            injured_count: 2,
            unvisited_count: 1,
            action_name: "APPLY_TREATMENT".into(),
            treatment: Some(SupplyKind::Tourniquet),
            treating: true,
            ..CaseFeatures::default()
        },
        metrics: BTreeMap::from([
            ("P_DEATH".to_string(), 0.125),
            ("CASUALTY_SEVERITY.p1".to_string(), 0.7),
            ("SUPPLIES_USED".to_string(), 1.0),
        ]),
        kdmas: BTreeMap::from([("risk".to_string(), risk)]),
        associations: BTreeMap::from([("risk".to_string(), 0.5)]),
        estimates: BTreeMap::from([("risk".to_string(), 0.41)]),
        neighbors: BTreeMap::from([("risk_neighbor1".to_string(), 0)]),
        distance: Some(0.0361),
    }
}

fn read_lines(path: &std::path::Path) -> Vec<Case> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn file_is_a_prefix_of_memory_after_every_commit() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cases.jsonl");
    let mut base = CaseBase::open(&path, true).unwrap();

    for n in 0..6 {
        base.commit(rich_case(&format!("scene-{}", n / 2), 20 + n, 0.1 * f64::from(n))).unwrap();
        let on_disk = read_lines(&path);
        assert!(on_disk.len() <= base.len());
        assert_eq!(on_disk.as_slice(), &base.cases()[..on_disk.len()]);
        assert_eq!(on_disk.last().and_then(|c| c.index), Some(n as usize));
    }
}

#[test]
fn restart_continues_numbering_and_content() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("runs/cases.jsonl");
    {
        let mut base = CaseBase::open(&path, false).unwrap();
        base.commit(rich_case("a", 30, 0.2)).unwrap();
        base.commit(rich_case("a", 31, 0.3)).unwrap();
    }
    let mut base = CaseBase::open(&path, true).unwrap();
    assert_eq!(base.len(), 2);
    assert_eq!(base.cases()[1].features.age, Some(31));
    assert_eq!(base.commit(rich_case("b", 40, 0.9)).unwrap(), 2);
    assert_eq!(read_lines(&path).len(), 3);
}

/// Attaches metrics computed the way the analyzer produces them, so the
/// values carry full 17-digit mantissas rather than short literals.
fn with_computed_metrics(mut case: Case, rng: &mut StdRng) -> Case {
    for i in 0..24 {
        let value = rng.gen::<f64>() * (f64::from(i) + 1.0).sqrt() / 7.0;
        case.metrics.insert(format!("SEVERITY_CHANGE.p{i}"), value);
    }
    case.metrics.insert("P_DEATH".into(), 1.0 - (1.0 - 0.013_f64).powf(3.7));
    case.distance = Some(rng.gen::<f64>().powi(3));
    case.estimates.insert("risk".into(), rng.gen::<f64>() / 3.0);
    case
}

#[test]
fn serialize_parse_serialize_is_byte_stable() {
    let mut rng = StdRng::seed_from_u64(11);
    for n in 0..20 {
        let mut case = with_computed_metrics(rich_case("a", 44 + n, 0.35), &mut rng);
        case.index = Some(n as usize);
        let first = serde_json::to_string(&case).unwrap();
        let parsed: Case = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string(&parsed).unwrap();
        assert_eq!(first, second);
        assert_eq!(parsed, case);
    }
}

#[test]
fn computed_metrics_survive_commit_and_reload() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cases.jsonl");
    let mut rng = StdRng::seed_from_u64(29);
    let mut base = CaseBase::open(&path, true).unwrap();
    for n in 0..8 {
        let mut case = with_computed_metrics(rich_case("a", 30 + n, 0.2), &mut rng);
        case.metrics.insert("SEVERITY_CHANGE".into(), 0.000_196_423_164_264_120_98 * f64::from(n + 1));
        base.commit(case).unwrap();
    }

    let on_disk = read_lines(&path);
    assert_eq!(on_disk.as_slice(), base.cases());
    let reloaded = CaseBase::open(&path, true).unwrap();
    assert_eq!(reloaded.cases(), base.cases());
}

#[test]
fn index_gap_is_rejected_on_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cases.jsonl");
    let mut file = fs::File::create(&path).unwrap();
    for index in [0, 2] {
        let mut case = rich_case("a", 20, 0.5);
        case.index = Some(index);
        writeln!(file, "{}", serde_json::to_string(&case).unwrap()).unwrap();
    }
    drop(file);

    match CaseBase::open(&path, true) {
        Err(CaseBaseError::Index { expected, found }) => {
            assert_eq!(expected, 1);
            assert_eq!(found, Some(2));
        }
        other => panic!("expected an index error, got {other:?}"),
    }
}

#[test]
fn malformed_line_is_reported_with_its_number() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cases.jsonl");
    let mut case = rich_case("a", 20, 0.5);
    case.index = Some(0);
    fs::write(&path, format!("{}\n\n{{not json\n", serde_json::to_string(&case).unwrap())).unwrap();

    let Err(CaseBaseError::Serialization(message)) = CaseBase::open(&path, true) else {
        panic!("expected a serialization error");
    };
    assert!(message.starts_with("line 3"), "{message}");
}

#[test]
fn fresh_open_discards_previous_cases() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cases.jsonl");
    CaseBase::open(&path, true).unwrap().commit(rich_case("a", 20, 0.5)).unwrap();

    let mut base = CaseBase::open(&path, false).unwrap();
    assert!(base.is_empty());
    assert_eq!(base.commit(rich_case("b", 21, 0.6)).unwrap(), 0);
    let on_disk = read_lines(&path);
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk[0].scene, "b");
}

#[test]
fn stored_case_predicts_its_own_value() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cases.jsonl");
    let mut base = CaseBase::open(&path, true).unwrap();
    base.commit(rich_case("a", 25, 0.83)).unwrap();
    base.commit(rich_case("a", 70, 0.1)).unwrap();
    let base = CaseBase::open(&path, true).unwrap();

    let weights = WeightSettings::uniform().compose(&[CaseType::Treating], "risk");
    let query = base.cases()[0].clone();
    let estimate = estimate_kdma(&query, &weights, "risk", base.cases(), 4, &mut StdRng::seed_from_u64(1), false)
        .expect("neighbours available");
    assert!((estimate.value - 0.83).abs() < 1e-3, "estimate {}", estimate.value);
    assert_eq!(estimate.neighbors.first(), Some(&0));
}
