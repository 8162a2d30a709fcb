//! Config Validation Tests
//!
//! Typo detection and range validation for `adm_config.toml`, exercised
//! independently from the rest of the decision maker.

use std::io::Write;

use triage_adm::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use triage_adm::config::{AdmConfig, ConfigError, EstimatorVariant, WeightSettings};
use triage_adm::types::CaseType;

// ============================================================================
// Typo Detection Tests
// ============================================================================

#[test]
fn typo_in_rollouts_warns_with_suggestion() {
    let toml_str = r#"
[simulation]
rolouts = 200
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("rolouts"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("simulation.rollouts"));
}

#[test]
fn typo_in_estimator_section_warns() {
    let toml_str = r#"
[estimator]
neighbour_count = 6
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("estimator.neighbor_count"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[simulation]
rollouts = 300
max_depth = 3
use_failure_chance = true
aid_delay_secs = 600.0

[estimator]
neighbor_count = 6
missing_estimate_penalty = 50.0
variant = "misaligned"
weight_file = "weights.json"
print_neighbors = true

[case_base]
path = "data/cases.jsonl"
continue_existing = false

[session]
adm_name = "triage-adm-eval"
seed = 42
max_scenarios = 3
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(
        warnings.is_empty(),
        "Valid config should produce 0 warnings, got: {:?}",
        warnings.iter().map(|w| &w.field).collect::<Vec<_>>()
    );
    let config: AdmConfig = toml::from_str(toml_str).expect("should parse");
    assert_eq!(config.estimator.variant, EstimatorVariant::Misaligned);
    assert_eq!(config.session.seed, Some(42));
    assert!(config.validate().is_ok());
}

#[test]
fn unknown_section_warns() {
    let toml_str = r#"
[visualization]
enabled = true
"#;
    let warnings = validate_unknown_keys(toml_str);
    let fields: Vec<&str> = warnings.iter().map(|w| w.field.as_str()).collect();
    assert!(fields.contains(&"visualization"));
    assert!(fields.contains(&"visualization.enabled"));
}

#[test]
fn empty_toml_produces_zero_warnings() {
    assert!(validate_unknown_keys("").is_empty());
}

#[test]
fn known_keys_cover_every_section() {
    let keys = known_config_keys();
    for section in ["simulation", "estimator", "case_base", "session"] {
        assert!(keys.contains(section), "missing section {section}");
    }
    assert!(keys.contains("estimator.missing_estimate_penalty"));
}

#[test]
fn suggest_correction_returns_none_for_garbage() {
    let keys = known_config_keys();
    assert_eq!(suggest_correction("zzzzzzzzzzzzzzzzzzzz", &keys), None);
}

// ============================================================================
// Range Validation Tests
// ============================================================================

#[test]
fn all_defaults_pass_validation() {
    let config = AdmConfig::default();
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty(), "Default config should have 0 range errors: {errors:?}");
    assert!(warnings.is_empty());
    assert!(config.validate().is_ok(), "Default config must always pass full validation");
}

#[test]
fn zero_rollouts_is_error() {
    let mut config = AdmConfig::default();
    config.simulation.rollouts = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn zero_neighbors_is_error() {
    let mut config = AdmConfig::default();
    config.estimator.neighbor_count = 0;
    assert!(config.validate().is_err());
}

#[test]
fn non_finite_penalty_is_error() {
    let mut config = AdmConfig::default();
    config.estimator.missing_estimate_penalty = f64::NAN;
    assert!(config.validate().is_err());
    config.estimator.missing_estimate_penalty = f64::INFINITY;
    assert!(config.validate().is_err());
    config.estimator.missing_estimate_penalty = -1.0;
    assert!(config.validate().is_err());
}

#[test]
fn negative_aid_delay_is_error() {
    let mut config = AdmConfig::default();
    config.simulation.aid_delay_secs = -5.0;
    let (errors, _) = validate_ranges(&config);
    assert_eq!(errors.len(), 1);
    assert!(config.validate().is_err());
}

#[test]
fn huge_rollouts_is_warning_not_error() {
    let mut config = AdmConfig::default();
    config.simulation.rollouts = 1_000_000;
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert_eq!(warnings[0].field, "simulation.rollouts");
    assert!(config.validate().is_ok());
}

#[test]
fn validation_error_lists_every_problem() {
    let mut config = AdmConfig::default();
    config.simulation.rollouts = 0;
    config.simulation.max_depth = 0;
    let Err(ConfigError::Validation(errors)) = config.validate() else {
        panic!("expected validation errors");
    };
    assert_eq!(errors.len(), 2);
    let rendered = ConfigError::Validation(errors).to_string();
    assert!(rendered.contains("simulation.rollouts"));
    assert!(rendered.contains("simulation.max_depth"));
}

// ============================================================================
// Roundtrip & File Loading
// ============================================================================

#[test]
fn config_roundtrip_preserves_values() {
    let mut original = AdmConfig::default();
    original.simulation.rollouts = 123;
    original.estimator.variant = EstimatorVariant::Baseline;
    original.session.adm_name = "Roundtrip-Test".to_string();

    let toml_str = original.to_toml().expect("Serialization should work");
    let roundtripped: AdmConfig = toml::from_str(&toml_str).expect("Deserialization should work");
    assert_eq!(roundtripped, original);
    assert!(roundtripped.validate().is_ok());
}

#[test]
fn partial_file_falls_back_to_defaults() {
    let config: AdmConfig = toml::from_str("[simulation]\nrollouts = 50\n").expect("should parse");
    assert_eq!(config.simulation.rollouts, 50);
    assert_eq!(config.simulation.max_depth, AdmConfig::default().simulation.max_depth);
    assert_eq!(config.estimator, AdmConfig::default().estimator);
}

#[test]
fn load_from_file_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[estimator]\nneighbor_count = 0").unwrap();
    assert!(matches!(
        AdmConfig::load_from_file(file.path()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn load_from_file_reports_parse_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[simulation\nrollouts = ").unwrap();
    assert!(matches!(AdmConfig::load_from_file(file.path()), Err(ConfigError::Parse(..))));
}

#[test]
fn save_then_load_roundtrips() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("adm_config.toml");
    let mut config = AdmConfig::default();
    config.estimator.neighbor_count = 7;
    config.save_to_file(&path).unwrap();
    assert_eq!(AdmConfig::load_from_file(&path).unwrap(), config);
}

// ============================================================================
// Weight File
// ============================================================================

#[test]
fn weight_file_composition_overlays_in_order() {
    let settings = WeightSettings::from_json(
        r#"{
            "default": 0.5,
            "standard_weights": {"age": 2.0, "tagged": 1.0},
            "activity_weights": {"treating": {"age": 3.0}},
            "kdma_specific_weights": {"risk": {"tagged": 0.0}}
        }"#,
    )
    .unwrap();
    let weights = settings.compose(&[CaseType::Treating], "risk");
    assert_eq!(weights.get("age"), Some(&3.0));
    assert_eq!(weights.get("tagged"), Some(&0.0));
}

#[test]
fn missing_weight_file_falls_back_to_uniform() {
    let settings = WeightSettings::load_or_uniform(Some(std::path::Path::new("/nonexistent/weights.json")));
    assert_eq!(settings, WeightSettings::uniform());
}
