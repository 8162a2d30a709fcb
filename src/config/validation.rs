//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! The raw TOML is first parsed into `toml::Value` and its key tree compared
//! against the known field names, producing "did you mean?" warnings. Serde
//! deserialization then proceeds as normal; warnings never reject a file.

use std::collections::HashSet;

use super::AdmConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path for `AdmConfig`.
///
/// Kept by hand in step with `adm_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        "simulation",
        "simulation.rollouts",
        "simulation.max_depth",
        "simulation.use_failure_chance",
        "simulation.aid_delay_secs",
        "estimator",
        "estimator.neighbor_count",
        "estimator.missing_estimate_penalty",
        "estimator.variant",
        "estimator.weight_file",
        "estimator.print_neighbors",
        "case_base",
        "case_base.path",
        "case_base.continue_existing",
        "session",
        "session.adm_name",
        "session.seed",
        "session.max_scenarios",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// Key tree walking & suggestions
// ============================================================================

/// Collect every dotted key path in a TOML value, tables included.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest known key within edit distance 3, ties broken alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), *k))
        .filter(|(d, _)| *d <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

/// Warnings for every key in `raw_toml` that `AdmConfig` does not define.
///
/// Unparseable input yields no warnings; serde reports the parse error.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range checks
// ============================================================================

/// Returns (errors, warnings): errors are impossible values, warnings are
/// settings that work but are probably mistakes.
pub fn validate_ranges(config: &AdmConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let s = &config.simulation;
    if s.aid_delay_secs < 0.0 {
        errors.push(format!(
            "simulation.aid_delay_secs = {:.1} cannot be negative",
            s.aid_delay_secs
        ));
    }
    if s.rollouts > 100_000 {
        warnings.push(ValidationWarning {
            field: "simulation.rollouts".to_string(),
            message: format!(
                "simulation.rollouts = {} will make every probe very slow",
                s.rollouts
            ),
            suggestion: None,
        });
    }
    if s.max_depth > 8 {
        warnings.push(ValidationWarning {
            field: "simulation.max_depth".to_string(),
            message: format!(
                "simulation.max_depth = {} expands the full action space at every level",
                s.max_depth
            ),
            suggestion: None,
        });
    }

    if config.estimator.neighbor_count > 50 {
        warnings.push(ValidationWarning {
            field: "estimator.neighbor_count".to_string(),
            message: format!(
                "estimator.neighbor_count = {} averages over most of a typical case base",
                config.estimator.neighbor_count
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}
