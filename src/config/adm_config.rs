//! ADM Configuration - search, estimator, case base and session settings
//!
//! Each section implements `Default` with the built-in constants from
//! [`super::defaults`], so an absent or partial file behaves exactly like the
//! stock decision maker.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "TRIAGE_ADM_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "adm_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a decision-maker run.
///
/// Load with `AdmConfig::load()` which searches:
/// 1. `$TRIAGE_ADM_CONFIG` env var
/// 2. `./adm_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmConfig {
    /// Monte Carlo analyzer settings
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Case-based KDMA estimator settings
    #[serde(default)]
    pub estimator: EstimatorConfig,

    /// Case base persistence
    #[serde(default)]
    pub case_base: CaseBaseConfig,

    /// Session identity and limits
    #[serde(default)]
    pub session: SessionConfig,
}

impl AdmConfig {
    /// Load configuration using the standard search order:
    /// 1. `$TRIAGE_ADM_CONFIG` environment variable
    /// 2. `./adm_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), adm = %config.session.adm_name, "Loaded ADM config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(adm = %config.session.adm_name, "Loaded ADM config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write the config to disk, e.g. to seed an editable `adm_config.toml`.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "ADM config saved");
        Ok(())
    }

    /// Validate all settings.
    ///
    /// Rules:
    /// - Rollout count, depth and neighbour count must be > 0
    /// - The missing-estimate penalty must be finite and non-negative
    /// - No value may be NaN or Inf
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let s = &self.simulation;
        if s.rollouts == 0 {
            errors.push("simulation.rollouts must be > 0".to_string());
        }
        if s.max_depth == 0 {
            errors.push("simulation.max_depth must be > 0".to_string());
        }

        let e = &self.estimator;
        if e.neighbor_count == 0 {
            errors.push("estimator.neighbor_count must be > 0".to_string());
        }
        if !e.missing_estimate_penalty.is_finite() || e.missing_estimate_penalty < 0.0 {
            errors.push(format!(
                "estimator.missing_estimate_penalty must be finite and >= 0 (got {})",
                e.missing_estimate_penalty
            ));
        }

        if self.case_base.path.as_os_str().is_empty() {
            errors.push("case_base.path must not be empty".to_string());
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if !s.aid_delay_secs.is_finite() {
            errors.push(format!(
                "simulation.aid_delay_secs must be finite (got {})",
                s.aid_delay_secs
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {e}"),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Simulation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Rollouts per probe
    #[serde(default = "default_rollouts")]
    pub rollouts: usize,

    /// Tree depth in alternating state/decision levels
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Roll supply failure chances during treatment
    #[serde(default)]
    pub use_failure_chance: bool,

    /// Aid delay assumed when the scenario does not report one (seconds)
    #[serde(default = "default_aid_delay_secs")]
    pub aid_delay_secs: f64,
}

fn default_rollouts() -> usize {
    defaults::DEFAULT_ROLLOUTS
}
fn default_max_depth() -> usize {
    defaults::DEFAULT_MAX_DEPTH
}
fn default_aid_delay_secs() -> f64 {
    defaults::DEFAULT_AID_DELAY_SECS
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rollouts: default_rollouts(),
            max_depth: default_max_depth(),
            use_failure_chance: false,
            aid_delay_secs: default_aid_delay_secs(),
        }
    }
}

// ============================================================================
// Estimator
// ============================================================================

/// How the selector relates predicted KDMAs to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorVariant {
    /// Minimize distance to the target.
    #[default]
    Aligned,
    /// Minimize distance to `1 - target`.
    Misaligned,
    /// Ignore the target; only estimate availability matters.
    Baseline,
}

impl EstimatorVariant {
    pub const fn display_name(self) -> &'static str {
        match self {
            EstimatorVariant::Aligned => "aligned",
            EstimatorVariant::Misaligned => "misaligned",
            EstimatorVariant::Baseline => "baseline",
        }
    }
}

impl std::fmt::Display for EstimatorVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Neighbours per estimate (K)
    #[serde(default = "default_neighbor_count")]
    pub neighbor_count: usize,

    /// Added to the squared distance when a KDMA cannot be estimated
    #[serde(default = "default_missing_estimate_penalty")]
    pub missing_estimate_penalty: f64,

    #[serde(default)]
    pub variant: EstimatorVariant,

    /// JSON weight settings; uniform weights when absent
    #[serde(default)]
    pub weight_file: Option<PathBuf>,

    /// Log the neighbours behind every estimate at info level
    #[serde(default)]
    pub print_neighbors: bool,
}

fn default_neighbor_count() -> usize {
    defaults::DEFAULT_NEIGHBOR_COUNT
}
fn default_missing_estimate_penalty() -> f64 {
    defaults::MISSING_ESTIMATE_PENALTY
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            neighbor_count: default_neighbor_count(),
            missing_estimate_penalty: default_missing_estimate_penalty(),
            variant: EstimatorVariant::default(),
            weight_file: None,
            print_neighbors: false,
        }
    }
}

// ============================================================================
// Case base
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseBaseConfig {
    /// JSON-lines case file
    #[serde(default = "default_case_base_path")]
    pub path: PathBuf,

    /// Load existing records on start instead of truncating
    #[serde(default = "default_true")]
    pub continue_existing: bool,
}

fn default_case_base_path() -> PathBuf {
    PathBuf::from(defaults::DEFAULT_CASE_BASE_PATH)
}
const fn default_true() -> bool {
    true
}

impl Default for CaseBaseConfig {
    fn default() -> Self {
        Self { path: default_case_base_path(), continue_existing: true }
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_adm_name")]
    pub adm_name: String,

    /// Seed for every random source; drawn from entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub max_scenarios: Option<usize>,
}

fn default_adm_name() -> String {
    defaults::DEFAULT_ADM_NAME.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { adm_name: default_adm_name(), seed: None, max_scenarios: None }
    }
}
