//! ADM Configuration Module
//!
//! Run settings loaded from TOML, plus the JSON feature-weight file used by
//! the case-based estimator.
//!
//! ## Loading Order
//!
//! 1. `TRIAGE_ADM_CONFIG` environment variable (path to TOML file)
//! 2. `adm_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The ADM binary calls `config::init()` once at startup and reads its run
//! settings back through `config::get()`. Library components take
//! their settings as explicit parameters and never read the global.
//!
//! ```ignore
//! config::init(AdmConfig::load());
//! let rollouts = config::get().simulation.rollouts;
//! ```

mod adm_config;
pub mod defaults;
pub mod validation;
pub mod weights;

pub use adm_config::*;
pub use weights::{WeightSettings, Weights, BASIC_TRIAGE_FEATURES};

use std::sync::OnceLock;

static ADM_CONFIG: OnceLock<AdmConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored with a warning.
pub fn init(config: AdmConfig) {
    if ADM_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// The global configuration, or the built-in defaults before `init()`.
pub fn get() -> &'static AdmConfig {
    ADM_CONFIG.get_or_init(AdmConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_once_then_get() {
        let mut first = AdmConfig::default();
        first.simulation.rollouts = 17;
        init(first.clone());

        let mut second = AdmConfig::default();
        second.simulation.rollouts = 99;
        init(second);

        assert_eq!(get(), &first);
        assert_eq!(get().simulation.rollouts, 17);
    }
}
