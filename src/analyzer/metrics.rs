//! Metric names and the score functions the Monte Carlo tree aggregates
//!
//! ## Aggregated scores (evaluated on rollout leaves)
//! - `SEVERITY`, `CASUALTY_SEVERITY`: summed injury severity, total and per casualty
//! - `SUPPLIES_REMAINING`: units of supply left
//! - `AVERAGE_TIME_USED`: simulated clock
//! - `DAMAGE_PER_SECOND`, `CASUALTY_DAMAGE_PER_SECOND`
//! - `P_DEATH`, `CASUALTY_P_DEATH`, `P_DEATH_ONEMINLATER`
//!
//! ## Derived per decision
//! - `SEVERITY_CHANGE`, `CASUALTY_SEVERITY_CHANGE` (per second of simulated time)
//! - `SUPPLIES_USED`
//! - `TARGET_SEVERITY(_CHANGE)`, `SEVEREST_SEVERITY(_CHANGE)`
//! - `NONDETERMINISM`, `MEDICAL_SOUNDNESS`, `CASUALTY_TRISS`

use std::collections::BTreeMap;

use crate::config::defaults::P_DEATH_PROJECTION_SECS;
use crate::medsim::{damage, morbidity};
use crate::monte_carlo::{Score, ScoreFn};
use crate::types::TriageState;

pub const SEVERITY: &str = "SEVERITY";
pub const SUPPLIES_REMAINING: &str = "SUPPLIES_REMAINING";
pub const AVERAGE_TIME_USED: &str = "AVERAGE_TIME_USED";
pub const CASUALTY_SEVERITY: &str = "CASUALTY_SEVERITY";
pub const DAMAGE_PER_SECOND: &str = "DAMAGE_PER_SECOND";
pub const CASUALTY_DAMAGE_PER_SECOND: &str = "CASUALTY_DAMAGE_PER_SECOND";
pub const P_DEATH: &str = "P_DEATH";
pub const CASUALTY_P_DEATH: &str = "CASUALTY_P_DEATH";
pub const P_DEATH_ONEMINLATER: &str = "P_DEATH_ONEMINLATER";

pub const SEVERITY_CHANGE: &str = "SEVERITY_CHANGE";
pub const CASUALTY_SEVERITY_CHANGE: &str = "CASUALTY_SEVERITY_CHANGE";
pub const SUPPLIES_USED: &str = "SUPPLIES_USED";
pub const TARGET_SEVERITY: &str = "TARGET_SEVERITY";
pub const TARGET_SEVERITY_CHANGE: &str = "TARGET_SEVERITY_CHANGE";
pub const SEVEREST_SEVERITY: &str = "SEVEREST_SEVERITY";
pub const SEVEREST_SEVERITY_CHANGE: &str = "SEVEREST_SEVERITY_CHANGE";
pub const NONDETERMINISM: &str = "NONDETERMINISM";
pub const MEDICAL_SOUNDNESS: &str = "MEDICAL_SOUNDNESS";
pub const CASUALTY_TRISS: &str = "CASUALTY_TRISS";

/// Scalar metrics where a larger value is better.
pub const MAXIMIZE_METRICS: &[&str] = &[SUPPLIES_REMAINING, MEDICAL_SOUNDNESS];

/// Scalar metrics a failed simulation still reports, with its worst value.
pub const SCALAR_METRICS: &[&str] = &[
    SEVERITY,
    SUPPLIES_REMAINING,
    AVERAGE_TIME_USED,
    DAMAGE_PER_SECOND,
    P_DEATH,
    P_DEATH_ONEMINLATER,
    SEVERITY_CHANGE,
    SUPPLIES_USED,
    TARGET_SEVERITY,
    TARGET_SEVERITY_CHANGE,
    SEVEREST_SEVERITY,
    SEVEREST_SEVERITY_CHANGE,
];

pub fn is_maximized(metric: &str) -> bool {
    MAXIMIZE_METRICS.contains(&metric)
}

/// Value assigned to `metric` when its decision could not be simulated.
pub fn failure_value(metric: &str) -> f64 {
    if is_maximized(metric) {
        0.0
    } else {
        f64::INFINITY
    }
}

// ============================================================================
// Score functions
// ============================================================================

fn per_casualty(state: &TriageState, f: impl Fn(&crate::types::Casualty) -> f64) -> Score {
    Score::Keyed(state.casualties.iter().map(|c| (c.id.clone(), f(c))).collect::<BTreeMap<_, _>>())
}

/// Death probability after a further minute with nobody acting.
pub fn p_death_after_minute(state: &TriageState) -> f64 {
    let mut later = state.clone();
    damage::advance(&mut later, P_DEATH_PROJECTION_SECS, None);
    morbidity::update_morbidity(&mut later);
    later.p_death()
}

/// The full set of leaf scores used by the analyzer.
pub fn score_functions() -> Vec<ScoreFn<TriageState>> {
    vec![
        ScoreFn::new(SEVERITY, |s: &TriageState| Score::Scalar(s.total_severity())),
        ScoreFn::new(SUPPLIES_REMAINING, |s: &TriageState| {
            Score::Scalar(f64::from(s.total_supplies()))
        }),
        ScoreFn::new(AVERAGE_TIME_USED, |s: &TriageState| Score::Scalar(s.time)),
        ScoreFn::new(CASUALTY_SEVERITY, |s: &TriageState| per_casualty(s, |c| c.severity())),
        ScoreFn::new(DAMAGE_PER_SECOND, |s: &TriageState| Score::Scalar(s.total_damage_per_second())),
        ScoreFn::new(CASUALTY_DAMAGE_PER_SECOND, |s: &TriageState| {
            per_casualty(s, |c| c.damage_per_second())
        }),
        ScoreFn::new(P_DEATH, |s: &TriageState| Score::Scalar(s.p_death())),
        ScoreFn::new(CASUALTY_P_DEATH, |s: &TriageState| per_casualty(s, |c| c.morbidity.p_death)),
        ScoreFn::new(P_DEATH_ONEMINLATER, |s: &TriageState| Score::Scalar(p_death_after_minute(s))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BodyLocation, Casualty, Injury, InjuryKind};

    #[test]
    fn test_failure_values_follow_direction() {
        assert_eq!(failure_value(SUPPLIES_REMAINING), 0.0);
        assert_eq!(failure_value(MEDICAL_SOUNDNESS), 0.0);
        assert!(failure_value(P_DEATH).is_infinite());
    }

    #[test]
    fn test_projection_never_lowers_p_death() {
        let mut state = TriageState {
            casualties: vec![Casualty {
                id: "p1".into(),
                injuries: vec![Injury::new(InjuryKind::Amputation, BodyLocation::LeftThigh, None)],
                ..Casualty::default()
            }],
            ..TriageState::default()
        };
        damage::advance(&mut state, 30.0, None);
        morbidity::update_morbidity(&mut state);
        assert!(p_death_after_minute(&state) > state.p_death());
    }

    #[test]
    fn test_score_function_names_unique() {
        let fns = score_functions();
        let mut names: Vec<_> = fns.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), fns.len());
    }
}
