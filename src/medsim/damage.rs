//! Loss accumulation over elapsed simulated time
//!
//! Every injury of every casualty accrues loss on its three channels at the
//! rate of its effect levels. Treated injuries accrue nothing, except the one
//! being treated by the current action, which accrues at a reduced rate for
//! the duration of that action.

use crate::config::defaults::{SEVERITY_LOSS_DIVISOR, TREATING_STEP_RATE_DIVISOR};
use crate::types::{Casualty, Injury, SupplyKind, TriageState};

use super::tables::{damage_rate, healing_rates};

/// Injury receiving treatment during the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreatingTarget<'a> {
    pub casualty: &'a str,
    pub injury: usize,
}

fn rate_multiplier(injury: &Injury, treating_now: bool) -> f64 {
    if treating_now {
        1.0 / TREATING_STEP_RATE_DIVISOR
    } else if injury.treated {
        0.0
    } else {
        1.0
    }
}

fn advance_injury(injury: &mut Injury, seconds: f64, treating_now: bool) {
    let multiplier = rate_multiplier(injury, treating_now);
    injury.blood_lost_ml += seconds * damage_rate(injury.bleeding) * multiplier;
    injury.breath_hp_lost += seconds * damage_rate(injury.breathing) * multiplier;
    injury.burn_hp_lost += seconds * damage_rate(injury.burning) * multiplier;

    injury.damage_per_second = if injury.treated {
        0.0
    } else {
        damage_rate(injury.bleeding) + damage_rate(injury.breathing) + damage_rate(injury.burning)
    };

    let loss_severity = (injury.total_loss() / SEVERITY_LOSS_DIVISOR).min(1.0);
    injury.severity = injury.severity.max(loss_severity);
}

/// Advance every injury in the state by `seconds`.
pub fn advance(state: &mut TriageState, seconds: f64, treating: Option<TreatingTarget<'_>>) {
    for casualty in &mut state.casualties {
        let treated_index = treating
            .filter(|t| t.casualty == casualty.id)
            .map(|t| t.injury);
        for (i, injury) in casualty.injuries.iter_mut().enumerate() {
            advance_injury(injury, seconds, treated_index == Some(i));
        }
    }
}

/// Credit the casualty's recovery ledger for administering `supply` over `seconds`.
///
/// Returns false when the supply has no healing effect. Credits are trimmed so
/// no channel can be healed below zero net loss.
pub fn apply_healing(casualty: &mut Casualty, supply: SupplyKind, seconds: f64) -> bool {
    let Some((blood, breath, burn)) = healing_rates(supply) else {
        return false;
    };
    let gross_blood = casualty.gross_blood_lost();
    let gross_breath = casualty.gross_breath_lost();
    let gross_burn = casualty.gross_burn_lost();

    let recovery = &mut casualty.recovery;
    recovery.blood_ml = (recovery.blood_ml + blood * seconds).min(gross_blood);
    recovery.breath_hp = (recovery.breath_hp + breath * seconds).min(gross_breath);
    recovery.burn_hp = (recovery.burn_hp + burn * seconds).min(gross_burn);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BodyLocation, InjuryKind};

    fn state_with(injuries: Vec<Injury>) -> TriageState {
        TriageState {
            casualties: vec![Casualty { id: "p1".into(), injuries, ..Casualty::default() }],
            ..TriageState::default()
        }
    }

    #[test]
    fn test_untreated_laceration_bleeds_at_severe_rate() {
        let mut state = state_with(vec![Injury::new(
            InjuryKind::Laceration,
            BodyLocation::LeftForearm,
            None,
        )]);
        advance(&mut state, 30.0, None);
        let injury = &state.casualties[0].injuries[0];
        assert!((injury.blood_lost_ml - 300.0).abs() < 1e-9);
        assert_eq!(injury.breath_hp_lost, 0.0);
        assert!((injury.severity - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_treating_step_quarter_rate_then_zero() {
        let mut injury = Injury::new(InjuryKind::Amputation, BodyLocation::RightCalf, None);
        injury.treated = true;
        let mut state = state_with(vec![injury]);
        advance(&mut state, 90.0, Some(TreatingTarget { casualty: "p1", injury: 0 }));
        let after_treatment = state.casualties[0].injuries[0].blood_lost_ml;
        assert!((after_treatment - 50.0 / 4.0 * 90.0).abs() < 1e-9);
        assert_eq!(state.casualties[0].injuries[0].damage_per_second, 0.0);

        advance(&mut state, 300.0, None);
        assert_eq!(state.casualties[0].injuries[0].blood_lost_ml, after_treatment);
    }

    #[test]
    fn test_severity_never_decreases() {
        let mut state = state_with(vec![Injury::new(
            InjuryKind::ForeheadScrape,
            BodyLocation::Head,
            Some(0.9),
        )]);
        advance(&mut state, 10.0, None);
        assert_eq!(state.casualties[0].injuries[0].severity, 0.9);
    }

    #[test]
    fn test_healing_trimmed_to_gross_loss() {
        let mut injury = Injury::new(InjuryKind::Laceration, BodyLocation::LeftForearm, None);
        injury.blood_lost_ml = 200.0;
        let mut casualty = Casualty { injuries: vec![injury], ..Casualty::default() };
        assert!(apply_healing(&mut casualty, SupplyKind::Blood, 30.0));
        assert_eq!(casualty.recovery.blood_ml, 200.0);
        assert_eq!(casualty.blood_lost_ml(), 0.0);
        assert!(!apply_healing(&mut casualty, SupplyKind::Tourniquet, 30.0));
    }
}
