//! Medical simulator
//!
//! Forward model of a triage scene. Given a state and an action it produces
//! the successor state: the action's duration elapses for every injury,
//! treatments resolve against the compatibility tables, and morbidity is
//! recomputed.
//!
//! ## Treatment resolution
//!
//! A treatment takes effect only when the supply is in stock, fits the
//! location, and treats an untreated injury there (or has a healing effect).
//! Otherwise the action still consumes its time. A successful application
//! decrements the supply by one. With failure chances enabled, an applicable
//! treatment yields two weighted outcomes: success and failure.

pub mod actions;
pub mod damage;
pub mod morbidity;
pub mod tables;
pub mod triss;

use tracing::debug;

use crate::config::defaults::MIN_ACTION_SECS;
use crate::config::SimulationConfig;
use crate::monte_carlo::{MCSim, SimResult};
use crate::types::{Action, ActionKind, BodyLocation, SupplyKind, TriageState};

use damage::TreatingTarget;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("invalid state: {0}")]
    InvalidState(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MedicalSimulator {
    pub use_failure_chance: bool,
    /// Aid delay used when the state carries none.
    pub default_aid_delay: f64,
}

impl Default for MedicalSimulator {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

impl MedicalSimulator {
    pub const fn from_config(config: &SimulationConfig) -> Self {
        Self {
            use_failure_chance: config.use_failure_chance,
            default_aid_delay: config.aid_delay_secs,
        }
    }

    /// Seconds `action` takes in `state`.
    pub fn duration(&self, state: &TriageState, action: &Action) -> f64 {
        let seconds = match action {
            Action::ApplyTreatment { supply, .. } => tables::supply_time(*supply),
            Action::EndScene | Action::EndScenario => {
                state.aid_delay.unwrap_or(self.default_aid_delay)
            }
            other => tables::action_time(other.kind()),
        };
        seconds.max(MIN_ACTION_SECS)
    }

    /// Deterministic successor of `state` under `action`.
    ///
    /// `treatment_succeeds = false` models a supply failure: time passes but the
    /// treatment has no effect and nothing is consumed.
    pub fn apply(&self, state: &TriageState, action: &Action, treatment_succeeds: bool) -> TriageState {
        let mut next = state.clone();
        let seconds = self.duration(state, action);
        let mut treating = None;

        match action {
            Action::ApplyTreatment { casualty, supply, location } if treatment_succeeds => {
                treating = resolve_treatment(&mut next, casualty, *supply, *location, seconds);
            }
            Action::CheckAllVitals { casualty }
            | Action::CheckPulse { casualty }
            | Action::CheckRespiration { casualty }
            | Action::CheckBloodOxygen { casualty }
            | Action::Sitrep { casualty: Some(casualty) } => {
                if let Some(c) = next.casualty_mut(casualty) {
                    c.assessed = true;
                }
            }
            Action::TagCharacter { casualty, tag } => {
                if let Some(c) = next.casualty_mut(casualty) {
                    c.tag = Some(*tag);
                }
            }
            _ => {}
        }

        let target = treating
            .as_ref()
            .map(|(casualty, injury)| TreatingTarget { casualty: casualty.as_str(), injury: *injury });
        damage::advance(&mut next, seconds, target);
        morbidity::update_morbidity(&mut next);
        next.time = state.time + seconds;
        next
    }

    /// Chance that applying `action` fails, when it could take effect at all.
    fn failure_chance(&self, state: &TriageState, action: &Action) -> Option<f64> {
        let Action::ApplyTreatment { casualty, supply, location } = action else {
            return None;
        };
        if !self.use_failure_chance {
            return None;
        }
        let casualty = state.casualty(casualty)?;
        let in_stock = state.supply(*supply).is_some_and(|s| s.quantity > 0);
        (in_stock && actions::treatment_applies(casualty, *supply, *location))
            .then(|| tables::failure_chance(*supply))
    }
}

/// Apply a treatment to `state`, returning the injury now being treated.
///
/// Unknown casualties, stockouts and incompatible supplies leave the state untouched.
fn resolve_treatment(
    state: &mut TriageState,
    casualty_id: &str,
    supply: SupplyKind,
    location: BodyLocation,
    seconds: f64,
) -> Option<(String, usize)> {
    if !state.supply(supply).is_some_and(|s| s.quantity > 0) {
        debug!(supply = %supply, "Treatment skipped, supply out of stock");
        return None;
    }
    let Some(casualty) = state.casualty_mut(casualty_id) else {
        debug!(casualty = %casualty_id, "Treatment skipped, unknown casualty");
        return None;
    };
    if !tables::supply_fits_location(supply, location) {
        return None;
    }

    let treated = casualty
        .injuries
        .iter()
        .position(|i| !i.treated && i.location == location && tables::supply_treats(supply, i.kind));
    if let Some(index) = treated {
        casualty.injuries[index].treated = true;
    }
    let healed = casualty.is_injured() && damage::apply_healing(casualty, supply, seconds);

    if treated.is_none() && !healed {
        return None;
    }
    if let Some(s) = state.supply_mut(supply) {
        s.quantity = s.quantity.saturating_sub(1);
    }
    treated.map(|index| (casualty_id.to_string(), index))
}

impl MCSim for MedicalSimulator {
    type State = TriageState;
    type Action = Action;
    type Error = SimError;

    fn actions(&self, state: &TriageState) -> Vec<Action> {
        actions::enumerate(state)
    }

    fn exec(&mut self, state: &TriageState, action: &Action) -> Result<Vec<SimResult<TriageState>>, SimError> {
        if !state.time.is_finite() {
            return Err(SimError::InvalidState(format!("non-finite time {}", state.time)));
        }
        if action.kind() == ActionKind::ApplyTreatment {
            if let Some(p) = self.failure_chance(state, action) {
                let mut outcomes = Vec::with_capacity(2);
                if p < 1.0 {
                    outcomes.push(SimResult { state: self.apply(state, action, true), probability: 1.0 - p });
                }
                if p > 0.0 {
                    outcomes.push(SimResult { state: self.apply(state, action, false), probability: p });
                }
                return Ok(outcomes);
            }
        }
        Ok(vec![SimResult { state: self.apply(state, action, true), probability: 1.0 }])
    }

    fn reset(&mut self) {}
}
