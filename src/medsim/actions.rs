//! Action space: unconstrained enumeration and grounding of partial actions
//!
//! Self-directed rollouts enumerate every legal action from a state. Actions
//! supplied by the server may leave parameters open (no casualty, no supply,
//! no location, no tag); grounding expands them into every concrete action
//! the state supports.

use std::collections::HashSet;

use crate::types::{Action, ActionKind, BodyLocation, Casualty, SupplyKind, TriageState, TriageTag};

use super::tables::{healing_rates, supply_fits_location, supply_treats};

const CHECK_KINDS: [ActionKind; 4] = [
    ActionKind::CheckAllVitals,
    ActionKind::CheckPulse,
    ActionKind::CheckRespiration,
    ActionKind::CheckBloodOxygen,
];

/// Whether applying `supply` at `location` would have any effect on the casualty.
pub fn treatment_applies(casualty: &Casualty, supply: SupplyKind, location: BodyLocation) -> bool {
    if !supply_fits_location(supply, location) {
        return false;
    }
    let treats = casualty
        .injuries
        .iter()
        .any(|i| !i.treated && i.location == location && supply_treats(supply, i.kind));
    treats || (healing_rates(supply).is_some() && casualty.is_injured())
}

fn treatments(state: &TriageState, casualty: &Casualty) -> Vec<Action> {
    let mut actions = Vec::new();
    for supply in state.in_stock() {
        for location in casualty.injury_locations() {
            if treatment_applies(casualty, supply, location) {
                actions.push(Action::ApplyTreatment {
                    casualty: casualty.id.clone(),
                    supply,
                    location,
                });
            }
        }
    }
    actions
}

fn check(kind: ActionKind, casualty: &str) -> Option<Action> {
    let casualty = casualty.to_string();
    match kind {
        ActionKind::CheckAllVitals => Some(Action::CheckAllVitals { casualty }),
        ActionKind::CheckPulse => Some(Action::CheckPulse { casualty }),
        ActionKind::CheckRespiration => Some(Action::CheckRespiration { casualty }),
        ActionKind::CheckBloodOxygen => Some(Action::CheckBloodOxygen { casualty }),
        _ => None,
    }
}

/// Every legal action from `state`, deduplicated, in a stable order.
pub fn enumerate(state: &TriageState) -> Vec<Action> {
    let mut actions = Vec::new();
    for casualty in &state.casualties {
        actions.extend(treatments(state, casualty));
    }
    for casualty in &state.casualties {
        actions.extend(CHECK_KINDS.iter().filter_map(|k| check(*k, &casualty.id)));
    }
    for casualty in &state.casualties {
        for tag in TriageTag::ALL {
            actions.push(Action::TagCharacter { casualty: casualty.id.clone(), tag: *tag });
        }
    }
    actions.extend([
        Action::DirectMobileCasualty,
        Action::Search,
        Action::Sitrep { casualty: None },
        Action::EndScenario,
        Action::EndScene,
    ]);

    let mut seen = HashSet::new();
    actions.retain(|a| seen.insert(a.clone()));
    actions
}

// ============================================================================
// Grounding
// ============================================================================

/// A server action whose parameters may be incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialAction {
    pub kind: Option<ActionKind>,
    pub casualty: Option<String>,
    pub supply: Option<SupplyKind>,
    pub location: Option<BodyLocation>,
    pub tag: Option<TriageTag>,
    pub evac_id: Option<String>,
}

impl PartialAction {
    pub fn of(kind: ActionKind) -> Self {
        Self { kind: Some(kind), ..Self::default() }
    }
}

fn candidate_casualties<'a>(
    state: &'a TriageState,
    partial: &PartialAction,
    kind: ActionKind,
) -> Vec<&'a Casualty> {
    match &partial.casualty {
        Some(id) => state.casualty(id).into_iter().collect(),
        None => state
            .casualties
            .iter()
            .filter(|c| match kind {
                ActionKind::ApplyTreatment => c.is_injured(),
                ActionKind::TagCharacter => c.tag.is_none(),
                _ => true,
            })
            .collect(),
    }
}

fn ground_treatment(state: &TriageState, casualty: &Casualty, partial: &PartialAction) -> Vec<Action> {
    let supplies: Vec<SupplyKind> = match partial.supply {
        Some(s) => vec![s],
        None => state.in_stock().collect(),
    };
    let locations: Vec<BodyLocation> = match partial.location {
        Some(l) => vec![l],
        None => casualty.injury_locations(),
    };
    let explicit = partial.supply.is_some() && partial.location.is_some();
    let mut actions = Vec::new();
    for supply in &supplies {
        for location in &locations {
            if explicit || treatment_applies(casualty, *supply, *location) {
                actions.push(Action::ApplyTreatment {
                    casualty: casualty.id.clone(),
                    supply: *supply,
                    location: *location,
                });
            }
        }
    }
    actions
}

/// Expand a partial action into concrete actions against `state`.
///
/// Fully specified actions translate one-for-one, even when they would have
/// no medical effect. Open parameters expand over: injured casualties for
/// treatments, untagged casualties for tags, in-stock supplies, the
/// casualty's injury locations, and the four tag categories. An empty result
/// means nothing in the state can ground the action.
pub fn ground(partial: &PartialAction, state: &TriageState) -> Vec<Action> {
    let Some(kind) = partial.kind else {
        return Vec::new();
    };
    if !kind.requires_casualty() {
        let action = match kind {
            ActionKind::DirectMobileCasualty => Action::DirectMobileCasualty,
            ActionKind::Search => Action::Search,
            ActionKind::Message => Action::Message,
            ActionKind::EndScene => Action::EndScene,
            ActionKind::EndScenario => Action::EndScenario,
            _ => Action::Sitrep { casualty: partial.casualty.clone() },
        };
        return vec![action];
    }

    let mut actions = Vec::new();
    for casualty in candidate_casualties(state, partial, kind) {
        let id = casualty.id.clone();
        match kind {
            ActionKind::ApplyTreatment => actions.extend(ground_treatment(state, casualty, partial)),
            ActionKind::TagCharacter => match partial.tag {
                Some(tag) => actions.push(Action::TagCharacter { casualty: id, tag }),
                None => actions.extend(
                    TriageTag::ALL
                        .iter()
                        .map(|tag| Action::TagCharacter { casualty: id.clone(), tag: *tag }),
                ),
            },
            ActionKind::MoveToEvac => actions.push(Action::MoveToEvac {
                casualty: id,
                evac_id: partial.evac_id.clone(),
            }),
            other => actions.extend(check(other, &id)),
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Injury, InjuryKind, Supply};

    fn scene() -> TriageState {
        TriageState {
            casualties: vec![
                Casualty {
                    id: "p1".into(),
                    injuries: vec![Injury::new(InjuryKind::Amputation, BodyLocation::RightCalf, None)],
                    ..Casualty::default()
                },
                Casualty { id: "p2".into(), tag: Some(TriageTag::Minimal), ..Casualty::default() },
            ],
            supplies: vec![
                Supply { kind: SupplyKind::Tourniquet, quantity: 1, reusable: false },
                Supply { kind: SupplyKind::PressureBandage, quantity: 0, reusable: false },
                Supply { kind: SupplyKind::Blood, quantity: 2, reusable: false },
            ],
            ..TriageState::default()
        }
    }

    #[test]
    fn test_enumerate_treatments_respect_match_tables() {
        let actions = enumerate(&scene());
        let treatments: Vec<_> = actions
            .iter()
            .filter(|a| a.kind() == ActionKind::ApplyTreatment)
            .collect();
        assert_eq!(treatments.len(), 2);
        assert!(treatments.iter().all(|a| a.casualty() == Some("p1")));
        assert!(actions.contains(&Action::EndScene));
        assert!(actions.contains(&Action::TagCharacter { casualty: "p2".into(), tag: TriageTag::Delayed }));
    }

    #[test]
    fn test_enumerate_is_deduplicated() {
        let actions = enumerate(&scene());
        let unique: HashSet<_> = actions.iter().collect();
        assert_eq!(unique.len(), actions.len());
    }

    #[test]
    fn test_ground_untagged_casualties_only() {
        let grounded = ground(&PartialAction::of(ActionKind::TagCharacter), &scene());
        assert_eq!(grounded.len(), 4);
        assert!(grounded.iter().all(|a| a.casualty() == Some("p1")));
    }

    #[test]
    fn test_ground_treatment_over_supplies_and_locations() {
        let partial = PartialAction {
            casualty: Some("p1".into()),
            ..PartialAction::of(ActionKind::ApplyTreatment)
        };
        let grounded = ground(&partial, &scene());
        assert_eq!(
            grounded,
            vec![
                Action::ApplyTreatment {
                    casualty: "p1".into(),
                    supply: SupplyKind::Tourniquet,
                    location: BodyLocation::RightCalf,
                },
                Action::ApplyTreatment {
                    casualty: "p1".into(),
                    supply: SupplyKind::Blood,
                    location: BodyLocation::RightCalf,
                },
            ]
        );
    }

    #[test]
    fn test_ground_explicit_action_one_for_one() {
        let partial = PartialAction {
            casualty: Some("p2".into()),
            supply: Some(SupplyKind::PressureBandage),
            location: Some(BodyLocation::Head),
            ..PartialAction::of(ActionKind::ApplyTreatment)
        };
        assert_eq!(ground(&partial, &scene()).len(), 1);
    }

    #[test]
    fn test_ground_unknown_casualty_is_empty() {
        let partial = PartialAction {
            casualty: Some("ghost".into()),
            ..PartialAction::of(ActionKind::CheckPulse)
        };
        assert!(ground(&partial, &scene()).is_empty());
    }
}
