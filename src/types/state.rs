//! World state: casualties, their injuries, supplies and environment
//!
//! ## Ownership
//!
//! A [`TriageState`] owns its casualties and supplies outright. Casualties own
//! their injuries. The simulator clones the whole state on every transition,
//! so no branch of the Monte Carlo tree ever aliases another.
//!
//! ## Loss accounting
//!
//! Each injury accumulates gross loss on three channels (blood ml, breathing
//! hp, burn hp). Healing supplies credit a per-casualty [`Recovery`] ledger
//! which is subtracted from the gross totals and trimmed so that no channel
//! ever reports a negative total.

use serde::{Deserialize, Serialize};

use super::medical::{
    Avpu, BodyLocation, BreathingLevel, Directness, EffectLevel, HeartRate, InjuryKind, Intent,
    MentalStatus, Spo2, SupplyKind, TriageTag,
};

// ============================================================================
// Injury
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Injury {
    pub kind: InjuryKind,
    pub location: BodyLocation,
    /// Base severity in [0, 1]; never decreases.
    pub severity: f64,
    pub treated: bool,
    pub bleeding: EffectLevel,
    pub breathing: EffectLevel,
    pub burning: EffectLevel,
    pub blood_lost_ml: f64,
    pub breath_hp_lost: f64,
    pub burn_hp_lost: f64,
    pub damage_per_second: f64,
}

impl Injury {
    /// Fresh, untreated injury. Severity defaults by kind when not reported.
    pub fn new(kind: InjuryKind, location: BodyLocation, severity: Option<f64>) -> Self {
        let (bleeding, breathing, burning) = crate::medsim::tables::injury_effects(kind);
        let damage_per_second = [bleeding, breathing, burning]
            .into_iter()
            .map(crate::medsim::tables::damage_rate)
            .sum();
        Self {
            kind,
            location,
            severity: severity.unwrap_or_else(|| kind.default_severity()).clamp(0.0, 1.0),
            treated: false,
            bleeding,
            breathing,
            burning,
            blood_lost_ml: 0.0,
            breath_hp_lost: 0.0,
            burn_hp_lost: 0.0,
            damage_per_second,
        }
    }

    /// Total loss across all three channels.
    pub fn total_loss(&self) -> f64 {
        self.blood_lost_ml + self.breath_hp_lost + self.burn_hp_lost
    }
}

// ============================================================================
// Casualty
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    pub sex: Option<String>,
    /// Military paygrade such as `E-4`.
    pub rank: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub conscious: Option<bool>,
    pub avpu: Option<Avpu>,
    pub mental_status: Option<MentalStatus>,
    pub breathing: Option<BreathingLevel>,
    pub heart_rate: Option<HeartRate>,
    pub spo2: Option<Spo2>,
    pub hrpmin: Option<u32>,
}

/// Amount healed per channel, credited by healing supplies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Recovery {
    pub blood_ml: f64,
    pub breath_hp: f64,
    pub burn_hp: f64,
}

/// Derived death probabilities, recomputed after every transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Morbidity {
    pub p_bleedout: f64,
    pub p_asphyxia: f64,
    pub p_burn: f64,
    pub p_death: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Casualty {
    pub id: String,
    pub name: String,
    pub unstructured: String,
    pub relationship: Option<String>,
    pub intent: Option<Intent>,
    pub directness_of_causality: Option<Directness>,
    pub disposition: Option<String>,
    pub demographics: Demographics,
    pub vitals: Vitals,
    pub injuries: Vec<Injury>,
    pub recovery: Recovery,
    pub tag: Option<TriageTag>,
    pub assessed: bool,
    pub morbidity: Morbidity,
}

impl Casualty {
    pub fn gross_blood_lost(&self) -> f64 {
        self.injuries.iter().map(|i| i.blood_lost_ml).sum()
    }

    pub fn gross_breath_lost(&self) -> f64 {
        self.injuries.iter().map(|i| i.breath_hp_lost).sum()
    }

    pub fn gross_burn_lost(&self) -> f64 {
        self.injuries.iter().map(|i| i.burn_hp_lost).sum()
    }

    /// Blood lost net of healing, never negative.
    pub fn blood_lost_ml(&self) -> f64 {
        (self.gross_blood_lost() - self.recovery.blood_ml).max(0.0)
    }

    pub fn breath_hp_lost(&self) -> f64 {
        (self.gross_breath_lost() - self.recovery.breath_hp).max(0.0)
    }

    pub fn burn_hp_lost(&self) -> f64 {
        (self.gross_burn_lost() - self.recovery.burn_hp).max(0.0)
    }

    /// Sum of injury severities.
    pub fn severity(&self) -> f64 {
        self.injuries.iter().map(|i| i.severity).sum()
    }

    pub fn damage_per_second(&self) -> f64 {
        self.injuries.iter().map(|i| i.damage_per_second).sum()
    }

    pub fn is_injured(&self) -> bool {
        !self.injuries.is_empty()
    }

    pub fn has_untreated_injury(&self) -> bool {
        self.injuries.iter().any(|i| !i.treated)
    }

    /// Distinct injury locations, in injury order.
    pub fn injury_locations(&self) -> Vec<BodyLocation> {
        let mut locations = Vec::new();
        for injury in &self.injuries {
            if !locations.contains(&injury.location) {
                locations.push(injury.location);
            }
        }
        locations
    }
}

// ============================================================================
// Supplies & environment
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supply {
    pub kind: SupplyKind,
    pub quantity: u32,
    /// Carried through from the server; reusable supplies are still decremented.
    #[serde(default)]
    pub reusable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub environment_type: Option<String>,
    pub aid_available: Option<bool>,
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageState {
    /// Simulated seconds since scenario start.
    pub time: f64,
    pub casualties: Vec<Casualty>,
    pub supplies: Vec<Supply>,
    pub unstructured: String,
    /// Seconds until outside aid arrives, if the server reported one.
    pub aid_delay: Option<f64>,
    pub environment: Environment,
}

impl TriageState {
    pub fn casualty(&self, id: &str) -> Option<&Casualty> {
        self.casualties.iter().find(|c| c.id == id)
    }

    pub fn casualty_mut(&mut self, id: &str) -> Option<&mut Casualty> {
        self.casualties.iter_mut().find(|c| c.id == id)
    }

    pub fn supply(&self, kind: SupplyKind) -> Option<&Supply> {
        self.supplies.iter().find(|s| s.kind == kind)
    }

    pub fn supply_mut(&mut self, kind: SupplyKind) -> Option<&mut Supply> {
        self.supplies.iter_mut().find(|s| s.kind == kind)
    }

    pub fn total_supplies(&self) -> u32 {
        self.supplies.iter().map(|s| s.quantity).sum()
    }

    pub fn in_stock(&self) -> impl Iterator<Item = SupplyKind> + '_ {
        self.supplies.iter().filter(|s| s.quantity > 0).map(|s| s.kind)
    }

    pub fn total_severity(&self) -> f64 {
        self.casualties.iter().map(Casualty::severity).sum()
    }

    /// Highest single-casualty severity, 0 for an empty scene.
    pub fn severest_severity(&self) -> f64 {
        self.casualties
            .iter()
            .map(Casualty::severity)
            .fold(0.0, f64::max)
    }

    pub fn total_damage_per_second(&self) -> f64 {
        self.casualties.iter().map(Casualty::damage_per_second).sum()
    }

    /// Probability that at least one casualty dies.
    pub fn p_death(&self) -> f64 {
        let survive: f64 = self
            .casualties
            .iter()
            .map(|c| 1.0 - c.morbidity.p_death)
            .product();
        (1.0 - survive).clamp(0.0, 1.0)
    }
}
