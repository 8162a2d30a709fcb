//! Fixed medical lookup tables
//!
//! Injury channel effects, action and supply durations, supply failure
//! chances and the two compatibility tables that decide whether a treatment
//! can take effect.

use crate::config::defaults;
use crate::types::{ActionKind, BodyLocation, EffectLevel, InjuryKind, SupplyKind};

/// Per-second loss for an effect level.
pub const fn damage_rate(level: EffectLevel) -> f64 {
    match level {
        EffectLevel::None => defaults::DAMAGE_RATE_NONE,
        EffectLevel::Minimal => defaults::DAMAGE_RATE_MINIMAL,
        EffectLevel::Moderate => defaults::DAMAGE_RATE_MODERATE,
        EffectLevel::Severe => defaults::DAMAGE_RATE_SEVERE,
        EffectLevel::Critical => defaults::DAMAGE_RATE_CRITICAL,
        EffectLevel::Fatal => defaults::DAMAGE_RATE_FATAL,
    }
}

/// Untreated contribution of an injury to the (bleeding, breathing, burning) channels.
pub const fn injury_effects(kind: InjuryKind) -> (EffectLevel, EffectLevel, EffectLevel) {
    use EffectLevel::{Critical, Minimal, Moderate, None, Severe};
    match kind {
        InjuryKind::Laceration => (Severe, None, None),
        InjuryKind::ForeheadScrape | InjuryKind::EarBleed | InjuryKind::Abrasion => {
            (Minimal, None, None)
        }
        InjuryKind::Burn => (Moderate, Moderate, Moderate),
        InjuryKind::BurnSuffocation => (None, Severe, Minimal),
        InjuryKind::Asthmatic => (None, Moderate, None),
        InjuryKind::Amputation => (Critical, Minimal, None),
        InjuryKind::ChestCollapse => (None, Severe, None),
        InjuryKind::Puncture => (Moderate, Minimal, None),
        InjuryKind::Shrapnel => (Moderate, None, None),
        InjuryKind::BrokenBone | InjuryKind::EyeTrauma => (Minimal, None, None),
        InjuryKind::Internal | InjuryKind::OpenAbdominalWound => (Severe, Minimal, None),
        InjuryKind::TraumaticBrainInjury => (None, Moderate, None),
    }
}

// ============================================================================
// Durations (seconds)
// ============================================================================

pub const fn supply_time(supply: SupplyKind) -> f64 {
    match supply {
        SupplyKind::PressureBandage
        | SupplyKind::PulseOximeter
        | SupplyKind::Blanket
        | SupplyKind::EpiPen
        | SupplyKind::VentedChestSeal
        | SupplyKind::Blood => 30.0,
        SupplyKind::HemostaticGauze => 150.0,
        SupplyKind::Tourniquet => 90.0,
        SupplyKind::DecompressionNeedle | SupplyKind::Splint => 60.0,
        SupplyKind::NasopharyngealAirway | SupplyKind::IvBag => 35.0,
        SupplyKind::PainMedications | SupplyKind::FentanylLollipop => 20.0,
        SupplyKind::BurnDressing => 64.0,
    }
}

/// Duration of a non-treatment action. Leaving actions take the aid delay instead.
pub const fn action_time(kind: ActionKind) -> f64 {
    match kind {
        ActionKind::CheckPulse => 20.0,
        ActionKind::CheckRespiration => 25.0,
        ActionKind::CheckAllVitals | ActionKind::Sitrep => 45.0,
        ActionKind::CheckBloodOxygen | ActionKind::TagCharacter => 30.0,
        ActionKind::MoveToEvac => 120.0,
        ActionKind::DirectMobileCasualty => 60.0,
        ActionKind::Search => 18.0,
        ActionKind::Message => 10.0,
        ActionKind::ApplyTreatment | ActionKind::EndScene | ActionKind::EndScenario => 0.0,
    }
}

/// Probability that applying the supply fails outright.
pub const fn failure_chance(supply: SupplyKind) -> f64 {
    match supply {
        SupplyKind::PressureBandage
        | SupplyKind::EpiPen
        | SupplyKind::VentedChestSeal
        | SupplyKind::Splint => 0.01,
        SupplyKind::HemostaticGauze | SupplyKind::NasopharyngealAirway | SupplyKind::Blood => {
            0.05
        }
        SupplyKind::Tourniquet | SupplyKind::DecompressionNeedle => 0.03,
        SupplyKind::PulseOximeter => 1.0,
        SupplyKind::Blanket => 0.001,
        SupplyKind::PainMedications | SupplyKind::FentanylLollipop => 0.1,
        SupplyKind::IvBag => 0.005,
        SupplyKind::BurnDressing => 0.02,
    }
}

// ============================================================================
// Compatibility
// ============================================================================

/// Whether `supply` treats an injury of `kind`.
pub fn supply_treats(supply: SupplyKind, kind: InjuryKind) -> bool {
    use InjuryKind as I;
    match supply {
        SupplyKind::PressureBandage => !matches!(
            kind,
            I::Burn
                | I::ChestCollapse
                | I::Asthmatic
                | I::Amputation
                | I::BurnSuffocation
                | I::ForeheadScrape
                | I::EarBleed
                | I::EyeTrauma
                | I::BrokenBone
                | I::Internal
        ),
        SupplyKind::HemostaticGauze => matches!(
            kind,
            I::Laceration | I::EarBleed | I::Shrapnel | I::Puncture | I::ForeheadScrape
        ),
        SupplyKind::Tourniquet => {
            matches!(kind, I::Amputation | I::Laceration | I::Puncture | I::Shrapnel)
        }
        SupplyKind::EpiPen => kind == I::Asthmatic,
        SupplyKind::VentedChestSeal => {
            matches!(kind, I::Laceration | I::Shrapnel | I::BrokenBone | I::Puncture)
        }
        SupplyKind::DecompressionNeedle => kind == I::ChestCollapse,
        SupplyKind::NasopharyngealAirway => matches!(kind, I::Asthmatic | I::BurnSuffocation),
        SupplyKind::BurnDressing => kind == I::Burn,
        SupplyKind::Splint => kind == I::BrokenBone,
        SupplyKind::PulseOximeter
        | SupplyKind::Blanket
        | SupplyKind::PainMedications
        | SupplyKind::FentanylLollipop
        | SupplyKind::Blood
        | SupplyKind::IvBag => false,
    }
}

/// Whether `supply` may be applied at `location`.
pub fn supply_fits_location(supply: SupplyKind, location: BodyLocation) -> bool {
    use BodyLocation as L;
    match supply {
        SupplyKind::Tourniquet => !matches!(
            location,
            L::Unspecified
                | L::LeftSide
                | L::RightSide
                | L::LeftNeck
                | L::RightNeck
                | L::Neck
                | L::LeftChest
                | L::RightChest
                | L::CenterChest
                | L::LeftShoulder
                | L::RightShoulder
                | L::LeftFace
                | L::RightFace
                | L::LeftStomach
                | L::RightStomach
                | L::Stomach
        ),
        SupplyKind::DecompressionNeedle => matches!(location, L::LeftChest | L::RightChest),
        SupplyKind::NasopharyngealAirway => matches!(location, L::LeftFace | L::RightFace),
        SupplyKind::VentedChestSeal => {
            matches!(location, L::LeftChest | L::RightChest | L::Unspecified)
        }
        _ => true,
    }
}

// ============================================================================
// Healing
// ============================================================================

/// Per-second credit to the (blood, breathing, burn) channels while the supply
/// is administered.
pub const fn healing_rates(supply: SupplyKind) -> Option<(f64, f64, f64)> {
    match supply {
        SupplyKind::Blood => Some((defaults::BLOOD_HEAL_ML_PER_SEC, 0.0, 0.0)),
        SupplyKind::IvBag => Some((defaults::IV_HEAL_ML_PER_SEC, 0.0, 0.0)),
        SupplyKind::NasopharyngealAirway => Some((0.0, defaults::NASO_HEAL_HP_PER_SEC, 0.0)),
        SupplyKind::PainMedications | SupplyKind::FentanylLollipop => Some((
            defaults::PAINMED_HEAL_PER_SEC,
            defaults::PAINMED_HEAL_PER_SEC,
            0.0,
        )),
        _ => None,
    }
}
