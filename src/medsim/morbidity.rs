//! Morbidity: death probabilities from accumulated loss
//!
//! Each channel's net loss, as a fraction of [`MAX_CHANNEL_LOSS`], falls into
//! a fixed band with a fixed probability. The three channel probabilities
//! combine as independent causes of death.

use crate::config::defaults::{MAX_CHANNEL_LOSS, MORBIDITY_BAND_EDGES, MORBIDITY_BAND_PROBABILITIES};
use crate::types::{Casualty, Morbidity, TriageState};

/// Band probability for a raw channel loss.
pub fn band_probability(loss: f64) -> f64 {
    let fraction = loss / MAX_CHANNEL_LOSS;
    MORBIDITY_BAND_EDGES
        .iter()
        .position(|edge| fraction < *edge)
        .map_or(MORBIDITY_BAND_PROBABILITIES[MORBIDITY_BAND_EDGES.len()], |i| {
            MORBIDITY_BAND_PROBABILITIES[i]
        })
}

/// Morbidity as a pure function of the casualty's net losses.
pub fn morbidity_of(casualty: &Casualty) -> Morbidity {
    let p_bleedout = band_probability(casualty.blood_lost_ml());
    let p_asphyxia = band_probability(casualty.breath_hp_lost());
    let p_burn = band_probability(casualty.burn_hp_lost());
    let p_death = (1.0 - (1.0 - p_bleedout) * (1.0 - p_asphyxia) * (1.0 - p_burn)).clamp(0.0, 1.0);
    Morbidity { p_bleedout, p_asphyxia, p_burn, p_death }
}

pub fn update_morbidity(state: &mut TriageState) {
    for casualty in &mut state.casualties {
        casualty.morbidity = morbidity_of(casualty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BodyLocation, Injury, InjuryKind};

    #[test]
    fn test_band_edges() {
        assert_eq!(band_probability(0.0), 0.0);
        assert_eq!(band_probability(749.0), 0.0);
        assert_eq!(band_probability(750.0), 0.1);
        assert_eq!(band_probability(1_600.0), 0.5);
        assert_eq!(band_probability(2_400.0), 0.75);
        assert_eq!(band_probability(2_500.0), 0.999);
        assert_eq!(band_probability(1e9), 0.999);
    }

    #[test]
    fn test_morbidity_is_pure() {
        let mut injury = Injury::new(InjuryKind::Burn, BodyLocation::LeftForearm, None);
        injury.blood_lost_ml = 1_000.0;
        injury.breath_hp_lost = 1_600.0;
        injury.burn_hp_lost = 100.0;
        let casualty = Casualty { injuries: vec![injury], ..Casualty::default() };
        let first = morbidity_of(&casualty);
        let second = morbidity_of(&casualty);
        assert_eq!(first.p_death.to_bits(), second.p_death.to_bits());
        assert!((first.p_death - (1.0 - 0.9 * 0.5)).abs() < 1e-12);
    }
}
