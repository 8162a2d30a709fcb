//! Trauma and Injury Severity Score (TRISS) survival probability
//!
//! ## Method
//!
//! - Revised Trauma Score from coma scale (AVPU), a blood-pressure proxy
//!   derived from the palpated heart rate, and the respiratory rate proxy.
//! - Injury Severity Score: worst injury per body region, the three worst
//!   regions summed.
//! - Logistic regression with separate coefficients for blunt and
//!   penetrating trauma, chosen by the most severe injury.
//!
//! Unreported vitals are read as normal.

use std::collections::HashMap;

use crate::types::{Avpu, BodyRegion, BreathingLevel, Casualty, HeartRate, InjurySeverity};

const RTS_GCS: f64 = 0.9368;
const RTS_SBP: f64 = 0.7326;
const RTS_RR: f64 = 0.2908;

/// (intercept, RTS, ISS, age over 54)
const PENETRATING: (f64, f64, f64, f64) = (-2.5355, 0.9934, -0.0651, -1.1360);
const BLUNT: (f64, f64, f64, f64) = (-0.4499, 0.8085, -0.0835, -1.7430);

const AGE_BAND_YEARS: u32 = 54;

fn responsiveness(casualty: &Casualty) -> Avpu {
    match (casualty.vitals.avpu, casualty.vitals.conscious) {
        (Some(avpu), _) => avpu,
        (None, Some(false)) => Avpu::Unresponsive,
        (None, _) => Avpu::Alert,
    }
}

/// Systolic blood pressure points inferred from the palpated pulse.
fn blood_pressure_points(heart_rate: HeartRate, avpu: Avpu) -> f64 {
    let verbal = avpu.is_verbal();
    match heart_rate {
        HeartRate::None => 0.0,
        HeartRate::Faint if verbal => 2.0,
        HeartRate::Faint => 1.0,
        HeartRate::Normal if verbal => 4.0,
        HeartRate::Normal => 3.0,
        HeartRate::Fast if verbal => 3.0,
        HeartRate::Fast => 4.0,
    }
}

pub fn revised_trauma_score(casualty: &Casualty) -> f64 {
    let avpu = responsiveness(casualty);
    let heart = casualty.vitals.heart_rate.unwrap_or(HeartRate::Normal);
    let breathing = casualty.vitals.breathing.unwrap_or(BreathingLevel::Normal);
    RTS_GCS * avpu.gcs_points()
        + RTS_SBP * blood_pressure_points(heart, avpu)
        + RTS_RR * breathing.rts_points()
}

pub fn injury_severity_score(casualty: &Casualty) -> u32 {
    let mut worst: HashMap<BodyRegion, u32> = HashMap::new();
    for injury in &casualty.injuries {
        let points = InjurySeverity::from_score(injury.severity).iss_points();
        let entry = worst.entry(injury.location.region()).or_insert(0);
        *entry = (*entry).max(points);
    }
    let mut per_region: Vec<u32> = worst.into_values().collect();
    per_region.sort_unstable_by(|a, b| b.cmp(a));
    per_region.iter().take(3).sum()
}

fn is_penetrating(casualty: &Casualty) -> bool {
    casualty
        .injuries
        .iter()
        .max_by(|a, b| a.severity.total_cmp(&b.severity))
        .is_some_and(|i| i.kind.is_penetrating())
}

/// Probability of survival in (0, 1).
pub fn survival_probability(casualty: &Casualty) -> f64 {
    let (b0, b_rts, b_iss, b_age) = if is_penetrating(casualty) { PENETRATING } else { BLUNT };
    let aged = casualty.demographics.age.is_some_and(|a| a > AGE_BAND_YEARS);
    let b = b0
        + b_rts * revised_trauma_score(casualty)
        + b_iss * f64::from(injury_severity_score(casualty))
        + if aged { b_age } else { 0.0 };
    1.0 / (1.0 + (-b).exp())
}
