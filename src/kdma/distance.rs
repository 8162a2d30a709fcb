//! Weighted case distance

use crate::config::Weights;

use super::case::Case;

/// A feature value as seen by the distance function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Flag(bool),
    Number(f64),
    Category(&'a str),
}

/// Dissimilarity of two feature values, `None` when neither side has one.
///
/// A value missing on one side contributes nothing. Values of different kinds
/// are maximally dissimilar.
pub fn compare(a: Option<FeatureValue<'_>>, b: Option<FeatureValue<'_>>) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (Some(_), None) | (None, Some(_)) => Some(0.0),
        (Some(FeatureValue::Number(x)), Some(FeatureValue::Number(y))) => Some((x - y).abs()),
        (Some(FeatureValue::Flag(x)), Some(FeatureValue::Flag(y))) => Some(if x == y { 0.0 } else { 1.0 }),
        (Some(FeatureValue::Category(x)), Some(FeatureValue::Category(y))) => {
            Some(if x == y { 0.0 } else { 1.0 })
        }
        (Some(_), Some(_)) => Some(1.0),
    }
}

/// Weighted sum of per-feature dissimilarities over the weighted features.
pub fn distance(a: &Case, b: &Case, weights: &Weights) -> f64 {
    weights
        .iter()
        .filter(|(_, w)| **w != 0.0)
        .filter_map(|(feature, w)| compare(a.feature(feature), b.feature(feature)).map(|d| d * w))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Intent, MentalStatus};

    fn weights(pairs: &[(&str, f64)]) -> Weights {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    fn case(age: Option<u32>, intent: Intent, mental: MentalStatus) -> Case {
        let mut c = Case::default();
        c.features.age = age;
        c.features.intent = Some(intent);
        c.features.mental_status = Some(mental);
        c
    }

    #[test]
    fn test_identity_and_symmetry() {
        let w = weights(&[("age", 0.1), ("intent", 2.0), ("mental_status", 1.0), ("treating", 3.0)]);
        let a = case(Some(30), Intent::IntendMajorHarm, MentalStatus::Calm);
        let b = case(Some(20), Intent::NoIntent, MentalStatus::Agony);
        assert_eq!(distance(&a, &a, &w), 0.0);
        assert_eq!(distance(&a, &b, &w), distance(&b, &a, &w));
        assert!((distance(&a, &b, &w) - (1.0 + 1.0 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_one_side_contributes_nothing() {
        let w = weights(&[("age", 1.0)]);
        let a = case(Some(30), Intent::NoIntent, MentalStatus::Calm);
        let b = case(None, Intent::NoIntent, MentalStatus::Calm);
        assert_eq!(distance(&a, &b, &w), 0.0);
    }

    #[test]
    fn test_mismatched_kinds() {
        assert_eq!(compare(Some(FeatureValue::Flag(true)), Some(FeatureValue::Number(1.0))), Some(1.0));
        assert_eq!(compare(None, None), None);
    }
}
