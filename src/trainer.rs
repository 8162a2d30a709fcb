//! Alignment-feedback trainer
//!
//! The server reports KDMA feedback as a running mean over every scene so far
//! (`source_probes`). The trainer recovers the value of the scene that just
//! ended by subtracting what earlier scenes already contributed:
//!
//! `contribution[k] = feedback[k] * |source_probes| - sum(previous contributions[k])`
//!
//! The contribution is attached to every pending case of the scene, and the
//! cases are committed to the case base.

use std::collections::BTreeMap;
use tracing::info;

use crate::kdma::Case;
use crate::storage::{CaseBase, CaseBaseError};
use crate::types::{AlignmentFeedback, KdmaValues};

#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    #[error("scene {0} is not among the feedback's source probes")]
    SceneNotInSources(String),
    #[error("scene {0} already has attributed feedback")]
    SceneAlreadyRecorded(String),
    #[error("previously recorded scene {0} is missing from the feedback")]
    MissingPriorScene(String),
    #[error(transparent)]
    CaseBase(#[from] CaseBaseError),
}

#[derive(Debug, Clone, Default)]
pub struct Trainer {
    scene_contributions: BTreeMap<String, KdmaValues>,
}

impl Trainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn recorded_scenes(&self) -> &BTreeMap<String, KdmaValues> {
        &self.scene_contributions
    }

    /// Attribute `feedback` to the scene it closes and commit `pending`.
    ///
    /// Returns the scene's KDMA contribution.
    pub fn train(
        &mut self,
        feedback: &AlignmentFeedback,
        pending: Vec<Case>,
        base: &mut CaseBase,
    ) -> Result<KdmaValues, TrainerError> {
        let scene = &feedback.scene;
        if !feedback.source_probes.iter().any(|s| s == scene) {
            return Err(TrainerError::SceneNotInSources(scene.clone()));
        }
        if self.scene_contributions.contains_key(scene) {
            return Err(TrainerError::SceneAlreadyRecorded(scene.clone()));
        }
        if let Some(missing) = self
            .scene_contributions
            .keys()
            .find(|prior| !feedback.source_probes.contains(prior))
        {
            return Err(TrainerError::MissingPriorScene(missing.clone()));
        }

        #[allow(clippy::cast_precision_loss)]
        let sources = feedback.source_probes.len() as f64;
        let contribution: KdmaValues = feedback
            .kdma_values
            .iter()
            .map(|(kdma, value)| {
                let prior: f64 = self
                    .scene_contributions
                    .values()
                    .filter_map(|c| c.get(kdma))
                    .sum();
                (kdma.clone(), value * sources - prior)
            })
            .collect();

        let count = pending.len();
        for mut case in pending {
            case.kdmas.extend(contribution.iter().map(|(k, v)| (k.clone(), *v)));
            base.commit(case)?;
        }
        info!(scene = %scene, cases = count, kdmas = ?contribution, "Scene feedback attributed");

        if feedback.is_final {
            self.scene_contributions.clear();
        } else {
            self.scene_contributions.insert(scene.clone(), contribution.clone());
        }
        Ok(contribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(scene: &str, risk: f64, sources: &[&str], is_final: bool) -> AlignmentFeedback {
        AlignmentFeedback {
            target_name: "t".into(),
            kdma_values: KdmaValues::from([("risk".to_string(), risk)]),
            alignment_score: 0.0,
            source_probes: sources.iter().map(|s| (*s).to_string()).collect(),
            is_final,
            scene_end: true,
            scene: scene.into(),
        }
    }

    fn pending(scene: &str, n: usize) -> Vec<Case> {
        (0..n).map(|_| Case { scene: scene.into(), ..Case::default() }).collect()
    }

    #[test]
    fn test_attribution_subtracts_prior_scenes() {
        let mut trainer = Trainer::new();
        let mut base = CaseBase::in_memory();
        let a = trainer.train(&feedback("A", 0.6, &["A"], false), pending("A", 3), &mut base).unwrap();
        assert!((a["risk"] - 0.6).abs() < 1e-12);
        let b = trainer.train(&feedback("B", 0.4, &["A", "B"], false), pending("B", 2), &mut base).unwrap();
        assert!((b["risk"] - 0.2).abs() < 1e-12);
        assert_eq!(base.len(), 5);
        assert!((base.cases()[4].kdmas["risk"] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_guards() {
        let mut trainer = Trainer::new();
        let mut base = CaseBase::in_memory();
        assert!(matches!(
            trainer.train(&feedback("A", 0.6, &["B"], false), Vec::new(), &mut base),
            Err(TrainerError::SceneNotInSources(_))
        ));
        trainer.train(&feedback("A", 0.6, &["A"], false), Vec::new(), &mut base).unwrap();
        assert!(matches!(
            trainer.train(&feedback("A", 0.6, &["A"], false), Vec::new(), &mut base),
            Err(TrainerError::SceneAlreadyRecorded(_))
        ));
        assert!(matches!(
            trainer.train(&feedback("C", 0.6, &["C"], false), Vec::new(), &mut base),
            Err(TrainerError::MissingPriorScene(_))
        ));
    }

    #[test]
    fn test_final_feedback_resets() {
        let mut trainer = Trainer::new();
        let mut base = CaseBase::in_memory();
        trainer.train(&feedback("A", 0.5, &["A"], true), pending("A", 1), &mut base).unwrap();
        assert!(trainer.recorded_scenes().is_empty());
    }
}
