//! Score values and running means

use std::collections::BTreeMap;

/// A score is a scalar or a keyed family of scalars (e.g. per casualty).
#[derive(Debug, Clone, PartialEq)]
pub enum Score {
    Scalar(f64),
    Keyed(BTreeMap<String, f64>),
}

/// Named scores held by a node.
pub type ScoreMap = BTreeMap<String, Score>;

/// Samples folded into each key of a keyed score. A key can first appear
/// partway through a node's rollouts, so its count trails the node's.
pub type KeySamples = BTreeMap<String, u64>;

/// A named score function over leaf states.
pub struct ScoreFn<S> {
    pub name: String,
    pub func: Box<dyn Fn(&S) -> Score>,
}

impl<S> ScoreFn<S> {
    pub fn new(name: impl Into<String>, func: impl Fn(&S) -> Score + 'static) -> Self {
        Self { name: name.into(), func: Box::new(func) }
    }
}

impl<S> std::fmt::Debug for ScoreFn<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreFn").field("name", &self.name).finish_non_exhaustive()
    }
}

#[allow(clippy::cast_precision_loss)]
fn fold_mean(mean: f64, sample: f64, n: u64) -> f64 {
    mean + (sample - mean) / n as f64
}

/// Fold `sample` into the running mean `current`, where `n` counts the new sample.
///
/// Keyed scores average each key over the samples that carried it, tracked in
/// `key_samples`.
pub fn update_mean(current: Option<&Score>, sample: &Score, n: u64, key_samples: &mut KeySamples) -> Score {
    match (current, sample) {
        (Some(Score::Scalar(mean)), Score::Scalar(x)) => Score::Scalar(fold_mean(*mean, *x, n)),
        (Some(Score::Keyed(means)), Score::Keyed(xs)) => {
            let mut next = means.clone();
            for (key, x) in xs {
                let count = key_samples.entry(key.clone()).or_insert(0);
                *count += 1;
                let updated = means.get(key).map_or(*x, |m| fold_mean(*m, *x, *count));
                next.insert(key.clone(), updated);
            }
            Score::Keyed(next)
        }
        (_, Score::Keyed(xs)) => {
            *key_samples = xs.keys().map(|k| (k.clone(), 1)).collect();
            sample.clone()
        }
        _ => sample.clone(),
    }
}
