//! Monte Carlo search over a pluggable simulator
//!
//! ## Tree shape
//!
//! State nodes alternate with decision nodes. A decision node's children are
//! the distinct outcomes of simulating its action, each weighted by the
//! probability the simulator reported. Nodes live in arenas and refer to each
//! other by index.
//!
//! ## Scores
//!
//! Score functions are evaluated on the leaf state of every rollout and folded
//! into a running mean on each node along the path.

pub mod scores;
pub mod selector;
pub mod tree;

pub use scores::{Score, ScoreFn, ScoreMap};
pub use selector::{Candidate, NodeSelector, UnselectedThenRandom};
pub use tree::{DecisionId, DecisionNode, MonteCarloTree, RolloutOutcome, StateId, StateNode, TreeError};

/// One outcome of executing an action.
#[derive(Debug, Clone, PartialEq)]
pub struct SimResult<S> {
    pub state: S,
    /// Probability of this outcome among the results of one execution.
    pub probability: f64,
}

/// A forward simulator the tree can search.
pub trait MCSim {
    type State: Clone;
    type Action: Clone + std::fmt::Display;
    type Error: std::error::Error;

    /// Legal actions from `state`; empty for a terminal state.
    fn actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Simulate `action` once, returning every distinct outcome.
    fn exec(
        &mut self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Result<Vec<SimResult<Self::State>>, Self::Error>;

    /// Clear any per-rollout simulator state.
    fn reset(&mut self);
}
