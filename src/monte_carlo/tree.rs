//! Arena-allocated Monte Carlo tree and the rollout loop
//!
//! ## Rollout
//!
//! 1. Reset the simulator and pick a root.
//! 2. Until `max_depth` is reached: expand the state if it has never been
//!    expanded (stop if it is terminal), pick a live decision, count the visit
//!    on both nodes, simulate the decision if it has no outcomes yet, then pick
//!    an outcome and descend.
//! 3. Score the leaf state and fold the scores into every node on the path.
//!
//! A decision whose simulation fails is marked failed and never picked again.
//! The loop is iterative, so a caller may stop after any rollout and read
//! valid partial means.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use tracing::warn;

use super::scores::{update_mean, KeySamples, ScoreFn, ScoreMap};
use super::selector::{Candidate, NodeSelector};
use super::MCSim;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecisionId(pub usize);

#[derive(Debug, Clone)]
pub struct StateNode<S> {
    pub state: S,
    pub parent: Option<DecisionId>,
    pub children: Vec<DecisionId>,
    pub visits: u64,
    /// Rollouts whose scores were folded into this node.
    pub samples: u64,
    pub scores: ScoreMap,
    /// Probability of this outcome given its parent decision (1 for roots).
    pub probability: f64,
    pub ordinal: usize,
    /// Action that produced this state.
    pub justification: String,
    key_samples: BTreeMap<String, KeySamples>,
    expanded: bool,
}

#[derive(Debug, Clone)]
pub struct DecisionNode<A> {
    pub action: A,
    pub parent: StateId,
    pub children: Vec<StateId>,
    pub visits: u64,
    pub samples: u64,
    pub scores: ScoreMap,
    pub ordinal: usize,
    pub failure: Option<String>,
    key_samples: BTreeMap<String, KeySamples>,
    explored: bool,
}

impl<A> DecisionNode<A> {
    pub const fn is_explored(&self) -> bool {
        self.explored
    }
}

/// Result of a single rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutOutcome {
    /// Scores were folded in from this leaf.
    Leaf(StateId),
    /// A simulation failed; nothing was scored.
    Failed,
    /// Every decision at the chosen root has failed.
    Exhausted,
}

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("tree has no root state")]
    NoRoots,
}

pub struct MonteCarloTree<M: MCSim> {
    sim: M,
    roots: Vec<StateId>,
    states: Vec<StateNode<M::State>>,
    decisions: Vec<DecisionNode<M::Action>>,
    max_depth: usize,
    selector: Box<dyn NodeSelector>,
    score_fns: Vec<ScoreFn<M::State>>,
    rng: StdRng,
}

impl<M: MCSim> MonteCarloTree<M> {
    pub fn new(
        sim: M,
        roots: Vec<M::State>,
        max_depth: usize,
        selector: Box<dyn NodeSelector>,
        score_fns: Vec<ScoreFn<M::State>>,
        rng: StdRng,
    ) -> Self {
        let mut tree = Self {
            sim,
            roots: Vec::new(),
            states: Vec::new(),
            decisions: Vec::new(),
            max_depth,
            selector,
            score_fns,
            rng,
        };
        for (ordinal, state) in roots.into_iter().enumerate() {
            let id = tree.push_state(state, None, 1.0, ordinal, String::new());
            tree.roots.push(id);
        }
        tree
    }

    fn push_state(
        &mut self,
        state: M::State,
        parent: Option<DecisionId>,
        probability: f64,
        ordinal: usize,
        justification: String,
    ) -> StateId {
        self.states.push(StateNode {
            state,
            parent,
            children: Vec::new(),
            visits: 0,
            samples: 0,
            scores: ScoreMap::new(),
            probability,
            ordinal,
            justification,
            key_samples: BTreeMap::new(),
            expanded: false,
        });
        StateId(self.states.len() - 1)
    }

    pub fn roots(&self) -> &[StateId] {
        &self.roots
    }

    pub fn state(&self, id: StateId) -> &StateNode<M::State> {
        &self.states[id.0]
    }

    pub fn decision(&self, id: DecisionId) -> &DecisionNode<M::Action> {
        &self.decisions[id.0]
    }

    /// Attach decisions to a state; the state counts as expanded afterwards.
    pub fn add_decisions(&mut self, state: StateId, actions: Vec<M::Action>) -> Vec<DecisionId> {
        let offset = self.states[state.0].children.len();
        let mut ids = Vec::with_capacity(actions.len());
        for (i, action) in actions.into_iter().enumerate() {
            self.decisions.push(DecisionNode {
                action,
                parent: state,
                children: Vec::new(),
                visits: 0,
                samples: 0,
                scores: ScoreMap::new(),
                ordinal: offset + i,
                failure: None,
                key_samples: BTreeMap::new(),
                explored: false,
            });
            ids.push(DecisionId(self.decisions.len() - 1));
        }
        let node = &mut self.states[state.0];
        node.children.extend(&ids);
        node.expanded = true;
        ids
    }

    fn expand(&mut self, state: StateId) {
        let actions = self.sim.actions(&self.states[state.0].state);
        self.add_decisions(state, actions);
    }

    fn explore(&mut self, decision: DecisionId) -> Result<(), M::Error> {
        let parent = self.decisions[decision.0].parent;
        let action = self.decisions[decision.0].action.clone();
        let outcomes = self.sim.exec(&self.states[parent.0].state, &action)?;
        let justification = action.to_string();
        let mut children = Vec::with_capacity(outcomes.len());
        for (ordinal, outcome) in outcomes.into_iter().enumerate() {
            children.push(self.push_state(
                outcome.state,
                Some(decision),
                outcome.probability,
                ordinal,
                justification.clone(),
            ));
        }
        let node = &mut self.decisions[decision.0];
        node.children = children;
        node.explored = true;
        Ok(())
    }

    fn state_candidates(&self, ids: &[StateId], weighted: bool) -> Vec<Candidate> {
        ids.iter()
            .map(|id| {
                let node = &self.states[id.0];
                Candidate {
                    ordinal: node.ordinal,
                    visits: node.visits,
                    weight: if weighted { node.probability } else { 1.0 },
                }
            })
            .collect()
    }

    fn decision_candidates(&self, ids: &[DecisionId]) -> Vec<Candidate> {
        ids.iter()
            .map(|id| {
                let node = &self.decisions[id.0];
                Candidate { ordinal: node.ordinal, visits: node.visits, weight: 1.0 }
            })
            .collect()
    }

    fn pick(&mut self, candidates: &[Candidate]) -> usize {
        self.selector.select(&mut self.rng, candidates)
    }

    /// Run one rollout.
    pub fn rollout(&mut self) -> Result<RolloutOutcome, TreeError> {
        self.sim.reset();
        if self.roots.is_empty() {
            return Err(TreeError::NoRoots);
        }
        let roots = self.roots.clone();
        let candidates = self.state_candidates(&roots, false);
        let root_index = self.pick(&candidates);
        let mut current = roots[root_index];
        let mut path_states = vec![current];
        let mut path_decisions = Vec::new();
        let mut depth = 1;

        while depth < self.max_depth {
            if !self.states[current.0].expanded {
                self.expand(current);
            }
            let live: Vec<DecisionId> = self.states[current.0]
                .children
                .iter()
                .copied()
                .filter(|d| self.decisions[d.0].failure.is_none())
                .collect();
            if live.is_empty() {
                if path_decisions.is_empty() && !self.states[current.0].children.is_empty() {
                    return Ok(RolloutOutcome::Exhausted);
                }
                break;
            }

            let candidates = self.decision_candidates(&live);
            let chosen = live[self.pick(&candidates)];
            self.states[current.0].visits += 1;
            self.decisions[chosen.0].visits += 1;

            if !self.decisions[chosen.0].explored {
                if let Err(e) = self.explore(chosen) {
                    warn!(action = %self.decisions[chosen.0].action, error = %e, "Simulation failed, marking decision");
                    self.decisions[chosen.0].failure = Some(e.to_string());
                    return Ok(RolloutOutcome::Failed);
                }
            }
            let outcomes = self.decisions[chosen.0].children.clone();
            if outcomes.is_empty() {
                self.decisions[chosen.0].failure = Some("simulation produced no outcome".to_string());
                return Ok(RolloutOutcome::Failed);
            }
            let candidates = self.state_candidates(&outcomes, true);
            let next = outcomes[self.pick(&candidates)];

            path_decisions.push(chosen);
            path_states.push(next);
            current = next;
            depth += 1;
        }

        self.backpropagate(current, &path_states, &path_decisions);
        Ok(RolloutOutcome::Leaf(current))
    }

    fn backpropagate(&mut self, leaf: StateId, path_states: &[StateId], path_decisions: &[DecisionId]) {
        let leaf_state = &self.states[leaf.0].state;
        let samples: Vec<(String, super::Score)> = self
            .score_fns
            .iter()
            .map(|f| (f.name.clone(), (f.func)(leaf_state)))
            .collect();

        for id in path_states {
            let node = &mut self.states[id.0];
            node.samples += 1;
            for (name, sample) in &samples {
                let keys = node.key_samples.entry(name.clone()).or_default();
                let next = update_mean(node.scores.get(name), sample, node.samples, keys);
                node.scores.insert(name.clone(), next);
            }
        }
        for id in path_decisions {
            let node = &mut self.decisions[id.0];
            node.samples += 1;
            for (name, sample) in &samples {
                let keys = node.key_samples.entry(name.clone()).or_default();
                let next = update_mean(node.scores.get(name), sample, node.samples, keys);
                node.scores.insert(name.clone(), next);
            }
        }
    }

    /// State nodes with no decision children, reachable from the roots.
    pub fn leaves(&self) -> Vec<StateId> {
        let mut leaves = Vec::new();
        let mut stack: Vec<StateId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.states[id.0];
            if node.children.is_empty() {
                leaves.push(id);
                continue;
            }
            for decision in node.children.iter().rev() {
                stack.extend(self.decisions[decision.0].children.iter().rev());
            }
        }
        leaves
    }
}
