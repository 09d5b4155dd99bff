//! Sequential Halving Search
//!
//! Picks the best action in a decision state under a fixed rollout budget and
//! turns the outcome into a training target.
//!
//! # Algorithm
//!
//! With `k` allowed actions and budget `M`:
//!
//! ```text
//! k = 0  → NoAllowedActions
//! k = 1  → the sole action, no rollouts
//!
//! halving on:   R = ⌈log2 k⌉ rounds
//!   per round:  n = max(1, remaining / (survivors × rounds left))
//!               every survivor gets n rollouts on the SAME ordinals
//!               sort survivors by (mean, action), keep ⌈s/2⌉
//!
//! halving off:  max(1, M / k) rollouts per action, argmin of the means
//! ```
//!
//! Lower mean is better. Ties are broken towards the lower action.
//!
//! # Targets
//!
//! - `OneHot`: 1 on the chosen action
//! - `RankWeighted`: weight `2^-rank`, normalised, where rank 0 is the winner
//!   and later-eliminated actions rank before earlier-eliminated ones

use crate::core::{SimError, SimResult};
use crate::models::OpaqueState;
use crate::policy::Policy;
use crate::rollout::{ActionEvaluation, RolloutEvaluator};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Shape of the training target emitted by a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    #[default]
    OneHot,
    RankWeighted,
}

fn default_budget() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

/// Search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Total rollout budget per searched state (`M`)
    #[serde(default = "default_budget")]
    pub budget: usize,

    #[serde(default = "default_true")]
    pub enable_sequential_halving: bool,

    #[serde(default)]
    pub target_kind: TargetKind,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            enable_sequential_halving: true,
            target_kind: TargetKind::default(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.budget == 0 {
            return Err(SimError::Configuration(
                "rollout budget M must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Chosen action
    pub action: i64,

    /// Final evaluation of every allowed action, sorted by action
    pub evaluations: Vec<ActionEvaluation>,

    /// Target distribution over `0..valid_action_count`
    pub target: Vec<f64>,

    /// Number of evaluation rounds
    pub rounds: usize,

    /// Survivors at the start of each round
    pub survivors_per_round: Vec<usize>,

    /// Total rollouts spent
    pub rollouts_used: usize,
}

/// `⌈log2 k⌉` for `k ≥ 1`
fn ceil_log2(k: usize) -> usize {
    if k <= 1 {
        0
    } else {
        (usize::BITS - (k - 1).leading_zeros()) as usize
    }
}

fn by_mean_then_action(a: &ActionEvaluation, b: &ActionEvaluation) -> Ordering {
    a.mean()
        .total_cmp(&b.mean())
        .then_with(|| a.action.cmp(&b.action))
}

/// Rollout-based action selection with sequential halving
pub struct SequentialHalvingSearch {
    evaluator: RolloutEvaluator,
    config: SearchConfig,
}

impl SequentialHalvingSearch {
    /// # Errors
    /// `Configuration` if the budget is zero.
    pub fn new(evaluator: RolloutEvaluator, config: SearchConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Self { evaluator, config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search the best action in `state`
    ///
    /// Rollouts use ordinals starting at `first_ordinal`; callers searching
    /// several states give each search a disjoint ordinal range.
    ///
    /// # Errors
    /// - `ContractViolation` if `state` does not await an action or belongs to
    ///   another model
    /// - `NoAllowedActions` if the state has no allowed action
    pub fn search(
        &self,
        state: &OpaqueState,
        continuation: &dyn Policy,
        first_ordinal: u64,
    ) -> SimResult<SearchResult> {
        let model = self.evaluator.model();
        let category = model.classify(state)?;
        if !category.is_await_action() {
            return Err(SimError::ContractViolation(format!(
                "search requires an AwaitAction state, found {}",
                category
            )));
        }

        let mut allowed = model.allowed_actions(state)?;
        allowed.sort_unstable();
        allowed.dedup();

        let (ranking, rounds, survivors_per_round, rollouts_used) = match allowed.len() {
            0 => {
                return Err(SimError::NoAllowedActions(format!(
                    "search on model \"{}\"",
                    model.identifier()
                )))
            }
            1 => (vec![ActionEvaluation::new(allowed[0])], 0, Vec::new(), 0),
            _ if self.config.enable_sequential_halving => {
                self.halving(state, continuation, &allowed, first_ordinal)?
            }
            _ => self.uniform(state, continuation, &allowed, first_ordinal)?,
        };

        let action = ranking[0].action;
        let target = self.target(&ranking, model.valid_action_count())?;

        let mut evaluations = ranking;
        evaluations.sort_by_key(|e| e.action);

        Ok(SearchResult {
            action,
            evaluations,
            target,
            rounds,
            survivors_per_round,
            rollouts_used,
        })
    }

    /// Evaluate every candidate on the same `per_candidate` ordinals
    fn evaluate_round(
        &self,
        state: &OpaqueState,
        continuation: &dyn Policy,
        candidates: &mut [ActionEvaluation],
        per_candidate: usize,
        first_ordinal: u64,
    ) -> SimResult<()> {
        let fresh = candidates
            .par_iter()
            .map(|c| {
                self.evaluator
                    .evaluate(state, c.action, continuation, per_candidate, first_ordinal)
            })
            .collect::<SimResult<Vec<ActionEvaluation>>>()?;

        for (candidate, evaluation) in candidates.iter_mut().zip(fresh.iter()) {
            candidate.merge(evaluation);
        }
        Ok(())
    }

    /// Returns the ranking (best first), rounds, survivors per round and
    /// rollouts used
    fn halving(
        &self,
        state: &OpaqueState,
        continuation: &dyn Policy,
        allowed: &[i64],
        first_ordinal: u64,
    ) -> SimResult<(Vec<ActionEvaluation>, usize, Vec<usize>, usize)> {
        let total_rounds = ceil_log2(allowed.len());
        let mut survivors: Vec<ActionEvaluation> =
            allowed.iter().map(|&a| ActionEvaluation::new(a)).collect();
        let mut eliminated: Vec<Vec<ActionEvaluation>> = Vec::new();
        let mut survivors_per_round = Vec::with_capacity(total_rounds);

        let mut remaining = self.config.budget;
        let mut used = 0;
        let mut ordinal = first_ordinal;

        for round in 0..total_rounds {
            if survivors.len() <= 1 {
                break;
            }
            let rounds_left = total_rounds - round;
            let per_candidate = (remaining / (survivors.len() * rounds_left)).max(1);
            survivors_per_round.push(survivors.len());

            self.evaluate_round(state, continuation, &mut survivors, per_candidate, ordinal)?;

            let spent = per_candidate * survivors.len();
            used += spent;
            remaining = remaining.saturating_sub(spent);
            ordinal += per_candidate as u64;

            survivors.sort_by(by_mean_then_action);
            let keep = survivors.len().div_ceil(2);
            eliminated.push(survivors.split_off(keep));

            tracing::trace!(
                round,
                per_candidate,
                survivors = survivors.len(),
                "sequential halving round"
            );
        }

        let mut ranking = survivors;
        for batch in eliminated.into_iter().rev() {
            ranking.extend(batch);
        }
        Ok((ranking, survivors_per_round.len(), survivors_per_round, used))
    }

    fn uniform(
        &self,
        state: &OpaqueState,
        continuation: &dyn Policy,
        allowed: &[i64],
        first_ordinal: u64,
    ) -> SimResult<(Vec<ActionEvaluation>, usize, Vec<usize>, usize)> {
        let per_candidate = (self.config.budget / allowed.len()).max(1);
        let mut ranking: Vec<ActionEvaluation> =
            allowed.iter().map(|&a| ActionEvaluation::new(a)).collect();

        self.evaluate_round(state, continuation, &mut ranking, per_candidate, first_ordinal)?;
        ranking.sort_by(by_mean_then_action);

        Ok((
            ranking,
            1,
            vec![allowed.len()],
            per_candidate * allowed.len(),
        ))
    }

    fn target(&self, ranking: &[ActionEvaluation], valid_action_count: usize) -> SimResult<Vec<f64>> {
        let mut target = vec![0.0; valid_action_count];
        let slot = |action: i64| -> SimResult<usize> {
            usize::try_from(action)
                .ok()
                .filter(|&i| i < valid_action_count)
                .ok_or_else(|| {
                    SimError::ContractViolation(format!(
                        "allowed action {} is outside 0..{}",
                        action, valid_action_count
                    ))
                })
        };

        match self.config.target_kind {
            TargetKind::OneHot => {
                target[slot(ranking[0].action)?] = 1.0;
            }
            TargetKind::RankWeighted => {
                let mut weight = 1.0;
                let mut total = 0.0;
                for evaluation in ranking {
                    target[slot(evaluation.action)?] = weight;
                    total += weight;
                    weight *= 0.5;
                }
                for value in target.iter_mut() {
                    *value /= total;
                }
            }
        }
        Ok(target)
    }
}
