//! Policy Comparer
//!
//! Simulates several policies of one model on common random numbers and
//! reports the mean discounted return (a cost, lower is better) of each.
//!
//! # Common random numbers
//!
//! Trajectory `i` is seeded `(base_seed, i)` for every policy, so all
//! policies start from the same initial states and face the same event
//! sequences wherever the model draws events in the same order. Two identical
//! deterministic policies therefore produce identical returns, and a paired
//! comparison of them reports a difference of exactly 0.
//!
//! # Truncation
//!
//! A trajectory stops at `Final` or once `max_events` epochs have passed
//! (`EndOfHorizon`, accrued return kept). The first `warmup`
//! epochs are excluded from the reported return; a trajectory that ends
//! before its warm-up completes reports 0.

use crate::core::{SimError, SimResult, StateCategory};
use crate::erasure::SimulatableHandle;
use crate::events::{Event, EventLog};
use crate::policy::{Policy, PolicyHandle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

fn default_num_trajectories() -> usize {
    1000
}

fn default_max_events() -> usize {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparerConfig {
    #[serde(default = "default_num_trajectories")]
    pub num_trajectories: usize,

    /// Epochs per trajectory before truncation
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Leading epochs excluded from the reported return
    #[serde(default)]
    pub warmup: usize,

    #[serde(default)]
    pub base_seed: u64,
}

impl Default for ComparerConfig {
    fn default() -> Self {
        Self {
            num_trajectories: default_num_trajectories(),
            max_events: default_max_events(),
            warmup: 0,
            base_seed: 0,
        }
    }
}

impl ComparerConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.num_trajectories == 0 {
            return Err(SimError::Configuration(
                "num_trajectories must be > 0".to_string(),
            ));
        }
        if self.warmup > self.max_events {
            return Err(SimError::Configuration(format!(
                "warmup ({}) must not exceed max_events ({})",
                self.warmup, self.max_events
            )));
        }
        Ok(())
    }
}

/// Summary of one policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyComparison {
    pub policy_id: String,
    pub mean: f64,
    pub standard_error: f64,
    pub count: usize,
}

/// Paired summary of two policies on the same trajectories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedComparison {
    pub first: PolicyComparison,
    pub second: PolicyComparison,

    /// Mean of `first − second` per trajectory
    pub mean_difference: f64,

    pub standard_error: f64,
}

/// Mean and standard error of the mean
fn summarize(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64;
    (mean, (variance / n as f64).sqrt())
}

/// Compares policies of one model
pub struct PolicyComparer {
    model: SimulatableHandle,
    config: ComparerConfig,
    event_log: EventLog,
}

impl PolicyComparer {
    pub fn new(model: SimulatableHandle, config: ComparerConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            model,
            config,
            event_log: EventLog::new(),
        })
    }

    pub fn config(&self) -> &ComparerConfig {
        &self.config
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Returns of `policy` on every trajectory, in ordinal order
    pub fn returns(&self, policy: &dyn Policy) -> SimResult<Vec<f64>> {
        (0..self.config.num_trajectories as u64)
            .into_par_iter()
            .map(|ordinal| self.simulate(policy, ordinal))
            .collect()
    }

    fn simulate(&self, policy: &dyn Policy, ordinal: u64) -> SimResult<f64> {
        let model = self.model.as_ref();
        let mut traj = [model.seeded_trajectory(self.config.base_seed, ordinal)];
        model.initiate_state(&mut traj)?;

        let warmup = self.config.warmup;
        let mut warmup_return = if warmup == 0 { Some(0.0) } else { None };
        loop {
            match traj[0].category {
                StateCategory::Final | StateCategory::EndOfHorizon => break,
                _ if traj[0].epoch_count >= self.config.max_events => {
                    traj[0].category = StateCategory::EndOfHorizon;
                    break;
                }
                StateCategory::AwaitEvent(_) => {
                    model.incorporate_event(&mut traj)?;
                }
                StateCategory::AwaitAction(_) => {
                    model.incorporate_action_with(&mut traj, policy)?;
                }
            }
            if warmup_return.is_none() && traj[0].epoch_count == warmup {
                warmup_return = Some(traj[0].cumulative_return);
            }
        }

        Ok(warmup_return.map_or(0.0, |snapshot| traj[0].cumulative_return - snapshot))
    }

    fn summarize_policy(&self, policy: &dyn Policy, returns: &[f64]) -> PolicyComparison {
        let (mean, standard_error) = summarize(returns);
        PolicyComparison {
            policy_id: policy.identifier().to_string(),
            mean,
            standard_error,
            count: returns.len(),
        }
    }

    /// Simulate every policy on the same trajectories
    ///
    /// Results are in the order of `policies`.
    pub fn compare(&mut self, policies: &[PolicyHandle]) -> SimResult<Vec<PolicyComparison>> {
        let mut results = Vec::with_capacity(policies.len());
        for policy in policies {
            let returns = self.returns(policy.as_ref())?;
            results.push(self.summarize_policy(policy.as_ref(), &returns));
        }

        if let Some(best) = results
            .iter()
            .min_by(|a, b| a.mean.total_cmp(&b.mean))
        {
            tracing::info!(
                model = self.model.identifier(),
                policies = results.len(),
                best = %best.policy_id,
                best_mean = best.mean,
                "policy comparison finished"
            );
            let event = Event::ComparisonFinished {
                policies: results.iter().map(|r| r.policy_id.clone()).collect(),
                num_trajectories: self.config.num_trajectories,
                best_policy: best.policy_id.clone(),
            };
            self.event_log.log(event);
        }

        Ok(results)
    }

    /// Paired comparison of two policies
    pub fn compare_pair(
        &mut self,
        first: &PolicyHandle,
        second: &PolicyHandle,
    ) -> SimResult<PairedComparison> {
        let first_returns = self.returns(first.as_ref())?;
        let second_returns = self.returns(second.as_ref())?;

        let differences: Vec<f64> = first_returns
            .iter()
            .zip(second_returns.iter())
            .map(|(a, b)| a - b)
            .collect();
        let (mean_difference, standard_error) = summarize(&differences);

        let first = self.summarize_policy(first.as_ref(), &first_returns);
        let second = self.summarize_policy(second.as_ref(), &second_returns);

        let best_policy = if mean_difference <= 0.0 {
            first.policy_id.clone()
        } else {
            second.policy_id.clone()
        };
        self.event_log.log(Event::ComparisonFinished {
            policies: vec![first.policy_id.clone(), second.policy_id.clone()],
            num_trajectories: self.config.num_trajectories,
            best_policy,
        });

        Ok(PairedComparison {
            first,
            second,
            mean_difference,
            standard_error,
        })
    }
}
