//! Table-driven fixed-point iteration
//!
//! Solves value equations `V(v) = update(v, V)` over a bounded integer domain
//! `min..=max` by repeated in-place sweeps in ascending order, until the
//! largest change of a sweep drops below the tolerance or the iteration cap
//! is hit. Equations where `V(v)` only depends on smaller `v` converge in a
//! single sweep plus one confirming sweep.
//!
//! # Example
//!
//! Expected leftover capacity when filling a reel of size `v` with items of
//! weight 2 or 3 (equally likely) until the next item does not fit:
//!
//! ```
//! use decision_simulator_core_rs::modelling::{FixedPointConfig, ValueTable};
//!
//! let weights = [2i64, 3];
//! let table = ValueTable::solve(0, 20, &FixedPointConfig::default(), |v, values| {
//!     weights
//!         .iter()
//!         .map(|&w| 0.5 * if w <= v { values.get(v - w).unwrap_or(0.0) } else { v as f64 })
//!         .sum()
//! })
//! .unwrap();
//!
//! assert_eq!(table.get(0), Some(0.0));
//! assert_eq!(table.get(1), Some(1.0));
//! assert_eq!(table.get(2), Some(1.0)); // ½·V(0) + ½·2
//! ```

use crate::core::{SimError, SimResult};
use serde::{Deserialize, Serialize};

fn default_tolerance() -> f64 {
    1e-9
}

fn default_max_iterations() -> usize {
    10_000
}

/// Convergence settings of [`ValueTable::solve`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedPointConfig {
    /// Stop once no value changes by more than this in a sweep
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for FixedPointConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Read access to the table while it is being solved
pub struct ValueView<'a> {
    min: i64,
    values: &'a [f64],
}

impl ValueView<'_> {
    /// Current value at `v`, `None` outside the domain
    pub fn get(&self, v: i64) -> Option<f64> {
        usize::try_from(v - self.min)
            .ok()
            .and_then(|i| self.values.get(i).copied())
    }
}

/// Solved values over `min..=max`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueTable {
    min: i64,
    values: Vec<f64>,
    iterations: usize,
    residual: f64,
}

impl ValueTable {
    /// Iterate `update` to a fixed point, starting from all zeros
    ///
    /// # Errors
    /// `Configuration` if the domain is empty, the tolerance is not positive,
    /// an update produces a non-finite value, or the iteration cap is reached
    /// before convergence.
    pub fn solve<F>(min: i64, max: i64, config: &FixedPointConfig, mut update: F) -> SimResult<Self>
    where
        F: FnMut(i64, &ValueView<'_>) -> f64,
    {
        if max < min {
            return Err(SimError::Configuration(format!(
                "value table domain {}..={} is empty",
                min, max
            )));
        }
        if !(config.tolerance > 0.0) {
            return Err(SimError::Configuration(format!(
                "tolerance must be positive, got {}",
                config.tolerance
            )));
        }

        let mut values = vec![0.0; (max - min + 1) as usize];
        let mut residual = f64::INFINITY;

        for iteration in 1..=config.max_iterations {
            residual = 0.0;
            for (i, v) in (min..=max).enumerate() {
                let new_value = update(v, &ValueView { min, values: &values });
                if !new_value.is_finite() {
                    return Err(SimError::Configuration(format!(
                        "value table update diverged at {} (iteration {})",
                        v, iteration
                    )));
                }
                residual = residual.max((new_value - values[i]).abs());
                values[i] = new_value;
            }

            if residual < config.tolerance {
                return Ok(Self {
                    min,
                    values,
                    iterations: iteration,
                    residual,
                });
            }
        }

        Err(SimError::Configuration(format!(
            "value table did not converge within {} iterations (residual {})",
            config.max_iterations, residual
        )))
    }

    pub fn get(&self, v: i64) -> Option<f64> {
        usize::try_from(v - self.min)
            .ok()
            .and_then(|i| self.values.get(i).copied())
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.min + self.values.len() as i64 - 1
    }

    /// Sweeps performed, including the converged one
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Largest change in the final sweep
    pub fn residual(&self) -> f64 {
        self.residual
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, value)| (self.min + i as i64, *value))
    }
}
