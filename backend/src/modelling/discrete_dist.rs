//! Integer-valued distributions with finite support

use crate::core::{SimError, SimResult};
use crate::rng::RandomStream;
use serde::{Deserialize, Serialize};

/// Probabilities summing to within this of 1 are accepted and renormalised
const PMF_TOLERANCE: f64 = 1e-6;

/// Tail mass dropped when truncating unbounded distributions
const TAIL_MASS: f64 = 1e-12;

/// Above this mean `exp(-mean)` underflows
const MAX_POISSON_MEAN: f64 = 500.0;

/// Distribution over `min..=max`
///
/// # Example
/// ```
/// use decision_simulator_core_rs::modelling::DiscreteDist;
/// use decision_simulator_core_rs::RandomStream;
///
/// let demand = DiscreteDist::from_pmf(2, vec![0.25, 0.5, 0.25]).unwrap();
/// assert_eq!(demand.mean(), 3.0);
/// assert_eq!(demand.fractile(0.5), 3);
///
/// let two_days = demand.add(&demand);
/// assert_eq!(two_days.min(), 4);
/// assert_eq!(two_days.max(), 8);
///
/// let mut rng = RandomStream::new(1);
/// assert!((2..=4).contains(&demand.sample(&mut rng)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteDist {
    min: i64,
    probs: Vec<f64>,
}

impl DiscreteDist {
    /// `probs[i]` is the probability of `min + i`
    ///
    /// # Errors
    /// `Configuration` if `probs` is empty, has a negative or non-finite
    /// entry, or does not sum to 1.
    pub fn from_pmf(min: i64, probs: Vec<f64>) -> SimResult<Self> {
        if probs.is_empty() {
            return Err(SimError::Configuration(
                "distribution needs at least one probability".to_string(),
            ));
        }
        if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(SimError::Configuration(
                "probabilities must be finite and non-negative".to_string(),
            ));
        }
        let total: f64 = probs.iter().sum();
        if (total - 1.0).abs() > PMF_TOLERANCE {
            return Err(SimError::Configuration(format!(
                "probabilities sum to {}, expected 1",
                total
            )));
        }
        Ok(Self {
            min,
            probs: probs.into_iter().map(|p| p / total).collect(),
        })
    }

    pub fn constant(value: i64) -> Self {
        Self {
            min: value,
            probs: vec![1.0],
        }
    }

    /// Uniform over `min..=max`
    pub fn uniform(min: i64, max: i64) -> SimResult<Self> {
        if max < min {
            return Err(SimError::Configuration(format!(
                "uniform distribution needs min <= max, got {}..={}",
                min, max
            )));
        }
        let n = (max - min + 1) as usize;
        Ok(Self {
            min,
            probs: vec![1.0 / n as f64; n],
        })
    }

    /// Poisson with the given mean (at most 500), truncated where the tail
    /// drops below 1e-12
    pub fn poisson(mean: f64) -> SimResult<Self> {
        if !(mean.is_finite() && (0.0..=MAX_POISSON_MEAN).contains(&mean)) {
            return Err(SimError::Configuration(format!(
                "poisson mean must lie in [0, {}], got {}",
                MAX_POISSON_MEAN, mean
            )));
        }
        if mean == 0.0 {
            return Ok(Self::constant(0));
        }

        let mut probs = Vec::new();
        let mut p = (-mean).exp();
        let mut cumulative = 0.0;
        let mut k = 0.0;
        // Walk past the mode before testing the tail
        while cumulative < 1.0 - TAIL_MASS || k <= mean {
            probs.push(p);
            cumulative += p;
            k += 1.0;
            p *= mean / k;
        }
        let total: f64 = probs.iter().sum();
        Ok(Self {
            min: 0,
            probs: probs.into_iter().map(|p| p / total).collect(),
        })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.min + self.probs.len() as i64 - 1
    }

    pub fn probability(&self, value: i64) -> f64 {
        usize::try_from(value - self.min)
            .ok()
            .and_then(|i| self.probs.get(i).copied())
            .unwrap_or(0.0)
    }

    /// `(value, probability)` pairs in ascending value order
    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.probs
            .iter()
            .enumerate()
            .map(move |(i, p)| (self.min + i as i64, *p))
    }

    pub fn mean(&self) -> f64 {
        self.iter().map(|(v, p)| v as f64 * p).sum()
    }

    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.iter()
            .map(|(v, p)| {
                let d = v as f64 - mean;
                d * d * p
            })
            .sum()
    }

    /// Smallest value whose cumulative probability reaches `q`
    pub fn fractile(&self, q: f64) -> i64 {
        let mut cumulative = 0.0;
        for (value, p) in self.iter() {
            cumulative += p;
            if cumulative >= q {
                return value;
            }
        }
        self.max()
    }

    /// Inverse-transform sample
    pub fn sample(&self, rng: &mut RandomStream) -> i64 {
        let u = rng.next_f64();
        self.fractile_strict(u)
    }

    /// Smallest value whose cumulative probability exceeds `u`
    fn fractile_strict(&self, u: f64) -> i64 {
        let mut cumulative = 0.0;
        for (value, p) in self.iter() {
            cumulative += p;
            if u < cumulative {
                return value;
            }
        }
        self.max()
    }

    /// Distribution of the sum of independent draws from `self` and `other`
    pub fn add(&self, other: &DiscreteDist) -> DiscreteDist {
        let mut probs = vec![0.0; self.probs.len() + other.probs.len() - 1];
        for (i, p) in self.probs.iter().enumerate() {
            for (j, q) in other.probs.iter().enumerate() {
                probs[i + j] += p * q;
            }
        }
        DiscreteDist {
            min: self.min + other.min,
            probs,
        }
    }
}
