//! Running statistics of sampled returns

use serde::{Deserialize, Serialize};

/// Sampled returns of one candidate action
///
/// Keeps count, sum and sum of squares so evaluations from different rounds
/// or threads can be merged without storing the samples.
///
/// # Example
/// ```
/// use decision_simulator_core_rs::rollout::ActionEvaluation;
///
/// let mut eval = ActionEvaluation::new(2);
/// eval.record(4.0);
/// eval.record(6.0);
/// assert_eq!(eval.mean(), 5.0);
/// assert_eq!(eval.count, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionEvaluation {
    pub action: i64,
    pub count: usize,
    pub sum: f64,
    pub sum_of_squares: f64,
}

impl ActionEvaluation {
    pub fn new(action: i64) -> Self {
        Self {
            action,
            count: 0,
            sum: 0.0,
            sum_of_squares: 0.0,
        }
    }

    pub fn record(&mut self, score: f64) {
        self.count += 1;
        self.sum += score;
        self.sum_of_squares += score * score;
    }

    /// Fold another evaluation of the same action into this one
    pub fn merge(&mut self, other: &ActionEvaluation) {
        debug_assert_eq!(self.action, other.action);
        self.count += other.count;
        self.sum += other.sum;
        self.sum_of_squares += other.sum_of_squares;
    }

    /// Sample mean; 0 when nothing was sampled
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Unbiased sample variance; 0 with fewer than two samples
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        ((self.sum_of_squares - self.sum * self.sum / n) / (n - 1.0)).max(0.0)
    }

    /// Standard error of the mean
    pub fn standard_error(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.variance() / self.count as f64).sqrt()
    }
}
