//! Trailing window statistics
//!
//! A fixed-capacity window over the most recent observations, used for the
//! rolling mean and rolling standard deviation features.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Trailing window over the last `period` values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl RollingWindow {
    /// Create a new rolling window with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    /// Push a new value, evicting the oldest one once the window is full
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Mean of the values currently in the window, `None` while empty
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.sum / self.values.len() as f64)
    }

    /// Sample standard deviation (n - 1 denominator), `None` below two values
    pub fn std_dev(&self) -> Option<f64> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }

        // Recompute from the values rather than the running sum; windows are
        // short and this keeps the result free of cancellation drift.
        let mean = self.values.iter().sum::<f64>() / n as f64;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;

        Some(variance.sqrt())
    }

    /// Number of values currently held
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the window holds no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the window holds `period` values
    pub fn is_full(&self) -> bool {
        self.values.len() == self.period
    }

    /// Get the configured period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Reset the window, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}
