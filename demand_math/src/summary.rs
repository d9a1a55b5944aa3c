//! Descriptive statistics over a series of values

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

/// Mean, median, sample standard deviation and range of a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of observations
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Median
    pub median: f64,
    /// Sample standard deviation, 0 for a single observation
    pub std: f64,
    /// Smallest observation
    pub min: f64,
    /// Largest observation
    pub max: f64,
}

impl Summary {
    /// Summarize a non-empty slice of finite values
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot summarize an empty series".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Series contains non-finite values".to_string(),
            ));
        }

        let mean = values.iter().mean();
        let std = if values.len() > 1 {
            values.iter().std_dev()
        } else {
            0.0
        };
        let median = Data::new(values.to_vec()).median();
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        Ok(Self {
            count: values.len(),
            mean,
            median,
            std,
            min,
            max,
        })
    }

    /// Median of a non-empty slice
    pub fn median_of(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(Data::new(values.to_vec()).median())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn summarizes_series() {
        let summary = Summary::from_values(&[100.0, 120.0, 95.0, 105.0]).unwrap();

        assert_eq!(summary.count, 4);
        assert_relative_eq!(summary.mean, 105.0);
        assert_relative_eq!(summary.median, 102.5);
        assert_relative_eq!(summary.min, 95.0);
        assert_relative_eq!(summary.max, 120.0);
        // squared deviations 25 + 225 + 100 + 0 = 350, sample variance 350/3
        assert_relative_eq!(summary.std, (350.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn single_value_has_zero_spread() {
        let summary = Summary::from_values(&[7.0]).unwrap();
        assert_eq!(summary.std, 0.0);
        assert_eq!(summary.median, 7.0);
    }

    #[test]
    fn rejects_empty_and_non_finite() {
        assert!(Summary::from_values(&[]).is_err());
        assert!(Summary::from_values(&[1.0, f64::NAN]).is_err());
        assert_eq!(Summary::median_of(&[]), None);
    }
}
