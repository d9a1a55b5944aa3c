//! Metrics for evaluating model accuracy on held-out examples

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Fewer test examples than this flag the metrics as low confidence
pub const MIN_CONFIDENT_TEST_SAMPLES: usize = 2;

/// Regression accuracy of one model on the test set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBundle {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Coefficient of determination, 0 when the test labels are constant
    pub r2: f64,
    /// Number of examples the metrics were computed on
    pub test_samples: usize,
    /// Set when too few test examples back the metrics
    pub low_confidence: bool,
}

/// Evaluate predictions against actual values
pub fn evaluate(predicted: &[f64], actual: &[f64]) -> Result<MetricBundle> {
    if predicted.len() != actual.len() || predicted.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "Predicted and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = actual.len() as f64;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    for (p, a) in predicted.iter().zip(actual) {
        let e = a - p;
        abs_sum += e.abs();
        sq_sum += e * e;
    }

    let mean = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let r2 = if ss_tot > 0.0 { 1.0 - sq_sum / ss_tot } else { 0.0 };

    let mse = sq_sum / n;
    Ok(MetricBundle {
        mae: abs_sum / n,
        mse,
        rmse: mse.sqrt(),
        r2,
        test_samples: actual.len(),
        low_confidence: actual.len() < MIN_CONFIDENT_TEST_SAMPLES,
    })
}

impl std::fmt::Display for MetricBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MAE: {:.4}, MSE: {:.4}, RMSE: {:.4}, R2: {:.4} (n = {}{})",
            self.mae,
            self.mse,
            self.rmse,
            self.r2,
            self.test_samples,
            if self.low_confidence { ", low confidence" } else { "" }
        )
    }
}
