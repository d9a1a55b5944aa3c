//! Ordinary least squares on standardized features

use super::{ModelKind, Regressor};
use crate::config::LinearParams;
use crate::error::{ForecastError, Result};
use crate::split::Dataset;
use demand_math::solve_symmetric;

/// Linear regression fitted through the normal equations
#[derive(Debug, Clone)]
pub struct LinearRegression {
    means: Vec<f64>,
    scales: Vec<f64>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearRegression {
    /// Fit on the training set
    ///
    /// Features are centered and scaled by their population standard
    /// deviation (constant columns keep scale 1). `ridge` is added to the
    /// diagonal of the feature block so collinear columns stay solvable.
    pub fn fit(train: &Dataset, params: &LinearParams) -> Result<Self> {
        let n = train.len();
        let p = train.n_features();
        if n == 0 {
            return Err(model_error("Training set is empty"));
        }

        let (means, scales) = if params.standardize {
            column_moments(&train.features, p)
        } else {
            (vec![0.0; p], vec![1.0; p])
        };

        // design row: [1, z_1, ..., z_p]
        let dim = p + 1;
        let mut xtx = vec![vec![0.0; dim]; dim];
        let mut xty = vec![0.0; dim];
        let mut z = vec![0.0; dim];
        for (row, &y) in train.features.iter().zip(&train.labels) {
            z[0] = 1.0;
            for j in 0..p {
                z[j + 1] = (row[j] - means[j]) / scales[j];
            }
            for a in 0..dim {
                xty[a] += z[a] * y;
                for b in a..dim {
                    xtx[a][b] += z[a] * z[b];
                }
            }
        }
        for a in 0..dim {
            for b in 0..a {
                xtx[a][b] = xtx[b][a];
            }
        }
        for (j, row) in xtx.iter_mut().enumerate().skip(1) {
            row[j] += params.ridge.max(0.0) * n as f64;
        }

        let beta = solve_symmetric(&xtx, &xty).map_err(|e| model_error(&e.to_string()))?;
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(model_error("Solution contains non-finite coefficients"));
        }

        Ok(Self {
            means,
            scales,
            intercept: beta[0],
            coefficients: beta[1..].to_vec(),
        })
    }

    /// Coefficients on the standardized scale
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for LinearRegression {
    fn predict_one(&self, features: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .fold(self.intercept, |acc, (j, c)| {
                let x = features.get(j).copied().unwrap_or(self.means[j]);
                acc + c * (x - self.means[j]) / self.scales[j]
            })
    }
}

fn column_moments(rows: &[Vec<f64>], p: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len().max(1) as f64;
    let mut means = vec![0.0; p];
    for row in rows {
        for (m, x) in means.iter_mut().zip(row) {
            *m += x;
        }
    }
    means.iter_mut().for_each(|m| *m /= n);

    let mut scales = vec![0.0; p];
    for row in rows {
        for j in 0..p {
            scales[j] += (row[j] - means[j]).powi(2);
        }
    }
    for s in scales.iter_mut() {
        let sd = (*s / n).sqrt();
        *s = if sd > 1e-12 { sd } else { 1.0 };
    }
    (means, scales)
}

fn model_error(message: &str) -> ForecastError {
    ForecastError::ModelError {
        kind: ModelKind::LinearRegression,
        message: message.to_string(),
    }
}
