//! Gradient-boosted regression trees with squared loss

use super::tree::{RegressionTree, TreeParams};
use super::{ModelKind, Regressor};
use crate::config::BoostingParams;
use crate::error::{ForecastError, Result};
use crate::split::Dataset;
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Gradient boosting regressor
///
/// Starts from the mean label and adds `learning_rate` times a shallow tree
/// fitted to the current residuals at each stage.
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    /// Fit the ensemble on the training set
    pub fn fit(train: &Dataset, params: &BoostingParams, seed: u64) -> Result<Self> {
        if params.n_estimators == 0 {
            return Err(model_error("n_estimators must be positive"));
        }
        if !(params.learning_rate > 0.0 && params.learning_rate <= 1.0) {
            return Err(model_error("learning_rate must be in (0, 1]"));
        }
        if !(params.subsample > 0.0 && params.subsample <= 1.0) {
            return Err(model_error("subsample must be in (0, 1]"));
        }

        let n = train.len();
        let init = train.labels.iter().sum::<f64>() / n as f64;
        let mut current = vec![init; n];

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: None,
        };

        let sample_size = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let all_rows: Vec<usize> = (0..n).collect();

        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = train
                .labels
                .iter()
                .zip(&current)
                .map(|(y, f)| y - f)
                .collect();

            let rows = if sample_size < n {
                let mut rows = index::sample(&mut rng, n, sample_size).into_vec();
                rows.sort_unstable();
                rows
            } else {
                all_rows.clone()
            };

            let tree = RegressionTree::fit(&train.features, &residuals, &rows, &tree_params, &mut rng);
            for (f, row) in current.iter_mut().zip(&train.features) {
                *f += params.learning_rate * tree.predict_one(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for GradientBoosting {
    fn predict_one(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.init, |acc, t| acc + self.learning_rate * t.predict_one(features))
    }
}

fn model_error(message: &str) -> ForecastError {
    ForecastError::ModelError {
        kind: ModelKind::GradientBoosting,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces_training_error_over_stages() {
        let features: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let labels: Vec<f64> = (0..30).map(|i| (i as f64 / 3.0).sin() * 10.0 + 20.0).collect();
        let data = Dataset::new(features, labels).unwrap();

        let mse = |n_estimators: usize| {
            let params = BoostingParams {
                n_estimators,
                ..Default::default()
            };
            let model = GradientBoosting::fit(&data, &params, 42).unwrap();
            data.features
                .iter()
                .zip(&data.labels)
                .map(|(x, y)| (model.predict_one(x) - y).powi(2))
                .sum::<f64>()
                / data.len() as f64
        };

        assert!(mse(50) < mse(5));
    }

    #[test]
    fn constant_labels_predict_the_constant() {
        let data = Dataset::new(vec![vec![1.0], vec![2.0], vec![3.0]], vec![4.0; 3]).unwrap();
        let model = GradientBoosting::fit(&data, &BoostingParams::default(), 0).unwrap();
        assert!((model.predict_one(&[10.0]) - 4.0).abs() < 1e-12);
    }
}
