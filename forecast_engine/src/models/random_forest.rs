//! Bagged regression trees

use super::tree::{RegressionTree, TreeParams};
use super::{ModelKind, Regressor};
use crate::config::ForestParams;
use crate::error::{ForecastError, Result};
use crate::split::Dataset;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Random forest regressor
///
/// Each tree is grown on its own bootstrap sample drawn from a ChaCha RNG
/// seeded with `seed + tree_index`, so the fitted forest does not depend on
/// how rayon schedules the trees.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Fit a forest on the training set
    pub fn fit(train: &Dataset, params: &ForestParams, seed: u64) -> Result<Self> {
        if params.n_trees == 0 {
            return Err(ForecastError::ModelError {
                kind: ModelKind::RandomForest,
                message: "n_trees must be positive".to_string(),
            });
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features,
        };

        let trees: Vec<RegressionTree> = (0..params.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
                let sample = train.bootstrap_indices(&mut rng);
                RegressionTree::fit(&train.features, &train.labels, &sample, &tree_params, &mut rng)
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn predict_one(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_one(features)).sum();
        sum / self.trees.len() as f64
    }
}
