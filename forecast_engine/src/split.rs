//! Seeded train/test splitting of a feature table

use crate::config::EngineConfig;
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Row-major feature matrix with one label per row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl Dataset {
    /// Create a new dataset, checking that rows and labels line up
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<f64>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(ForecastError::DataError(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if let Some(width) = features.first().map(Vec::len) {
            if features.iter().any(|row| row.len() != width) {
                return Err(ForecastError::DataError(
                    "Feature rows have inconsistent widths".to_string(),
                ));
            }
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// Rows at the given indices, in index order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Indices of a bootstrap sample (with replacement) of the same size
    pub fn bootstrap_indices<R: Rng>(&self, rng: &mut R) -> Vec<usize> {
        let n = self.len();
        (0..n).map(|_| rng.gen_range(0..n)).collect()
    }
}

/// Number of test examples for `n` rows at a clamped fraction
///
/// `ceil(n * fraction)`, at least 1, leaving at least one training row.
pub fn test_size(n: usize, fraction: f64) -> usize {
    let fraction = EngineConfig::clamp_test_fraction(fraction);
    let size = (n as f64 * fraction).ceil() as usize;
    size.max(1).min(n.saturating_sub(1))
}

/// Shuffle the table's rows with a seeded ChaCha RNG and hold out a test set
pub fn split(table: &FeatureTable, test_fraction: f64, seed: u64) -> Result<(Dataset, Dataset)> {
    let n = table.len();
    if n < 2 {
        return Err(ForecastError::DataError(format!(
            "Need at least 2 examples to split, got {n}"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = test_size(n, test_fraction);
    let (test_idx, train_idx) = indices.split_at(n_test);

    let full = table.to_dataset()?;
    Ok((full.subset(train_idx), full.subset(test_idx)))
}
