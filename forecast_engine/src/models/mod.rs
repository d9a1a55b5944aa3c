//! Regression model families
//!
//! The engine trains a closed set of model families. [`ModelKind`] names them
//! and [`FittedModel`] holds one fitted instance of any family behind the
//! shared [`Regressor`] interface.

use crate::config::EngineConfig;
use crate::error::{ForecastError, Result};
use crate::split::Dataset;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::str::FromStr;

pub mod gradient_boosting;
pub mod linear;
pub mod random_forest;
pub mod tree;

pub use gradient_boosting::GradientBoosting;
pub use linear::LinearRegression;
pub use random_forest::RandomForest;
pub use tree::{RegressionTree, TreeParams};

/// Model families, declared in tie-break priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
    LinearRegression,
}

impl ModelKind {
    /// Every family, in priority order
    pub const ALL: [ModelKind; 3] = [
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::LinearRegression,
    ];

    /// Tie-break rank, lower wins
    pub fn priority(self) -> usize {
        match self {
            ModelKind::RandomForest => 0,
            ModelKind::GradientBoosting => 1,
            ModelKind::LinearRegression => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::LinearRegression => "linear_regression",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random_forest" | "rf" => Ok(ModelKind::RandomForest),
            "gradient_boosting" | "gb" | "gbr" => Ok(ModelKind::GradientBoosting),
            "linear_regression" | "linear" | "lr" => Ok(ModelKind::LinearRegression),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown model kind: {other}"
            ))),
        }
    }
}

/// A fitted regression model
pub trait Regressor: Debug + Send + Sync {
    /// Predict the label of a single feature row
    fn predict_one(&self, features: &[f64]) -> f64;

    /// Predict every row
    fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_one(row)).collect()
    }
}

/// A fitted instance of one model family
#[derive(Debug, Clone)]
pub enum FittedModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    LinearRegression(LinearRegression),
}

impl FittedModel {
    /// Fit the requested family on a training set
    pub fn fit(kind: ModelKind, train: &Dataset, config: &EngineConfig, seed: u64) -> Result<Self> {
        if train.is_empty() {
            return Err(ForecastError::ModelError {
                kind,
                message: "Training set is empty".to_string(),
            });
        }

        let fitted = match kind {
            ModelKind::RandomForest => {
                FittedModel::RandomForest(RandomForest::fit(train, &config.forest, seed)?)
            }
            ModelKind::GradientBoosting => {
                FittedModel::GradientBoosting(GradientBoosting::fit(train, &config.boosting, seed)?)
            }
            ModelKind::LinearRegression => {
                FittedModel::LinearRegression(LinearRegression::fit(train, &config.linear)?)
            }
        };
        Ok(fitted)
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            FittedModel::RandomForest(_) => ModelKind::RandomForest,
            FittedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
            FittedModel::LinearRegression(_) => ModelKind::LinearRegression,
        }
    }

    fn regressor(&self) -> &dyn Regressor {
        match self {
            FittedModel::RandomForest(m) => m,
            FittedModel::GradientBoosting(m) => m,
            FittedModel::LinearRegression(m) => m,
        }
    }
}

impl Regressor for FittedModel {
    fn predict_one(&self, features: &[f64]) -> f64 {
        self.regressor().predict_one(features)
    }
}
