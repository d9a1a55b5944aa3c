//! Engine configuration
//!
//! Every numeric policy of the engine (minimum record count, lag periods,
//! rolling window, interval level, model hyperparameters, bulk fan-out) lives
//! here with its default. `EngineConfig::from_env` overlays `DEMAND_*`
//! environment variables on top of the defaults.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum number of records required before training can run
pub const DEFAULT_MIN_RECORDS: usize = 10;

/// Largest accepted test fraction
pub const MAX_TEST_FRACTION: f64 = 0.5;

/// Feature builder policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Lags, in periods, of the demand lag features
    pub lag_periods: Vec<usize>,
    /// Trailing window of the rolling mean and standard deviation features
    pub rolling_window: usize,
    /// Minimum number of records required to build a training table
    pub min_records: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lag_periods: vec![1, 7, 30],
            rolling_window: 7,
            min_records: DEFAULT_MIN_RECORDS,
        }
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (all if None)
    pub max_features: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Number of boosting iterations (trees)
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples required in a leaf node
    pub min_samples_leaf: usize,
    /// Subsample ratio of the training instances
    pub subsample: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 3,
            learning_rate: 0.1,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
        }
    }
}

/// Least-squares hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    /// Standardize features before fitting
    pub standardize: bool,
    /// Diagonal jitter added to the normal equations
    pub ridge: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            standardize: true,
            ridge: 1e-8,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub features: FeatureConfig,
    /// Default share of examples held out for evaluation
    pub test_fraction: f64,
    /// Default seed for the split and the tree ensembles
    pub seed: u64,
    /// Two-sided coverage of the confidence interval
    pub confidence_level: f64,
    /// Longest accepted prediction range, in days
    pub max_horizon_days: usize,
    /// Worker threads for bulk forecasts
    pub bulk_workers: usize,
    /// Optional deadline for a whole bulk batch
    pub bulk_timeout: Option<Duration>,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
    pub linear: LinearParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            test_fraction: 0.2,
            seed: 42,
            confidence_level: 0.95,
            max_horizon_days: 366,
            bulk_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            bulk_timeout: None,
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
            linear: LinearParams::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `DEMAND_*` environment variable that is set
    ///
    /// A variable that is set but does not parse is an
    /// [`ForecastError::InvalidParameter`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `DEMAND_*` key
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = Self::default();

        if let Some(n) = parse_var::<usize>(&lookup, "DEMAND_MIN_RECORDS")? {
            out.features.min_records = n;
        }
        if let Some(n) = parse_var::<usize>(&lookup, "DEMAND_ROLLING_WINDOW")? {
            out.features.rolling_window = n;
        }
        if let Some(f) = parse_var::<f64>(&lookup, "DEMAND_TEST_FRACTION")? {
            out.test_fraction = f;
        }
        if let Some(seed) = parse_var::<u64>(&lookup, "DEMAND_SEED")? {
            out.seed = seed;
        }
        if let Some(level) = parse_var::<f64>(&lookup, "DEMAND_CONFIDENCE_LEVEL")? {
            out.confidence_level = level;
        }
        if let Some(days) = parse_var::<usize>(&lookup, "DEMAND_MAX_HORIZON_DAYS")? {
            out.max_horizon_days = days;
        }
        if let Some(n) = parse_var::<usize>(&lookup, "DEMAND_BULK_WORKERS")? {
            out.bulk_workers = n;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "DEMAND_BULK_TIMEOUT_MS")? {
            out.bulk_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(n) = parse_var::<usize>(&lookup, "DEMAND_FOREST_TREES")? {
            out.forest.n_trees = n;
        }
        if let Some(n) = parse_var::<usize>(&lookup, "DEMAND_BOOSTING_ESTIMATORS")? {
            out.boosting.n_estimators = n;
        }

        Ok(out)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.features.min_records < 2 {
            return Err(ForecastError::InvalidParameter(
                "min_records must be at least 2".to_string(),
            ));
        }
        if self.features.rolling_window == 0 {
            return Err(ForecastError::InvalidParameter(
                "rolling_window must be positive".to_string(),
            ));
        }
        if self.features.lag_periods.is_empty() || self.features.lag_periods.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "lag_periods must be non-empty and positive".to_string(),
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "confidence_level must be in (0, 1) (got {})",
                self.confidence_level
            )));
        }
        if self.max_horizon_days == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_horizon_days must be positive".to_string(),
            ));
        }
        if self.bulk_workers == 0 {
            return Err(ForecastError::InvalidParameter(
                "bulk_workers must be positive".to_string(),
            ));
        }
        if self.forest.n_trees == 0 || self.boosting.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "ensembles need at least one tree".to_string(),
            ));
        }
        if !(self.boosting.learning_rate > 0.0 && self.boosting.learning_rate <= 1.0) {
            return Err(ForecastError::InvalidParameter(
                "boosting learning_rate must be in (0, 1]".to_string(),
            ));
        }
        if !(self.boosting.subsample > 0.0 && self.boosting.subsample <= 1.0) {
            return Err(ForecastError::InvalidParameter(
                "boosting subsample must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamp a requested test fraction into (0, 0.5]
    pub fn clamp_test_fraction(fraction: f64) -> f64 {
        if fraction.is_nan() {
            return MAX_TEST_FRACTION;
        }
        fraction.clamp(f64::EPSILON, MAX_TEST_FRACTION)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            ForecastError::InvalidParameter(format!("{key}={raw:?} does not parse: {e}"))
        }),
    }
}
