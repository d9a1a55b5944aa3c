//! Feature engineering for demand records
//!
//! A [`FeatureBuilder`] turns an ingested [`DemandStore`] into a numeric
//! [`FeatureTable`] and the [`FeaturePipeline`] that produced it. The pipeline
//! fixes the feature schema, the category encoders and the fill values, and
//! is reused at prediction time so forward vectors line up column by column
//! with the training rows.
//!
//! Lag and rolling features come from an [`EntityHistory`], an incremental
//! buffer of one entity's prior demand values. Training rows are built by
//! reading the history *before* pushing the row's own value, so no row ever
//! sees its own label or anything later.

use crate::config::FeatureConfig;
use crate::data::{DemandRecord, DemandStore, EntityKey};
use crate::error::{ForecastError, Result};
use crate::split::Dataset;
use chrono::{Datelike, NaiveDate};
use demand_math::{RollingWindow, Summary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Code assigned to categories not seen when the encoder was fitted
pub const UNKNOWN_CODE: f64 = -1.0;

/// Label used for records without a weather condition
pub const MISSING_WEATHER: &str = "none";

/// Seasonality factor assumed when a record has none
pub const DEFAULT_SEASONALITY: f64 = 1.0;

/// One row of features, in schema order
pub type FeatureVector = Vec<f64>;

/// Ordered feature names shared by every vector of one configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Schema implied by a feature configuration
    pub fn from_config(config: &FeatureConfig) -> Self {
        let mut names: Vec<String> = [
            "year",
            "month",
            "day_of_week",
            "quarter",
            "price",
            "promotion",
            "seasonality_factor",
            "entity_code",
            "weather_code",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        for lag in &config.lag_periods {
            names.push(format!("demand_lag_{lag}"));
        }
        names.push(format!("demand_rolling_mean_{}", config.rolling_window));
        names.push(format!("demand_rolling_std_{}", config.rolling_window));

        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Maps category labels to their index in the sorted label set
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryEncoder {
    labels: Vec<String>,
}

impl CategoryEncoder {
    /// Fit on every label observed
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        Self {
            labels: set.into_iter().collect(),
        }
    }

    /// Code of a label, [`UNKNOWN_CODE`] when it was not seen at fit time
    pub fn encode(&self, label: &str) -> f64 {
        self.labels
            .binary_search_by(|l| l.as_str().cmp(label))
            .map_or(UNKNOWN_CODE, |i| i as f64)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Incremental lag and rolling-window state for one entity
#[derive(Debug, Clone)]
pub struct EntityHistory {
    lag_periods: Vec<usize>,
    recent: VecDeque<f64>,
    capacity: usize,
    sum: f64,
    count: usize,
    window: RollingWindow,
}

impl EntityHistory {
    /// Empty history for a feature configuration
    pub fn new(config: &FeatureConfig) -> Result<Self> {
        let capacity = config.lag_periods.iter().copied().max().unwrap_or(1);
        Ok(Self {
            lag_periods: config.lag_periods.clone(),
            recent: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
            count: 0,
            window: RollingWindow::new(config.rolling_window)?,
        })
    }

    /// Record the next observed (or predicted) demand value
    pub fn push(&mut self, value: f64) {
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(value);
        self.sum += value;
        self.count += 1;
        self.window.push(value);
    }

    /// Number of values pushed so far
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean of every value pushed, 0 when empty
    pub fn running_mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Value `periods` observations back, or the running mean if history is shorter
    pub fn lag(&self, periods: usize) -> f64 {
        if periods == 0 || periods > self.recent.len() {
            return self.running_mean();
        }
        self.recent[self.recent.len() - periods]
    }

    /// Trailing mean over the window, 0 when empty
    pub fn rolling_mean(&self) -> f64 {
        self.window.mean().unwrap_or(0.0)
    }

    /// Trailing sample standard deviation, 0 below two values
    pub fn rolling_std(&self) -> f64 {
        self.window.std_dev().unwrap_or(0.0)
    }

    /// Lag features followed by the rolling mean and std, in schema order
    fn demand_features(&self) -> impl Iterator<Item = f64> + '_ {
        self.lag_periods
            .iter()
            .map(|&p| self.lag(p))
            .chain([self.rolling_mean(), self.rolling_std()])
    }
}

/// Exogenous attributes attached to one row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exogenous {
    pub price: Option<f64>,
    pub promotion: Option<bool>,
    pub weather_condition: Option<String>,
    pub seasonality_factor: Option<f64>,
}

impl From<&DemandRecord> for Exogenous {
    fn from(record: &DemandRecord) -> Self {
        Self {
            price: record.price,
            promotion: record.promotion,
            weather_condition: record.weather_condition.clone(),
            seasonality_factor: record.seasonality_factor,
        }
    }
}

/// Fitted schema, encoders and fill values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    config: FeatureConfig,
    schema: FeatureSchema,
    entity_encoder: CategoryEncoder,
    weather_encoder: CategoryEncoder,
    price_fill: f64,
}

impl FeaturePipeline {
    /// Fit encoders and fill values on a store
    pub fn fit(store: &DemandStore, config: &FeatureConfig) -> Result<Self> {
        let entity_encoder = CategoryEncoder::fit(store.entities().map(|e| e.to_string()));
        let weather_encoder = CategoryEncoder::fit(store.records().iter().map(|r| {
            r.weather_condition
                .clone()
                .unwrap_or_else(|| MISSING_WEATHER.to_string())
        }));

        let prices: Vec<f64> = store.records().iter().filter_map(|r| r.price).collect();
        let price_fill = Summary::median_of(&prices).unwrap_or(0.0);

        Ok(Self {
            config: config.clone(),
            schema: FeatureSchema::from_config(config),
            entity_encoder,
            weather_encoder,
            price_fill,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Price substituted when a row has none
    pub fn price_fill(&self) -> f64 {
        self.price_fill
    }

    pub fn entity_encoder(&self) -> &CategoryEncoder {
        &self.entity_encoder
    }

    pub fn weather_encoder(&self) -> &CategoryEncoder {
        &self.weather_encoder
    }

    /// Fresh history matching this pipeline's lags and window
    pub fn new_history(&self) -> Result<EntityHistory> {
        EntityHistory::new(&self.config)
    }

    /// Build the vector for `entity` on `date` from the history before that date
    pub fn vector(
        &self,
        entity: &EntityKey,
        date: NaiveDate,
        exogenous: &Exogenous,
        history: &EntityHistory,
    ) -> FeatureVector {
        let mut row = Vec::with_capacity(self.schema.len());
        row.extend(time_features(date));
        row.push(exogenous.price.unwrap_or(self.price_fill));
        row.push(if exogenous.promotion.unwrap_or(false) {
            1.0
        } else {
            0.0
        });
        row.push(exogenous.seasonality_factor.unwrap_or(DEFAULT_SEASONALITY));
        row.push(self.entity_encoder.encode(&entity.to_string()));
        row.push(
            self.weather_encoder
                .encode(exogenous.weather_condition.as_deref().unwrap_or(MISSING_WEATHER)),
        );
        row.extend(history.demand_features());
        row
    }

    /// One row per record of the store, in entity/time order
    ///
    /// Lag and rolling features use only records with an earlier timestamp.
    pub fn transform(&self, store: &DemandStore) -> Result<FeatureTable> {
        let mut rows = Vec::with_capacity(store.len());
        let mut labels = Vec::with_capacity(store.len());
        let mut keys = Vec::with_capacity(store.len());

        for (entity, records) in store.entity_histories() {
            let mut history = self.new_history()?;
            let mut start = 0;
            while start < records.len() {
                // records sharing a timestamp all see the same prior history
                let timestamp = records[start].timestamp;
                let end = start
                    + records[start..]
                        .iter()
                        .take_while(|r| r.timestamp == timestamp)
                        .count();
                let group = &records[start..end];

                for record in group {
                    rows.push(self.vector(entity, record.date(), &Exogenous::from(record), &history));
                    labels.push(record.demand_value);
                    keys.push((entity.clone(), record.date()));
                }
                for record in group {
                    history.push(record.demand_value);
                }
                start = end;
            }
        }

        Ok(FeatureTable {
            schema: self.schema.clone(),
            rows,
            labels,
            keys,
        })
    }
}

/// Year, month, day of week (Monday = 0) and quarter
pub fn time_features(date: NaiveDate) -> [f64; 4] {
    [
        date.year() as f64,
        date.month() as f64,
        date.weekday().num_days_from_monday() as f64,
        ((date.month() - 1) / 3 + 1) as f64,
    ]
}

/// Feature rows with their labels and source keys
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    schema: FeatureSchema,
    rows: Vec<FeatureVector>,
    labels: Vec<f64>,
    keys: Vec<(EntityKey, NaiveDate)>,
}

impl FeatureTable {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Entity and date each row was derived from
    pub fn keys(&self) -> &[(EntityKey, NaiveDate)] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of a named feature in row `i`
    pub fn value(&self, i: usize, name: &str) -> Option<f64> {
        let col = self.schema.index_of(name)?;
        self.rows.get(i).map(|row| row[col])
    }

    pub fn to_dataset(&self) -> Result<Dataset> {
        Dataset::new(self.rows.clone(), self.labels.clone())
    }
}

/// Builds feature tables under one configuration
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    /// Create a new feature builder
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Fit the pipeline on the store and transform every record
    pub fn build(&self, store: &DemandStore) -> Result<(FeatureTable, FeaturePipeline)> {
        if store.len() < self.config.min_records {
            return Err(ForecastError::DataError(format!(
                "At least {} records are required for training, got {}",
                self.config.min_records,
                store.len()
            )));
        }

        let pipeline = FeaturePipeline::fit(store, &self.config)?;
        let table = pipeline.transform(store)?;
        Ok((table, pipeline))
    }
}
