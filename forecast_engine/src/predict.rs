//! Forward forecasts for a single entity
//!
//! A forecast walks the requested dates in order, carrying an
//! [`EntityHistory`]. Before each target date every real record dated
//! earlier is pushed into the history; once the dates pass the entity's last
//! real record, each prediction is pushed in turn so later dates lag on
//! earlier predictions.

use crate::config::EngineConfig;
use crate::data::{DemandRecord, DemandStore, EntityKey};
use crate::error::{ForecastError, Result};
use crate::features::Exogenous;
use crate::models::ModelKind;
use crate::registry::ModelSnapshot;
use crate::trainer::TrainedModel;
use crate::utils::{date_range, day_start, days_inclusive};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::time::Instant;
use tracing::debug;

/// A single-entity forecast request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub entity_key: EntityKey,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Model family to use, the active one if None
    #[serde(default)]
    pub model_kind: Option<ModelKind>,
    #[serde(default)]
    pub include_confidence_interval: bool,
    /// Exogenous values replacing the entity's latest ones for future dates
    #[serde(default)]
    pub overrides: Exogenous,
}

impl PredictionRequest {
    /// Create a new request using the active model and no interval
    pub fn new(entity_key: EntityKey, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            entity_key,
            start_date,
            end_date,
            model_kind: None,
            include_confidence_interval: false,
            overrides: Exogenous::default(),
        }
    }

    pub fn with_confidence_interval(mut self, include: bool) -> Self {
        self.include_confidence_interval = include;
        self
    }

    pub fn with_model(mut self, kind: ModelKind) -> Self {
        self.model_kind = Some(kind);
        self
    }

    pub fn with_overrides(mut self, overrides: Exogenous) -> Self {
        self.overrides = overrides;
        self
    }
}

/// One forecast day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub entity_key: EntityKey,
    /// Target day at midnight UTC
    pub prediction_date: DateTime<Utc>,
    pub predicted_demand: f64,
    pub confidence_lower: Option<f64>,
    pub confidence_upper: Option<f64>,
    /// Test-set R² of the model that produced the point
    pub model_accuracy: f64,
    pub model_kind: ModelKind,
}

/// Forecast points together with the normalized request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub entity_key: EntityKey,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub model_kind: ModelKind,
    pub include_confidence_interval: bool,
    pub points: Vec<ForecastPoint>,
}

impl ForecastResponse {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Produces forecasts from a pinned model snapshot
#[derive(Debug, Clone, Copy)]
pub struct PredictionService {
    z: f64,
    max_horizon_days: usize,
}

impl PredictionService {
    /// Create a new service from the engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            z: z_score(config.confidence_level)?,
            max_horizon_days: config.max_horizon_days,
        })
    }

    /// Interval half-width multiplier
    pub fn z(&self) -> f64 {
        self.z
    }

    /// Reject inverted ranges and ranges longer than the horizon
    pub fn validate_range(&self, start: NaiveDate, end: NaiveDate) -> Result<()> {
        if end < start {
            return Err(ForecastError::InvalidRange { start, end });
        }
        let days = days_inclusive(start, end);
        if days > self.max_horizon_days {
            return Err(ForecastError::InvalidParameter(format!(
                "Range of {days} days exceeds the maximum horizon of {} days",
                self.max_horizon_days
            )));
        }
        Ok(())
    }

    /// Forecast one entity over the request's range
    pub fn predict(
        &self,
        snapshot: &ModelSnapshot,
        store: &DemandStore,
        request: &PredictionRequest,
    ) -> Result<ForecastResponse> {
        self.validate_range(request.start_date, request.end_date)?;
        let model = match request.model_kind {
            Some(kind) => snapshot.get(kind)?,
            None => snapshot.active()?,
        };
        let history = store
            .history(&request.entity_key)
            .ok_or_else(|| ForecastError::EntityNotFound {
                entity_key: request.entity_key.to_string(),
            })?;
        let dates = date_range(request.start_date, request.end_date)?;

        let points = self.forecast_entity(
            snapshot,
            &model,
            &request.entity_key,
            history,
            &dates,
            &request.overrides,
            request.include_confidence_interval,
            None,
        )?;

        debug!(
            entity = %request.entity_key,
            model = %model.kind,
            points = points.len(),
            "forecast produced"
        );

        Ok(ForecastResponse {
            entity_key: request.entity_key.clone(),
            start_date: day_start(request.start_date),
            end_date: day_start(request.end_date),
            model_kind: model.kind,
            include_confidence_interval: request.include_confidence_interval,
            points,
        })
    }

    /// Sequential fold over `dates` (ascending) for one entity's records
    ///
    /// Returns [`ForecastError::Timeout`] if `deadline` passes before the last date.
    #[allow(clippy::too_many_arguments)]
    pub fn forecast_entity(
        &self,
        snapshot: &ModelSnapshot,
        model: &TrainedModel,
        entity: &EntityKey,
        records: &[DemandRecord],
        dates: &[NaiveDate],
        overrides: &Exogenous,
        with_interval: bool,
        deadline: Option<Instant>,
    ) -> Result<Vec<ForecastPoint>> {
        let last = records.last().ok_or_else(|| ForecastError::EntityNotFound {
            entity_key: entity.to_string(),
        })?;
        let last_date = last.date();
        let future_exogenous = apply_overrides(Exogenous::from(last), overrides);

        let pipeline = snapshot.pipeline();
        let mut history = pipeline.new_history()?;
        let half_width = self.z * model.metrics.rmse;

        let mut next = 0;
        let mut points = Vec::with_capacity(dates.len());
        for &date in dates {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(ForecastError::Timeout {
                    entity_key: entity.to_string(),
                });
            }

            while next < records.len() && records[next].date() < date {
                history.push(records[next].demand_value);
                next += 1;
            }

            let exogenous = match records.get(next).filter(|r| r.date() == date) {
                Some(observed) => apply_overrides(Exogenous::from(observed), overrides),
                None => future_exogenous.clone(),
            };

            let row = pipeline.vector(entity, date, &exogenous, &history);
            let raw = model.predict_one(&row);
            if !raw.is_finite() {
                return Err(ForecastError::ModelError {
                    kind: model.kind,
                    message: format!("non-finite prediction for '{entity}' on {date}"),
                });
            }
            let predicted = raw.max(0.0);

            let (lower, upper) = if with_interval {
                (Some((predicted - half_width).max(0.0)), Some(predicted + half_width))
            } else {
                (None, None)
            };

            points.push(ForecastPoint {
                entity_key: entity.clone(),
                prediction_date: day_start(date),
                predicted_demand: predicted,
                confidence_lower: lower,
                confidence_upper: upper,
                model_accuracy: model.metrics.r2,
                model_kind: model.kind,
            });

            if date > last_date {
                history.push(predicted);
            }
        }

        Ok(points)
    }
}

fn apply_overrides(mut base: Exogenous, overrides: &Exogenous) -> Exogenous {
    if overrides.price.is_some() {
        base.price = overrides.price;
    }
    if overrides.promotion.is_some() {
        base.promotion = overrides.promotion;
    }
    if overrides.weather_condition.is_some() {
        base.weather_condition = overrides.weather_condition.clone();
    }
    if overrides.seasonality_factor.is_some() {
        base.seasonality_factor = overrides.seasonality_factor;
    }
    base
}

/// Two-sided standard normal quantile for a coverage level in (0, 1)
pub fn z_score(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "Confidence level must be in (0, 1) (got {confidence_level})"
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::InvalidParameter(format!("Normal distribution: {e}")))?;
    Ok(normal.inverse_cdf((1.0 + confidence_level) / 2.0))
}
