//! Fan-out of single-entity forecasts over many SKUs
//!
//! Entities are forecast independently on a bounded rayon pool. Every worker
//! reads the same pinned [`ModelSnapshot`](crate::registry::ModelSnapshot),
//! and results are collected in input order regardless of which worker
//! finished first. A failing entity becomes a skipped entry; only
//! batch-level problems (bad range, no trained model) fail the call.

use crate::config::EngineConfig;
use crate::data::{DemandStore, EntityKey};
use crate::error::{ForecastError, Result};
use crate::features::Exogenous;
use crate::predict::{ForecastPoint, PredictionService};
use crate::registry::ModelRegistry;
use crate::utils::date_range;
use chrono::NaiveDate;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Forecast request for a set of SKUs, optionally scoped to one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRequest {
    #[serde(default)]
    pub store_id: Option<String>,
    pub skus: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub include_confidence_interval: bool,
}

impl BulkRequest {
    /// Entity keys in request order
    pub fn entity_keys(&self) -> Vec<EntityKey> {
        self.skus
            .iter()
            .map(|sku| EntityKey {
                store: self.store_id.clone(),
                sku: sku.clone(),
            })
            .collect()
    }
}

/// Why an entity has no forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No history for the entity
    NotFound,
    /// The batch deadline passed first
    Timeout,
    /// The model could not produce a forecast
    Failed,
}

/// Result for one requested entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntityOutcome {
    Predicted { points: Vec<ForecastPoint> },
    Skipped { reason: SkipReason, message: String },
}

impl EntityOutcome {
    pub fn is_predicted(&self) -> bool {
        matches!(self, EntityOutcome::Predicted { .. })
    }

    pub fn points(&self) -> Option<&[ForecastPoint]> {
        match self {
            EntityOutcome::Predicted { points } => Some(points),
            EntityOutcome::Skipped { .. } => None,
        }
    }

    fn skipped(error: &ForecastError) -> Self {
        let reason = match error {
            ForecastError::EntityNotFound { .. } => SkipReason::NotFound,
            ForecastError::Timeout { .. } => SkipReason::Timeout,
            _ => SkipReason::Failed,
        };
        EntityOutcome::Skipped {
            reason,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkEntry {
    pub entity_key: EntityKey,
    #[serde(flatten)]
    pub outcome: EntityOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total_skus: usize,
    pub predicted_skus: usize,
    pub skipped_skus: usize,
    /// `"<start> to <end>"`
    pub date_range: String,
}

/// Per-entity outcomes in request order plus a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub entries: Vec<BulkEntry>,
    pub summary: BulkSummary,
}

impl BulkResponse {
    fn new(entries: Vec<BulkEntry>, start: NaiveDate, end: NaiveDate) -> Self {
        let predicted = entries.iter().filter(|e| e.outcome.is_predicted()).count();
        let summary = BulkSummary {
            total_skus: entries.len(),
            predicted_skus: predicted,
            skipped_skus: entries.len() - predicted,
            date_range: format!("{start} to {end}"),
        };
        Self { entries, summary }
    }

    /// Outcome for one entity, if it was requested
    pub fn get(&self, key: &EntityKey) -> Option<&EntityOutcome> {
        self.entries
            .iter()
            .find(|e| &e.entity_key == key)
            .map(|e| &e.outcome)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs many single-entity forecasts in parallel
#[derive(Debug, Clone)]
pub struct BulkForecaster {
    service: PredictionService,
    pool: Arc<ThreadPool>,
    timeout: Option<Duration>,
}

impl BulkForecaster {
    /// Create a new bulk forecaster from the engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self> {
        if config.bulk_workers == 0 {
            return Err(ForecastError::InvalidParameter(
                "bulk_workers must be positive".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.bulk_workers)
            .thread_name(|i| format!("bulk-forecast-{i}"))
            .build()
            .map_err(|e| ForecastError::InvalidParameter(format!("Bulk worker pool: {e}")))?;

        Ok(Self {
            service: PredictionService::new(config)?,
            pool: Arc::new(pool),
            timeout: config.bulk_timeout,
        })
    }

    /// Threads in the shared worker pool
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Replace the batch deadline
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn predict(
        &self,
        registry: &ModelRegistry,
        store: &DemandStore,
        request: &BulkRequest,
    ) -> Result<BulkResponse> {
        self.predict_keys(
            registry,
            store,
            &request.entity_keys(),
            request.start_date,
            request.end_date,
            request.include_confidence_interval,
        )
    }

    /// Forecast every distinct key over `[start, end]` with the active model
    pub fn predict_keys(
        &self,
        registry: &ModelRegistry,
        store: &DemandStore,
        keys: &[EntityKey],
        start: NaiveDate,
        end: NaiveDate,
        with_interval: bool,
    ) -> Result<BulkResponse> {
        let mut seen = HashSet::new();
        let keys: Vec<&EntityKey> = keys.iter().filter(|k| seen.insert(*k)).collect();
        if keys.is_empty() {
            return Ok(BulkResponse::new(Vec::new(), start, end));
        }

        self.service.validate_range(start, end)?;
        let snapshot = registry.snapshot()?;
        let model = snapshot.active()?;
        let dates = date_range(start, end)?;
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let no_overrides = Exogenous::default();

        let started = Instant::now();
        let entries: Vec<BulkEntry> = self.pool.install(|| {
            keys.par_iter()
                .map(|key| {
                    let result = store
                        .history(key)
                        .ok_or_else(|| ForecastError::EntityNotFound {
                            entity_key: key.to_string(),
                        })
                        .and_then(|history| {
                            self.service.forecast_entity(
                                &snapshot,
                                &model,
                                key,
                                history,
                                &dates,
                                &no_overrides,
                                with_interval,
                                deadline,
                            )
                        });

                    let outcome = match result {
                        Ok(points) => {
                            debug!(entity = %key, points = points.len(), "entity forecast");
                            EntityOutcome::Predicted { points }
                        }
                        Err(e) => {
                            warn!(entity = %key, error = %e, "entity skipped");
                            EntityOutcome::skipped(&e)
                        }
                    };

                    BulkEntry {
                        entity_key: (*key).clone(),
                        outcome,
                    }
                })
                .collect()
        });

        let response = BulkResponse::new(entries, start, end);
        info!(
            total = response.summary.total_skus,
            predicted = response.summary.predicted_skus,
            skipped = response.summary.skipped_skus,
            model = %model.kind,
            registry_version = snapshot.version(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bulk forecast finished"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    #[test]
    fn worker_pool_is_built_once_and_shared() {
        let config = EngineConfig {
            bulk_workers: 3,
            ..Default::default()
        };
        let bulk = BulkForecaster::new(&config).unwrap();
        let copy = bulk.clone().with_timeout(Some(Duration::from_secs(1)));

        assert_eq!(bulk.workers(), 3);
        assert!(Arc::ptr_eq(&bulk.pool, &copy.pool));

        let zero = EngineConfig {
            bulk_workers: 0,
            ..Default::default()
        };
        assert!(BulkForecaster::new(&zero).is_err());
    }

    #[test]
    fn request_keys_carry_the_store() {
        let request = BulkRequest {
            store_id: Some("S1".to_string()),
            skus: vec!["A".to_string(), "B".to_string()],
            start_date: d(1),
            end_date: d(2),
            include_confidence_interval: false,
        };
        assert_eq!(
            request.entity_keys(),
            vec![EntityKey::store_sku("S1", "A"), EntityKey::store_sku("S1", "B")]
        );
    }

    #[test]
    fn empty_batch_needs_no_model() {
        let forecaster = BulkForecaster::new(&EngineConfig::default()).unwrap();
        let response = forecaster
            .predict_keys(&ModelRegistry::new(), &DemandStore::default(), &[], d(1), d(7), false)
            .unwrap();

        assert!(response.entries.is_empty());
        assert_eq!(response.summary.total_skus, 0);
        assert_eq!(response.summary.predicted_skus, 0);
        assert_eq!(response.summary.date_range, "2025-01-01 to 2025-01-07");
    }

    #[test]
    fn untrained_registry_fails_the_batch() {
        let forecaster = BulkForecaster::new(&EngineConfig::default()).unwrap();
        let err = forecaster
            .predict_keys(
                &ModelRegistry::new(),
                &DemandStore::default(),
                &[EntityKey::product("P")],
                d(1),
                d(2),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, ForecastError::NotTrained));
    }

    #[test]
    fn skip_reasons_follow_the_error() {
        let not_found = EntityOutcome::skipped(&ForecastError::EntityNotFound {
            entity_key: "X".into(),
        });
        assert!(matches!(
            not_found,
            EntityOutcome::Skipped {
                reason: SkipReason::NotFound,
                ..
            }
        ));
        let timeout = EntityOutcome::skipped(&ForecastError::Timeout {
            entity_key: "X".into(),
        });
        assert!(!timeout.is_predicted());
    }
}
