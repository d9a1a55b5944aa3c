//! Engine facade tying ingestion, training and prediction together

use crate::bulk::{BulkForecaster, BulkRequest, BulkResponse};
use crate::config::EngineConfig;
use crate::data::{DemandRecord, DemandStore};
use crate::error::Result;
use crate::metrics::MetricBundle;
use crate::models::ModelKind;
use crate::predict::{ForecastResponse, PredictionRequest, PredictionService};
use crate::registry::ModelRegistry;
use crate::stats::{DataStatistics, PromotionEntry, StoreSummary};
use crate::trainer::{run_training, TrainingOptions, TrainingReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// What the registry currently holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub trained: bool,
    pub active_model: Option<ModelKind>,
    pub available_models: Vec<ModelKind>,
    pub feature_names: Vec<String>,
    pub metrics: BTreeMap<ModelKind, MetricBundle>,
    pub registry_version: u64,
}

/// Demand forecasting engine
///
/// Holds the ingested dataset and the model registry. The dataset is swapped
/// as a whole on ingestion; operations take an `Arc` to the dataset and the
/// registry snapshot they start with, so a concurrent ingest or training run
/// never changes data underneath them.
#[derive(Debug)]
pub struct DemandForecastEngine {
    config: EngineConfig,
    store: RwLock<Arc<DemandStore>>,
    registry: Arc<ModelRegistry>,
    service: PredictionService,
    bulk: BulkForecaster,
}

impl DemandForecastEngine {
    /// Create a new engine with an empty dataset and registry
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            service: PredictionService::new(&config)?,
            bulk: BulkForecaster::new(&config)?,
            store: RwLock::new(Arc::new(DemandStore::default())),
            registry: Arc::new(ModelRegistry::new()),
            config,
        })
    }

    /// Engine configured from `DEMAND_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(EngineConfig::from_env()?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// The current dataset
    pub fn dataset(&self) -> Arc<DemandStore> {
        self.store
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the dataset with a validated batch of records
    ///
    /// Trained models are kept; they keep serving until the next training run.
    pub fn ingest(&self, records: Vec<DemandRecord>) -> Result<usize> {
        let store = DemandStore::new(records)?;
        let count = store.len();
        let entities = store.entity_count();

        *self
            .store
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(store);

        info!(records = count, entities, "dataset ingested");
        Ok(count)
    }

    pub fn statistics(&self) -> Result<DataStatistics> {
        self.dataset().statistics()
    }

    /// Train every model family on the current dataset and register the result
    ///
    /// On error the registry is left untouched.
    pub fn train(&self, options: TrainingOptions) -> Result<TrainingReport> {
        let store = self.dataset();
        let run = run_training(&store, &self.config, &options)?;
        let mut report = TrainingReport::from_run(&run, 0);
        report.registry_version = self.registry.set(run.models, run.active, run.pipeline)?;
        Ok(report)
    }

    /// Forecast one entity
    pub fn predict(&self, request: &PredictionRequest) -> Result<ForecastResponse> {
        self.service
            .validate_range(request.start_date, request.end_date)?;
        let snapshot = self.registry.snapshot()?;
        self.service.predict(&snapshot, &self.dataset(), request)
    }

    /// Forecast many SKUs in parallel
    pub fn bulk_predict(&self, request: &BulkRequest) -> Result<BulkResponse> {
        self.bulk.predict(&self.registry, &self.dataset(), request)
    }

    pub fn model_info(&self) -> ModelInfo {
        match self.registry.snapshot() {
            Ok(snapshot) => ModelInfo {
                trained: true,
                active_model: Some(snapshot.active_kind()),
                available_models: snapshot.kinds(),
                feature_names: snapshot.pipeline().schema().names().to_vec(),
                metrics: snapshot.metrics(),
                registry_version: snapshot.version(),
            },
            Err(_) => ModelInfo {
                trained: false,
                active_model: None,
                available_models: Vec::new(),
                feature_names: Vec::new(),
                metrics: BTreeMap::new(),
                registry_version: 0,
            },
        }
    }

    pub fn is_trained(&self) -> bool {
        self.registry.is_trained()
    }

    pub fn stores(&self) -> Vec<String> {
        self.dataset().stores()
    }

    pub fn skus_for_store(&self, store: &str) -> Vec<String> {
        self.dataset().skus_for_store(store)
    }

    pub fn store_summary(&self, store: &str) -> Result<StoreSummary> {
        self.dataset().store_summary(store)
    }

    pub fn promotions(&self) -> Vec<PromotionEntry> {
        self.dataset().promotions()
    }
}
