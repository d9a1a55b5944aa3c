//! In-memory holder of the most recent training result
//!
//! The registry keeps one immutable [`ModelSnapshot`] behind an `Arc`. A
//! training run builds a whole new snapshot and swaps it in under a short
//! write lock, so readers either see the previous run or the new one, never
//! a mix. Long operations call [`ModelRegistry::snapshot`] once and keep the
//! `Arc` for their whole duration.

use crate::error::{ForecastError, Result};
use crate::features::FeaturePipeline;
use crate::metrics::MetricBundle;
use crate::models::ModelKind;
use crate::trainer::TrainedModel;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Models, active kind and feature pipeline of one training run
#[derive(Debug)]
pub struct ModelSnapshot {
    version: u64,
    models: BTreeMap<ModelKind, Arc<TrainedModel>>,
    active: ModelKind,
    pipeline: FeaturePipeline,
}

impl ModelSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn active_kind(&self) -> ModelKind {
        self.active
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    pub fn active(&self) -> Result<Arc<TrainedModel>> {
        self.get(self.active)
    }

    pub fn get(&self, kind: ModelKind) -> Result<Arc<TrainedModel>> {
        self.models
            .get(&kind)
            .cloned()
            .ok_or(ForecastError::ModelUnavailable { kind })
    }

    /// Kinds present in this snapshot, in priority order
    pub fn kinds(&self) -> Vec<ModelKind> {
        self.models.keys().copied().collect()
    }

    pub fn metrics(&self) -> BTreeMap<ModelKind, MetricBundle> {
        self.models.iter().map(|(k, m)| (*k, m.metrics)).collect()
    }
}

/// Versioned swap-on-write holder of the current [`ModelSnapshot`]
#[derive(Debug, Default)]
pub struct ModelRegistry {
    current: RwLock<Option<Arc<ModelSnapshot>>>,
    next_version: AtomicU64,
}

impl ModelRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot with a complete new result set
    ///
    /// Returns the version assigned to the new snapshot.
    pub fn set(
        &self,
        models: BTreeMap<ModelKind, TrainedModel>,
        active: ModelKind,
        pipeline: FeaturePipeline,
    ) -> Result<u64> {
        if !models.contains_key(&active) {
            return Err(ForecastError::ModelUnavailable { kind: active });
        }

        let models = models
            .into_iter()
            .map(|(kind, model)| (kind, Arc::new(model)))
            .collect();

        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // assigned under the write lock so versions land in publish order
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        *guard = Some(Arc::new(ModelSnapshot {
            version,
            models,
            active,
            pipeline,
        }));
        drop(guard);

        info!(version, active = %active, "model registry updated");
        Ok(version)
    }

    /// The current snapshot, pinned for as long as the caller holds it
    pub fn snapshot(&self) -> Result<Arc<ModelSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(ForecastError::NotTrained)
    }

    pub fn get_active(&self) -> Result<Arc<TrainedModel>> {
        self.snapshot()?.active()
    }

    pub fn get(&self, kind: ModelKind) -> Result<Arc<TrainedModel>> {
        self.snapshot()?.get(kind)
    }

    pub fn is_trained(&self) -> bool {
        self.snapshot().is_ok()
    }

    /// Version of the current snapshot, 0 before the first training run
    pub fn version(&self) -> u64 {
        self.snapshot().map_or(0, |s| s.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureConfig, LinearParams};
    use crate::data::DemandStore;
    use crate::models::{FittedModel, LinearRegression};
    use crate::split::Dataset;

    fn model(kind: ModelKind, rmse: f64) -> TrainedModel {
        let data = Dataset::new(vec![vec![0.0], vec![1.0]], vec![0.0, 1.0]).unwrap();
        TrainedModel {
            kind,
            model: FittedModel::LinearRegression(
                LinearRegression::fit(&data, &LinearParams::default()).unwrap(),
            ),
            metrics: MetricBundle {
                mae: rmse,
                mse: rmse * rmse,
                rmse,
                r2: 0.0,
                test_samples: 2,
                low_confidence: false,
            },
        }
    }

    fn pipeline() -> FeaturePipeline {
        FeaturePipeline::fit(&DemandStore::default(), &FeatureConfig::default()).unwrap()
    }

    #[test]
    fn empty_registry_is_not_trained() {
        let registry = ModelRegistry::new();
        assert!(!registry.is_trained());
        assert_eq!(registry.version(), 0);
        assert!(matches!(registry.get_active(), Err(ForecastError::NotTrained)));
        assert!(matches!(
            registry.get(ModelKind::RandomForest),
            Err(ForecastError::NotTrained)
        ));
    }

    #[test]
    fn set_replaces_the_whole_snapshot() {
        let registry = ModelRegistry::new();
        let first: BTreeMap<_, _> = [model(ModelKind::RandomForest, 1.0)]
            .into_iter()
            .map(|m| (m.kind, m))
            .collect();
        assert_eq!(registry.set(first, ModelKind::RandomForest, pipeline()).unwrap(), 1);

        let pinned = registry.snapshot().unwrap();

        let second: BTreeMap<_, _> = [model(ModelKind::LinearRegression, 2.0)]
            .into_iter()
            .map(|m| (m.kind, m))
            .collect();
        assert_eq!(
            registry.set(second, ModelKind::LinearRegression, pipeline()).unwrap(),
            2
        );

        // the pinned snapshot is unaffected by the swap
        assert_eq!(pinned.active_kind(), ModelKind::RandomForest);
        assert_eq!(registry.get_active().unwrap().kind, ModelKind::LinearRegression);
        assert!(matches!(
            registry.get(ModelKind::RandomForest),
            Err(ForecastError::ModelUnavailable { .. })
        ));
        assert_eq!(registry.version(), 2);
    }

    #[test]
    fn concurrent_sets_leave_the_latest_version_live() {
        let registry = ModelRegistry::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        let models: BTreeMap<_, _> = [model(ModelKind::RandomForest, 1.0)]
                            .into_iter()
                            .map(|m| (m.kind, m))
                            .collect();
                        registry
                            .set(models, ModelKind::RandomForest, pipeline())
                            .unwrap();
                    }
                });
            }
        });
        assert_eq!(registry.version(), 80);
    }

    #[test]
    fn rejects_an_active_kind_without_a_model() {
        let registry = ModelRegistry::new();
        let err = registry
            .set(BTreeMap::new(), ModelKind::GradientBoosting, pipeline())
            .unwrap_err();
        assert!(matches!(err, ForecastError::ModelUnavailable { .. }));
        assert!(!registry.is_trained());
    }
}
