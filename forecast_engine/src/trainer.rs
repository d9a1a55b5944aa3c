//! Multi-family training and model selection

use crate::config::EngineConfig;
use crate::data::DemandStore;
use crate::error::{ForecastError, Result};
use crate::features::{FeatureBuilder, FeaturePipeline};
use crate::metrics::{evaluate, MetricBundle};
use crate::models::{FittedModel, ModelKind, Regressor};
use crate::split::{split, Dataset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A fitted model with its held-out accuracy
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub kind: ModelKind,
    pub model: FittedModel,
    pub metrics: MetricBundle,
}

impl TrainedModel {
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        self.model.predict_one(features)
    }
}

/// Optional per-run overrides of the configured split
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    pub test_fraction: Option<f64>,
    pub seed: Option<u64>,
}

/// Families that trained and families that were skipped
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub models: BTreeMap<ModelKind, TrainedModel>,
    pub skipped: BTreeMap<ModelKind, String>,
}

/// Everything a training run produces, before it is registered
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub models: BTreeMap<ModelKind, TrainedModel>,
    pub skipped: BTreeMap<ModelKind, String>,
    pub active: ModelKind,
    pub pipeline: FeaturePipeline,
    pub training_samples: usize,
    pub test_samples: usize,
}

/// Summary returned to the caller of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub metrics: BTreeMap<ModelKind, MetricBundle>,
    pub active_model: ModelKind,
    pub training_samples: usize,
    pub test_samples: usize,
    pub skipped: BTreeMap<ModelKind, String>,
    pub feature_names: Vec<String>,
    pub registry_version: u64,
}

impl TrainingReport {
    pub fn from_run(run: &TrainingRun, registry_version: u64) -> Self {
        Self {
            metrics: run
                .models
                .iter()
                .map(|(kind, m)| (*kind, m.metrics))
                .collect(),
            active_model: run.active,
            training_samples: run.training_samples,
            test_samples: run.test_samples,
            skipped: run.skipped.clone(),
            feature_names: run.pipeline.schema().names().to_vec(),
            registry_version,
        }
    }
}

/// Fit every family on `train` and score it on `test`
///
/// A family that fails to fit or yields non-finite metrics is skipped with
/// its reason. Fails only when no family survives.
pub fn train_all(
    train: &Dataset,
    test: &Dataset,
    config: &EngineConfig,
    seed: u64,
) -> Result<TrainingOutcome> {
    if train.is_empty() || test.is_empty() {
        return Err(ForecastError::TrainingError(format!(
            "Need non-empty train and test sets (got {} and {})",
            train.len(),
            test.len()
        )));
    }

    let mut models = BTreeMap::new();
    let mut skipped = BTreeMap::new();

    for kind in ModelKind::ALL {
        let started = Instant::now();
        match fit_and_score(kind, train, test, config, seed) {
            Ok(trained) => {
                debug!(
                    model = %kind,
                    rmse = trained.metrics.rmse,
                    r2 = trained.metrics.r2,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "model trained"
                );
                models.insert(kind, trained);
            }
            Err(e) => {
                warn!(model = %kind, error = %e, "model family skipped");
                skipped.insert(kind, e.to_string());
            }
        }
    }

    if models.is_empty() {
        let reasons: Vec<String> = skipped
            .iter()
            .map(|(kind, reason)| format!("{kind}: {reason}"))
            .collect();
        return Err(ForecastError::TrainingError(format!(
            "No model family could be trained ({})",
            reasons.join("; ")
        )));
    }

    Ok(TrainingOutcome { models, skipped })
}

fn fit_and_score(
    kind: ModelKind,
    train: &Dataset,
    test: &Dataset,
    config: &EngineConfig,
    seed: u64,
) -> Result<TrainedModel> {
    let model = FittedModel::fit(kind, train, config, seed)?;
    let predicted = model.predict(&test.features);
    let metrics = evaluate(&predicted, &test.labels)?;

    if ![metrics.mae, metrics.mse, metrics.rmse, metrics.r2]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(ForecastError::ModelError {
            kind,
            message: "non-finite test metrics".to_string(),
        });
    }

    Ok(TrainedModel {
        kind,
        model,
        metrics,
    })
}

/// Lowest RMSE, then higher R², then family priority
pub fn select_active(models: &BTreeMap<ModelKind, TrainedModel>) -> Option<ModelKind> {
    models
        .values()
        .min_by(|a, b| {
            a.metrics
                .rmse
                .total_cmp(&b.metrics.rmse)
                .then_with(|| b.metrics.r2.total_cmp(&a.metrics.r2))
                .then_with(|| a.kind.priority().cmp(&b.kind.priority()))
        })
        .map(|m| m.kind)
}

/// Build features, split, train every family and pick the active one
pub fn run_training(
    store: &DemandStore,
    config: &EngineConfig,
    options: &TrainingOptions,
) -> Result<TrainingRun> {
    let test_fraction =
        EngineConfig::clamp_test_fraction(options.test_fraction.unwrap_or(config.test_fraction));
    let seed = options.seed.unwrap_or(config.seed);

    let (table, pipeline) = FeatureBuilder::new(config.features.clone()).build(store)?;
    let (train, test) = split(&table, test_fraction, seed)?;
    info!(
        records = store.len(),
        entities = store.entity_count(),
        training_samples = train.len(),
        test_samples = test.len(),
        seed,
        "training started"
    );

    let outcome = train_all(&train, &test, config, seed)?;
    let active = select_active(&outcome.models).ok_or_else(|| {
        ForecastError::TrainingError("No trained model to select".to_string())
    })?;

    if let Some(best) = outcome.models.get(&active) {
        info!(
            active = %active,
            rmse = best.metrics.rmse,
            r2 = best.metrics.r2,
            low_confidence = best.metrics.low_confidence,
            "active model selected"
        );
    }

    Ok(TrainingRun {
        models: outcome.models,
        skipped: outcome.skipped,
        active,
        pipeline,
        training_samples: train.len(),
        test_samples: test.len(),
    })
}
