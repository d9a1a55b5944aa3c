mod common;

use common::{fast_config, scenario_records, store_records};
use forecast_engine::data::{DemandRecord, EntityKey};
use forecast_engine::engine::DemandForecastEngine;
use forecast_engine::models::ModelKind;
use forecast_engine::trainer::TrainingOptions;
use forecast_engine::utils::day_start;
use forecast_engine::ForecastError;
use pretty_assertions::assert_eq;

#[test]
fn test_training_registers_every_family() {
    let engine = DemandForecastEngine::new(fast_config()).unwrap();
    engine.ingest(store_records(60)).unwrap();

    let report = engine.train(TrainingOptions::default()).unwrap();

    assert_eq!(report.metrics.len(), 3);
    assert!(report.skipped.is_empty());
    assert_eq!(report.training_samples + report.test_samples, 600);
    assert_eq!(report.test_samples, 120);
    assert_eq!(report.registry_version, 1);
    assert_eq!(report.feature_names.len(), 14);

    for metrics in report.metrics.values() {
        assert!(metrics.rmse >= 0.0 && metrics.rmse.is_finite());
        assert!((metrics.rmse - metrics.mse.sqrt()).abs() < 1e-9);
        assert!(!metrics.low_confidence);
    }

    let best = report.metrics[&report.active_model].rmse;
    assert!(report.metrics.values().all(|m| m.rmse >= best));

    let info = engine.model_info();
    assert!(info.trained);
    assert_eq!(info.active_model, Some(report.active_model));
    assert_eq!(info.available_models, ModelKind::ALL.to_vec());
    assert_eq!(info.metrics, report.metrics);
}

#[test]
fn test_training_is_reproducible() {
    let run = || {
        let engine = DemandForecastEngine::new(fast_config()).unwrap();
        engine.ingest(store_records(40)).unwrap();
        engine.train(TrainingOptions::default()).unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.active_model, second.active_model);
}

#[test]
fn test_seed_override_changes_the_split() {
    let engine = DemandForecastEngine::new(fast_config()).unwrap();
    engine.ingest(store_records(40)).unwrap();

    let default_seed = engine.train(TrainingOptions::default()).unwrap();
    let other_seed = engine
        .train(TrainingOptions {
            seed: Some(7),
            test_fraction: Some(0.25),
        })
        .unwrap();

    assert_eq!(other_seed.test_samples, 100);
    assert_ne!(default_seed.metrics, other_seed.metrics);
    assert_eq!(other_seed.registry_version, 2);
}

#[test]
fn test_too_few_records_registers_nothing() {
    let engine = DemandForecastEngine::new(fast_config()).unwrap();
    let records: Vec<DemandRecord> = scenario_records().into_iter().take(9).collect();
    engine.ingest(records).unwrap();

    let err = engine.train(TrainingOptions::default()).unwrap_err();
    assert!(matches!(err, ForecastError::DataError(_)));
    assert!(!engine.is_trained());
    assert!(!engine.model_info().trained);
}

#[test]
fn test_failed_retrain_keeps_previous_models() {
    let engine = DemandForecastEngine::new(fast_config()).unwrap();
    engine.ingest(scenario_records()).unwrap();
    let report = engine.train(TrainingOptions::default()).unwrap();

    engine
        .ingest(vec![DemandRecord::new(
            EntityKey::product("PROD_001"),
            day_start(common::ymd(2024, 1, 1)),
            1.0,
        )])
        .unwrap();
    assert!(engine.train(TrainingOptions::default()).is_err());

    let info = engine.model_info();
    assert_eq!(info.registry_version, report.registry_version);
    assert_eq!(info.active_model, Some(report.active_model));
}

#[test]
fn test_small_dataset_still_trains() {
    // 13 records -> 3 test examples
    let engine = DemandForecastEngine::new(fast_config()).unwrap();
    engine.ingest(scenario_records()).unwrap();

    let report = engine.train(TrainingOptions::default()).unwrap();
    assert_eq!(report.test_samples, 3);
    assert_eq!(report.training_samples, 10);
    assert!(!report.metrics.is_empty());
}
