mod common;

use common::{fast_config, store_records, trained_engine, ymd};
use forecast_engine::bulk::{BulkForecaster, BulkRequest, EntityOutcome, SkipReason};
use forecast_engine::data::EntityKey;
use forecast_engine::engine::DemandForecastEngine;
use forecast_engine::ForecastError;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn request(store: &str, skus: &[&str]) -> BulkRequest {
    BulkRequest {
        store_id: Some(store.to_string()),
        skus: skus.iter().map(|s| s.to_string()).collect(),
        start_date: ymd(2024, 3, 1),
        end_date: ymd(2024, 3, 7),
        include_confidence_interval: true,
    }
}

#[test]
fn test_one_unknown_sku_is_skipped() {
    let engine = trained_engine(store_records(40));
    let response = engine
        .bulk_predict(&request("STORE_001", &["SKU_003", "SKU_404", "SKU_001"]))
        .unwrap();

    assert_eq!(response.summary.total_skus, 3);
    assert_eq!(response.summary.predicted_skus, 2);
    assert_eq!(response.summary.skipped_skus, 1);
    assert_eq!(response.summary.date_range, "2024-03-01 to 2024-03-07");

    let skus: Vec<&str> = response
        .entries
        .iter()
        .map(|e| e.entity_key.sku.as_str())
        .collect();
    assert_eq!(skus, vec!["SKU_003", "SKU_404", "SKU_001"]);

    assert!(matches!(
        response.entries[1].outcome,
        EntityOutcome::Skipped {
            reason: SkipReason::NotFound,
            ..
        }
    ));
    for entry in [&response.entries[0], &response.entries[2]] {
        let points = entry.outcome.points().unwrap();
        assert_eq!(points.len(), 7);
        assert!(points.iter().all(|p| p.entity_key == entry.entity_key));
    }
}

#[test]
fn test_duplicates_collapse_to_first_occurrence() {
    let engine = trained_engine(store_records(40));
    let response = engine
        .bulk_predict(&request("STORE_002", &["SKU_002", "SKU_001", "SKU_002"]))
        .unwrap();

    assert_eq!(response.summary.total_skus, 2);
    assert_eq!(response.entries[0].entity_key, EntityKey::store_sku("STORE_002", "SKU_002"));
    assert_eq!(response.entries[1].entity_key, EntityKey::store_sku("STORE_002", "SKU_001"));
}

#[test]
fn test_bulk_matches_single_entity_forecasts() {
    let engine = trained_engine(store_records(40));
    let bulk = engine
        .bulk_predict(&request("STORE_001", &["SKU_001", "SKU_002", "SKU_003", "SKU_004", "SKU_005"]))
        .unwrap();

    for entry in &bulk.entries {
        let single = engine
            .predict(
                &forecast_engine::predict::PredictionRequest::new(
                    entry.entity_key.clone(),
                    ymd(2024, 3, 1),
                    ymd(2024, 3, 7),
                )
                .with_confidence_interval(true),
            )
            .unwrap();
        assert_eq!(entry.outcome.points().unwrap(), single.points.as_slice());
    }
}

#[test]
fn test_empty_key_set() {
    let engine = DemandForecastEngine::new(fast_config()).unwrap();
    let response = engine.bulk_predict(&request("STORE_001", &[])).unwrap();

    assert!(response.entries.is_empty());
    assert_eq!(response.summary.total_skus, 0);
    assert_eq!(response.summary.predicted_skus, 0);
}

#[test]
fn test_expired_deadline_skips_with_timeout() {
    let engine = trained_engine(store_records(40));
    let forecaster = BulkForecaster::new(engine.config())
        .unwrap()
        .with_timeout(Some(Duration::ZERO));

    let response = forecaster
        .predict(
            engine.registry(),
            &engine.dataset(),
            &request("STORE_001", &["SKU_001", "SKU_002"]),
        )
        .unwrap();

    assert_eq!(response.summary.total_skus, 2);
    assert_eq!(response.summary.predicted_skus, 0);
    assert!(response.entries.iter().all(|e| matches!(
        e.outcome,
        EntityOutcome::Skipped {
            reason: SkipReason::Timeout,
            ..
        }
    )));
}

#[test]
fn test_batch_level_errors() {
    let untrained = DemandForecastEngine::new(fast_config()).unwrap();
    untrained.ingest(store_records(20)).unwrap();
    assert!(matches!(
        untrained.bulk_predict(&request("STORE_001", &["SKU_001"])),
        Err(ForecastError::NotTrained)
    ));

    let engine = trained_engine(store_records(20));
    let mut inverted = request("STORE_001", &["SKU_001"]);
    inverted.end_date = ymd(2024, 2, 1);
    assert!(matches!(
        engine.bulk_predict(&inverted),
        Err(ForecastError::InvalidRange { .. })
    ));
}

#[test]
fn test_bulk_response_json_shape() {
    let engine = trained_engine(store_records(20));
    let json = engine
        .bulk_predict(&request("STORE_001", &["SKU_001", "NOPE"]))
        .unwrap()
        .to_json()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["summary"]["predicted_skus"], 1);
    assert_eq!(value["entries"][0]["status"], "predicted");
    assert_eq!(value["entries"][1]["status"], "skipped");
    assert_eq!(value["entries"][1]["reason"], "not_found");
}
