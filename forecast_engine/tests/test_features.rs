mod common;

use common::{scenario_records, store_records, ymd};
use forecast_engine::config::FeatureConfig;
use forecast_engine::data::{DemandRecord, DemandStore, EntityKey};
use forecast_engine::features::{Exogenous, FeatureBuilder, UNKNOWN_CODE};
use forecast_engine::split::split;
use forecast_engine::utils::day_start;
use forecast_engine::ForecastError;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn test_one_row_per_record_and_stable_schema() {
    let store = DemandStore::new(store_records(40)).unwrap();
    let builder = FeatureBuilder::new(FeatureConfig::default());

    let (first, _) = builder.build(&store).unwrap();
    let (second, _) = builder.build(&store).unwrap();

    assert_eq!(first.len(), store.len());
    assert_eq!(first.schema(), second.schema());
    assert_eq!(first, second);
    assert!(first.rows().iter().all(|r| r.len() == first.schema().len()));
}

#[test]
fn test_exogenous_fill_values() {
    let store = DemandStore::new(scenario_records()).unwrap();
    let (table, pipeline) = FeatureBuilder::new(FeatureConfig::default())
        .build(&store)
        .unwrap();

    // PROD_001 rows come first and carry no price, so they take the median price
    assert_eq!(pipeline.price_fill(), 9.5);
    assert_eq!(table.value(0, "price"), Some(9.5));
    assert_eq!(table.value(0, "promotion"), Some(0.0));
    assert_eq!(table.value(0, "seasonality_factor"), Some(1.0));
    // PROD_002 on 2024-01-01 is promoted
    assert_eq!(table.value(3, "promotion"), Some(1.0));
}

#[test]
fn test_lags_never_cross_entities() {
    let store = DemandStore::new(scenario_records()).unwrap();
    let (table, _) = FeatureBuilder::new(FeatureConfig::default())
        .build(&store)
        .unwrap();

    // first PROD_002 row has no history of its own
    assert_eq!(table.keys()[3].0, EntityKey::product("PROD_002"));
    assert_eq!(table.value(3, "demand_lag_1"), Some(0.0));
    assert_eq!(table.value(3, "demand_rolling_mean_7"), Some(0.0));
    // third PROD_001 row lags on the 120 before it and fills lag 7 with the mean
    assert_eq!(table.value(2, "demand_lag_1"), Some(120.0));
    assert_eq!(table.value(2, "demand_lag_7"), Some(110.0));
}

#[test]
fn test_unknown_categories_encode_as_reserved_code() {
    let store = DemandStore::new(scenario_records()).unwrap();
    let (_, pipeline) = FeatureBuilder::new(FeatureConfig::default())
        .build(&store)
        .unwrap();
    let history = pipeline.new_history().unwrap();

    let row = pipeline.vector(
        &EntityKey::product("NEW"),
        ymd(2025, 1, 1),
        &Exogenous {
            weather_condition: Some("hail".to_string()),
            ..Default::default()
        },
        &history,
    );

    let schema = pipeline.schema();
    assert_eq!(row[schema.index_of("entity_code").unwrap()], UNKNOWN_CODE);
    assert_eq!(row[schema.index_of("weather_code").unwrap()], UNKNOWN_CODE);
}

#[rstest]
#[case(0)]
#[case(5)]
#[case(9)]
fn test_minimum_record_count(#[case] n: u32) {
    let records: Vec<DemandRecord> = (0..n)
        .map(|i| DemandRecord::new(EntityKey::product("P"), day_start(ymd(2024, 1, 1 + i)), 5.0))
        .collect();
    let store = DemandStore::new(records).unwrap();

    let err = FeatureBuilder::new(FeatureConfig::default())
        .build(&store)
        .unwrap_err();
    assert!(matches!(err, ForecastError::DataError(_)));
}

#[rstest]
#[case(0.2, 7)]
#[case(0.5, 17)]
#[case(0.01, 1)]
#[case(0.9, 17)]
fn test_split_sizes(#[case] fraction: f64, #[case] expected_test: usize) {
    // 34 records
    let mut records = scenario_records();
    records.extend(
        (0..21).map(|i| DemandRecord::new(EntityKey::product("PROD_003"), day_start(ymd(2024, 2, 1 + i)), 7.0)),
    );
    let store = DemandStore::new(records).unwrap();
    let (table, _) = FeatureBuilder::new(FeatureConfig::default())
        .build(&store)
        .unwrap();

    let (train, test) = split(&table, fraction, 42).unwrap();
    assert_eq!(test.len(), expected_test);
    assert_eq!(train.len() + test.len(), table.len());
}

#[test]
fn test_split_is_reproducible() {
    let store = DemandStore::new(store_records(20)).unwrap();
    let (table, _) = FeatureBuilder::new(FeatureConfig::default())
        .build(&store)
        .unwrap();

    let a = split(&table, 0.2, 7).unwrap();
    let b = split(&table, 0.2, 7).unwrap();
    let c = split(&table, 0.2, 8).unwrap();
    assert_eq!(a, b);
    assert_ne!(a.1, c.1);
}
