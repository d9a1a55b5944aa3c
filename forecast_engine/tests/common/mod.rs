#![allow(dead_code)]

use chrono::NaiveDate;
use forecast_engine::config::{BoostingParams, EngineConfig, ForestParams};
use forecast_engine::data::{DemandRecord, EntityKey};
use forecast_engine::engine::DemandForecastEngine;
use forecast_engine::utils::{day_start, generate_demand_records, SyntheticShape};

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Small ensembles so the suites stay quick
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        forest: ForestParams {
            n_trees: 10,
            max_depth: 8,
            ..Default::default()
        },
        boosting: BoostingParams {
            n_estimators: 20,
            ..Default::default()
        },
        bulk_workers: 2,
        ..Default::default()
    }
}

/// PROD_001 with three days of history plus a longer PROD_002 series
pub fn scenario_records() -> Vec<DemandRecord> {
    let mut records: Vec<DemandRecord> = [100.0, 120.0, 95.0]
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            DemandRecord::new(
                EntityKey::product("PROD_001"),
                day_start(ymd(2024, 1, 1 + i as u32)),
                v,
            )
        })
        .collect();

    records.extend((0..10).map(|i| {
        DemandRecord::new(
            EntityKey::product("PROD_002"),
            day_start(ymd(2024, 1, 1 + i)),
            40.0 + (i % 4) as f64 * 5.0,
        )
        .with_price(9.5)
        .with_promotion(i % 5 == 0)
    }));

    records
}

/// Two stores with five SKUs each
pub fn store_records(days: usize) -> Vec<DemandRecord> {
    generate_demand_records(&SyntheticShape {
        days,
        ..Default::default()
    })
    .unwrap()
}

pub fn trained_engine(records: Vec<DemandRecord>) -> DemandForecastEngine {
    let engine = DemandForecastEngine::new(fast_config()).unwrap();
    engine.ingest(records).unwrap();
    engine.train(Default::default()).unwrap();
    engine
}
