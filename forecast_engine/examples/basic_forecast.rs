use chrono::NaiveDate;
use forecast_engine::bulk::BulkRequest;
use forecast_engine::prelude::*;
use forecast_engine::utils::{generate_demand_records, SyntheticShape};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("Demand Forecast: Basic Example");
    println!("==============================\n");

    // Generate sample data
    let records = generate_demand_records(&SyntheticShape {
        days: 120,
        ..Default::default()
    })?;
    println!("Generated {} records\n", records.len());

    let engine = DemandForecastEngine::new(EngineConfig::default())?;
    engine.ingest(records)?;

    let stats = engine.statistics()?;
    if let (Some(range), Some(demand)) = (stats.date_range, stats.demand) {
        println!(
            "{} entities, {} | demand mean {:.1}, std {:.1}\n",
            stats.unique_entities, range, demand.mean, demand.std
        );
    }

    // Train all model families
    println!("Training models...");
    let report = engine.train(TrainingOptions::default())?;
    for (kind, metrics) in &report.metrics {
        println!("  {kind:<18} {metrics}");
    }
    println!("Active model: {}\n", report.active_model);

    // Forecast one SKU for the week after the history ends
    let start = NaiveDate::from_ymd_opt(2024, 4, 30).ok_or("bad date")?;
    let end = NaiveDate::from_ymd_opt(2024, 5, 6).ok_or("bad date")?;
    let request = PredictionRequest::new(EntityKey::store_sku("STORE_001", "SKU_001"), start, end)
        .with_confidence_interval(true);

    let forecast = engine.predict(&request)?;
    println!("Forecast for {}:", forecast.entity_key);
    for point in &forecast.points {
        println!(
            "  {}  {:>7.1}  [{:.1}, {:.1}]",
            point.prediction_date.date_naive(),
            point.predicted_demand,
            point.confidence_lower.unwrap_or(0.0),
            point.confidence_upper.unwrap_or(0.0)
        );
    }

    // Bulk forecast for every SKU of a store
    let bulk = engine.bulk_predict(&BulkRequest {
        store_id: Some("STORE_002".to_string()),
        skus: engine.skus_for_store("STORE_002"),
        start_date: start,
        end_date: end,
        include_confidence_interval: false,
    })?;
    println!(
        "\nBulk: {}/{} SKUs predicted over {}",
        bulk.summary.predicted_skus, bulk.summary.total_skus, bulk.summary.date_range
    );

    Ok(())
}
