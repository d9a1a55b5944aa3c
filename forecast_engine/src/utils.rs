//! Date helpers and a synthetic demand generator

use crate::data::{DemandRecord, EntityKey};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Midnight UTC of a calendar date
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Parse an RFC 3339 timestamp, a naive `YYYY-MM-DD HH:MM:SS` timestamp, or a bare date
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(day_start(date));
    }
    Err(ForecastError::DataError(format!("Unrecognized timestamp: {s}")))
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| ForecastError::InvalidParameter(format!("Invalid date '{s}': {e}")))
}

/// Every calendar day in `[start, end]`, ascending
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if end < start {
        return Err(ForecastError::InvalidRange { start, end });
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

/// Number of calendar days in `[start, end]`, 0 when the range is inverted
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> usize {
    let days = (end - start).num_days();
    if days < 0 {
        0
    } else {
        days as usize + 1
    }
}

/// Shape of a generated demand dataset
#[derive(Debug, Clone)]
pub struct SyntheticShape {
    pub stores: Vec<String>,
    pub skus: Vec<String>,
    pub start: NaiveDate,
    pub days: usize,
    pub seed: u64,
}

impl Default for SyntheticShape {
    fn default() -> Self {
        Self {
            stores: vec!["STORE_001".to_string(), "STORE_002".to_string()],
            skus: (1..=5).map(|i| format!("SKU_{i:03}")).collect(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            days: 120,
            seed: 42,
        }
    }
}

const WEATHER: [&str; 4] = ["sunny", "cloudy", "rainy", "snowy"];

/// Generate daily demand with weekly and yearly seasonality, promotions and noise
pub fn generate_demand_records(shape: &SyntheticShape) -> Result<Vec<DemandRecord>> {
    let mut rng = ChaCha8Rng::seed_from_u64(shape.seed);
    let noise = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::InvalidParameter(format!("Noise distribution: {e}")))?;

    let mut records = Vec::with_capacity(shape.stores.len() * shape.skus.len() * shape.days);
    for store in &shape.stores {
        for sku in &shape.skus {
            let base = rng.gen_range(20.0f64..120.0);
            let base_price = rng.gen_range(2.0f64..25.0);

            for offset in 0..shape.days {
                let date = shape.start + Duration::days(offset as i64);
                let weekday = date.weekday().num_days_from_monday();
                let weekly = if weekday >= 5 { 1.25 } else { 1.0 };
                let yearly = 1.0 + 0.2 * (2.0 * PI * date.ordinal() as f64 / 365.0).sin();
                let promotion = rng.gen_bool(0.1);
                let lift = if promotion { 1.4 } else { 1.0 };

                let expected = base * weekly * yearly * lift;
                let demand = (expected + noise.sample(&mut rng) * expected * 0.1).max(0.0);
                let price = if promotion { base_price * 0.8 } else { base_price };
                let weather = WEATHER[rng.gen_range(0..WEATHER.len())];

                records.push(
                    DemandRecord::new(EntityKey::store_sku(store, sku), day_start(date), demand.round())
                        .with_price((price * 100.0).round() / 100.0)
                        .with_promotion(promotion)
                        .with_weather(weather)
                        .with_seasonality(yearly),
                );
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(parse_datetime("2024-01-02").unwrap(), expected);
        assert_eq!(parse_datetime("2024-01-02T00:00:00Z").unwrap(), expected);
        assert_eq!(parse_datetime("2024-01-02 00:00:00").unwrap(), expected);
        assert!(parse_datetime("02/01/2024").is_err());
    }

    #[test]
    fn date_range_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let days = date_range(start, end).unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], start);
        assert_eq!(days[3], end);
        assert_eq!(days_inclusive(start, end), 4);
        assert!(date_range(end, start).is_err());
    }

    #[test]
    fn generator_is_seeded() {
        let shape = SyntheticShape {
            days: 10,
            ..Default::default()
        };
        let a = generate_demand_records(&shape).unwrap();
        let b = generate_demand_records(&shape).unwrap();
        assert_eq!(a.len(), 2 * 5 * 10);
        assert_eq!(a, b);
        assert!(a.iter().all(|r| r.demand_value >= 0.0));
    }
}
