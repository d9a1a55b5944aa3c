//! Demand records and the in-memory store they are ingested into

use crate::error::{ForecastError, Result};
use crate::utils::parse_datetime;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::ops::Range;
use std::path::Path;

/// Identifies the series being forecast: a (store, SKU) pair or a bare product id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Store identifier, absent for product-level series
    pub store: Option<String>,
    /// SKU or product identifier
    pub sku: String,
}

impl EntityKey {
    /// Product-level key without a store
    pub fn product(sku: impl Into<String>) -> Self {
        Self {
            store: None,
            sku: sku.into(),
        }
    }

    /// Store-level key for one SKU
    pub fn store_sku(store: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            store: Some(store.into()),
            sku: sku.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.store {
            Some(store) => write!(f, "{}/{}", store, self.sku),
            None => write!(f, "{}", self.sku),
        }
    }
}

/// One observed demand value for an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub entity: EntityKey,
    pub timestamp: DateTime<Utc>,
    /// Units demanded, never negative
    pub demand_value: f64,
    pub price: Option<f64>,
    pub promotion: Option<bool>,
    pub weather_condition: Option<String>,
    pub seasonality_factor: Option<f64>,
}

impl DemandRecord {
    /// Create a record with no exogenous attributes
    pub fn new(entity: EntityKey, timestamp: DateTime<Utc>, demand_value: f64) -> Self {
        Self {
            entity,
            timestamp,
            demand_value,
            price: None,
            promotion: None,
            weather_condition: None,
            seasonality_factor: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_promotion(mut self, promotion: bool) -> Self {
        self.promotion = Some(promotion);
        self
    }

    pub fn with_weather(mut self, weather: impl Into<String>) -> Self {
        self.weather_condition = Some(weather.into());
        self
    }

    pub fn with_seasonality(mut self, factor: f64) -> Self {
        self.seasonality_factor = Some(factor);
        self
    }

    /// Calendar date of the observation (UTC)
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    fn validate(&self) -> Result<()> {
        if self.entity.sku.trim().is_empty() {
            return Err(ForecastError::DataError(format!(
                "record at {} has an empty sku",
                self.timestamp
            )));
        }
        if !self.demand_value.is_finite() || self.demand_value < 0.0 {
            return Err(ForecastError::DataError(format!(
                "record for '{}' at {} has invalid demand {}",
                self.entity, self.timestamp, self.demand_value
            )));
        }
        if let Some(price) = self.price {
            if !price.is_finite() {
                return Err(ForecastError::DataError(format!(
                    "record for '{}' at {} has a non-finite price",
                    self.entity, self.timestamp
                )));
            }
        }
        if let Some(factor) = self.seasonality_factor {
            if !factor.is_finite() {
                return Err(ForecastError::DataError(format!(
                    "record for '{}' at {} has a non-finite seasonality factor",
                    self.entity, self.timestamp
                )));
            }
        }
        Ok(())
    }
}

/// Ingested records, sorted by entity then timestamp, with a per-entity index
#[derive(Debug, Clone, Default)]
pub struct DemandStore {
    records: Vec<DemandRecord>,
    index: BTreeMap<EntityKey, Range<usize>>,
}

impl DemandStore {
    /// Validate and index a batch of records
    ///
    /// Records are stably sorted by entity then timestamp, so records sharing a
    /// timestamp keep their input order.
    pub fn new(mut records: Vec<DemandRecord>) -> Result<Self> {
        for record in &records {
            record.validate()?;
        }

        records.sort_by(|a, b| {
            a.entity
                .cmp(&b.entity)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });

        let mut index: BTreeMap<EntityKey, Range<usize>> = BTreeMap::new();
        let mut start = 0;
        for i in 1..=records.len() {
            if i == records.len() || records[i].entity != records[start].entity {
                index.insert(records[start].entity.clone(), start..i);
                start = i;
            }
        }

        Ok(Self { records, index })
    }

    /// All records in entity/time order
    pub fn records(&self) -> &[DemandRecord] {
        &self.records
    }

    /// The records of one entity in time order
    pub fn history(&self, entity: &EntityKey) -> Option<&[DemandRecord]> {
        self.index
            .get(entity)
            .map(|range| &self.records[range.clone()])
    }

    /// Entities with at least one record, in key order
    pub fn entities(&self) -> impl Iterator<Item = &EntityKey> {
        self.index.keys()
    }

    /// Per-entity slices in key order
    pub fn entity_histories(&self) -> impl Iterator<Item = (&EntityKey, &[DemandRecord])> {
        self.index
            .iter()
            .map(|(key, range)| (key, &self.records[range.clone()]))
    }

    pub fn entity_count(&self) -> usize {
        self.index.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Flat CSV row shape accepted by [`load_csv`]
///
/// Expected header:
/// `store,sku,timestamp,demand_value,price,promotion,weather_condition,seasonality_factor`
/// where `store` and every column after `demand_value` may be empty.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    store: Option<String>,
    sku: String,
    timestamp: String,
    demand_value: f64,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    promotion: Option<bool>,
    #[serde(default)]
    weather_condition: Option<String>,
    #[serde(default)]
    seasonality_factor: Option<f64>,
}

impl CsvRow {
    fn into_record(self, line: usize) -> Result<DemandRecord> {
        let timestamp = parse_datetime(&self.timestamp).map_err(|e| {
            ForecastError::DataError(format!("Invalid timestamp at line {line}: {e}"))
        })?;

        let store = self.store.filter(|s| !s.trim().is_empty());
        Ok(DemandRecord {
            entity: EntityKey {
                store,
                sku: self.sku,
            },
            timestamp,
            demand_value: self.demand_value,
            price: self.price,
            promotion: self.promotion,
            weather_condition: self.weather_condition.filter(|s| !s.trim().is_empty()),
            seasonality_factor: self.seasonality_factor,
        })
    }
}

/// Load demand records from a CSV file
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<DemandRecord>> {
    let file = File::open(path)?;
    read_csv(file)
}

/// Read demand records from any CSV source
pub fn read_csv<R: std::io::Read>(reader: R) -> Result<Vec<DemandRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        records.push(row?.into_record(i + 2)?);
    }

    if records.is_empty() {
        return Err(ForecastError::DataError("No records found in CSV".to_string()));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::day_start;

    fn day(d: u32) -> DateTime<Utc> {
        day_start(NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
    }

    #[test]
    fn store_sorts_and_indexes_by_entity() {
        let a = EntityKey::store_sku("S1", "A");
        let b = EntityKey::store_sku("S1", "B");
        let store = DemandStore::new(vec![
            DemandRecord::new(b.clone(), day(2), 5.0),
            DemandRecord::new(a.clone(), day(3), 3.0),
            DemandRecord::new(a.clone(), day(1), 1.0),
            DemandRecord::new(b.clone(), day(1), 4.0),
        ])
        .unwrap();

        assert_eq!(store.len(), 4);
        assert_eq!(store.entity_count(), 2);

        let history: Vec<f64> = store
            .history(&a)
            .unwrap()
            .iter()
            .map(|r| r.demand_value)
            .collect();
        assert_eq!(history, vec![1.0, 3.0]);
        assert_eq!(store.history(&b).unwrap()[0].date(), day(1).date_naive());
        assert!(store.history(&EntityKey::product("A")).is_none());
    }

    #[test]
    fn rejects_negative_demand() {
        let err = DemandStore::new(vec![DemandRecord::new(
            EntityKey::product("P"),
            day(1),
            -1.0,
        )])
        .unwrap_err();
        assert!(matches!(err, ForecastError::DataError(_)));
    }

    #[test]
    fn entity_key_display() {
        assert_eq!(EntityKey::store_sku("S1", "A").to_string(), "S1/A");
        assert_eq!(EntityKey::product("PROD_001").to_string(), "PROD_001");
    }

    #[test]
    fn reads_csv_with_optional_columns() {
        let csv = "store,sku,timestamp,demand_value,price,promotion,weather_condition,seasonality_factor\n\
                   S1,A,2024-01-01,10,2.5,true,sunny,1.1\n\
                   ,P,2024-01-02T00:00:00Z,4,,,,\n";

        let records = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity, EntityKey::store_sku("S1", "A"));
        assert_eq!(records[0].promotion, Some(true));
        assert_eq!(records[0].weather_condition.as_deref(), Some("sunny"));
        assert_eq!(records[1].entity, EntityKey::product("P"));
        assert_eq!(records[1].price, None);
        assert_eq!(records[1].weather_condition, None);
    }
}
