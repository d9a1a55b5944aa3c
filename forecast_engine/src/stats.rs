//! Dataset statistics and catalog queries over a [`DemandStore`]

use crate::data::{DemandRecord, DemandStore};
use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use demand_math::Summary;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Trailing window of the store summary, in days
pub const STORE_SUMMARY_DAYS: i64 = 30;

/// Number of SKUs listed in a store summary
pub const TOP_SKUS: usize = 10;

/// First and last calendar day covered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl std::fmt::Display for DateSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromotionStats {
    /// Records flagged as promoted
    pub promotion_days: usize,
    /// Share of records flagged as promoted
    pub promotion_rate: f64,
}

/// Overview of the ingested dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStatistics {
    pub total_records: usize,
    pub unique_entities: usize,
    pub unique_stores: usize,
    pub unique_products: usize,
    /// None when the store is empty
    pub date_range: Option<DateSpan>,
    /// None when the store is empty
    pub demand: Option<Summary>,
    pub promotions: PromotionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuDemand {
    pub sku: String,
    pub total_demand: f64,
}

/// Recent activity of one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub store_id: String,
    pub total_skus: usize,
    /// Trailing window ending at the store's latest record
    pub period: DateSpan,
    pub total_demand_30d: f64,
    pub avg_daily_demand_30d: f64,
    pub promotion_days_30d: usize,
    /// Highest total demand over the whole history, ties by sku
    pub top_skus: Vec<SkuDemand>,
}

/// A promoted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionEntry {
    pub date: NaiveDate,
    pub store: Option<String>,
    pub sku: String,
    pub demand_value: f64,
    pub price: Option<f64>,
}

impl DemandStore {
    /// Counts, covered dates, demand summary and promotion share
    pub fn statistics(&self) -> Result<DataStatistics> {
        let records = self.records();
        let date_range = date_span(records);
        let demand = if records.is_empty() {
            None
        } else {
            let values: Vec<f64> = records.iter().map(|r| r.demand_value).collect();
            Some(Summary::from_values(&values)?)
        };

        let promotion_days = records
            .iter()
            .filter(|r| r.promotion == Some(true))
            .count();
        let promotion_rate = if records.is_empty() {
            0.0
        } else {
            promotion_days as f64 / records.len() as f64
        };

        let products: BTreeSet<&str> = self.entities().map(|e| e.sku.as_str()).collect();

        Ok(DataStatistics {
            total_records: records.len(),
            unique_entities: self.entity_count(),
            unique_stores: self.stores().len(),
            unique_products: products.len(),
            date_range,
            demand,
            promotions: PromotionStats {
                promotion_days,
                promotion_rate,
            },
        })
    }

    /// Sorted distinct store ids
    pub fn stores(&self) -> Vec<String> {
        self.entities()
            .filter_map(|e| e.store.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sorted distinct SKUs of one store
    pub fn skus_for_store(&self, store: &str) -> Vec<String> {
        // entities are ordered by store then sku, so this is already sorted
        self.entities()
            .filter(|e| e.store.as_deref() == Some(store))
            .map(|e| e.sku.clone())
            .collect()
    }

    /// Trailing 30-day activity and top SKUs of one store
    pub fn store_summary(&self, store: &str) -> Result<StoreSummary> {
        let mut store_records: Vec<&DemandRecord> = Vec::new();
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for (entity, records) in self.entity_histories() {
            if entity.store.as_deref() != Some(store) {
                continue;
            }
            totals.insert(
                entity.sku.as_str(),
                records.iter().map(|r| r.demand_value).sum(),
            );
            store_records.extend(records);
        }

        let latest = store_records
            .iter()
            .map(|r| r.date())
            .max()
            .ok_or_else(|| ForecastError::EntityNotFound {
                entity_key: store.to_string(),
            })?;
        let period = DateSpan {
            start: latest - Duration::days(STORE_SUMMARY_DAYS - 1),
            end: latest,
        };

        let recent: Vec<&&DemandRecord> = store_records
            .iter()
            .filter(|r| r.date() >= period.start)
            .collect();
        let total_demand_30d: f64 = recent.iter().map(|r| r.demand_value).sum();
        let active_days: BTreeSet<NaiveDate> = recent.iter().map(|r| r.date()).collect();
        let promotion_days_30d = recent.iter().filter(|r| r.promotion == Some(true)).count();

        let mut top_skus: Vec<SkuDemand> = totals
            .into_iter()
            .map(|(sku, total_demand)| SkuDemand {
                sku: sku.to_string(),
                total_demand,
            })
            .collect();
        let total_skus = top_skus.len();
        top_skus.sort_by(|a, b| {
            b.total_demand
                .total_cmp(&a.total_demand)
                .then_with(|| a.sku.cmp(&b.sku))
        });
        top_skus.truncate(TOP_SKUS);

        Ok(StoreSummary {
            store_id: store.to_string(),
            total_skus,
            period,
            total_demand_30d,
            avg_daily_demand_30d: total_demand_30d / active_days.len().max(1) as f64,
            promotion_days_30d,
            top_skus,
        })
    }

    /// Every promoted record, in entity/time order
    pub fn promotions(&self) -> Vec<PromotionEntry> {
        self.records()
            .iter()
            .filter(|r| r.promotion == Some(true))
            .map(|r| PromotionEntry {
                date: r.date(),
                store: r.entity.store.clone(),
                sku: r.entity.sku.clone(),
                demand_value: r.demand_value,
                price: r.price,
            })
            .collect()
    }
}

fn date_span(records: &[DemandRecord]) -> Option<DateSpan> {
    let start = records.iter().map(DemandRecord::date).min()?;
    let end = records.iter().map(DemandRecord::date).max()?;
    Some(DateSpan { start, end })
}
