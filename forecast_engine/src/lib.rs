//! # Forecast Engine
//!
//! A Rust library for retail demand forecasting across stores and SKUs.
//!
//! ## Features
//!
//! - Demand record ingestion with validation and a CSV adapter
//! - Feature engineering: calendar, exogenous, categorical, lag and rolling-window features
//! - Three regression families trained side by side (random forest, gradient boosting, least squares)
//! - Held-out evaluation (MAE, MSE, RMSE, R²) and automatic selection of the active model
//! - Recursive multi-day forecasts with normal-approximation confidence intervals
//! - Parallel bulk forecasts over thousands of SKUs with per-entity failure isolation
//! - Dataset statistics and store/SKU/promotion catalog queries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forecast_engine::prelude::*;
//! use chrono::NaiveDate;
//!
//! # fn main() -> forecast_engine::Result<()> {
//! let engine = DemandForecastEngine::new(EngineConfig::default())?;
//! engine.ingest(load_csv("demand.csv")?)?;
//!
//! let report = engine.train(TrainingOptions::default())?;
//! println!("active model: {}", report.active_model);
//!
//! let request = PredictionRequest::new(
//!     EntityKey::store_sku("STORE_001", "SKU_001"),
//!     NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
//! )
//! .with_confidence_interval(true);
//!
//! for point in engine.predict(&request)?.points {
//!     println!("{} {:.1}", point.prediction_date.date_naive(), point.predicted_demand);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bulk;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod predict;
pub mod registry;
pub mod split;
pub mod stats;
pub mod trainer;
pub mod utils;

pub use error::{ForecastError, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::bulk::{BulkRequest, BulkResponse, EntityOutcome, SkipReason};
    pub use crate::config::EngineConfig;
    pub use crate::data::{load_csv, DemandRecord, DemandStore, EntityKey};
    pub use crate::engine::{DemandForecastEngine, ModelInfo};
    pub use crate::error::{ForecastError, Result};
    pub use crate::features::Exogenous;
    pub use crate::models::ModelKind;
    pub use crate::predict::{ForecastPoint, ForecastResponse, PredictionRequest};
    pub use crate::trainer::{TrainingOptions, TrainingReport};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
