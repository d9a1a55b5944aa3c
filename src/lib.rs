//! # Demand Forecast
//!
//! Workspace facade over the demand forecasting crates.
//!
//! - [`forecast_engine`]: ingestion, feature engineering, model training,
//!   single and bulk forecasts
//! - [`demand_math`]: rolling-window statistics, descriptive summaries and the
//!   dense solver used by least squares
//!
//! ## Example
//!
//! ```
//! use demand_forecast_workspace::forecast_engine::prelude::*;
//!
//! let engine = DemandForecastEngine::new(EngineConfig::default()).unwrap();
//! assert!(!engine.is_trained());
//! assert_eq!(engine.model_info().registry_version, 0);
//! ```

pub use demand_math;
pub use forecast_engine;

pub use forecast_engine::prelude;
