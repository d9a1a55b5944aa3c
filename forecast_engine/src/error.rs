//! Error types for the forecast_engine crate

use crate::models::ModelKind;
use chrono::NaiveDate;
use thiserror::Error;

/// Custom error types for the forecast_engine crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Insufficient or malformed ingested data
    #[error("Data error: {0}")]
    DataError(String),

    /// Every model family failed during a training run
    #[error("Training error: {0}")]
    TrainingError(String),

    /// Prediction requested before any successful training run
    #[error("No trained model is available; run training first")]
    NotTrained,

    /// No history exists for the requested entity
    #[error("No history found for entity '{entity_key}'")]
    EntityNotFound { entity_key: String },

    /// Malformed date range
    #[error("Invalid date range: end date {end} is before start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// The requested model family was not produced by the last training run
    #[error("Model '{kind}' is not available in the current registry")]
    ModelUnavailable { kind: ModelKind },

    /// A single model family failed to fit or predict
    #[error("Model '{kind}' failed: {message}")]
    ModelError { kind: ModelKind, message: String },

    /// A bulk deadline expired before the work finished
    #[error("Timed out while forecasting '{entity_key}'")]
    Timeout { entity_key: String },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from numeric building blocks
    #[error("Math error: {0}")]
    MathError(#[from] demand_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV decoding
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON encoding
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;
