//! # Demand Math
//!
//! Numeric building blocks for demand forecasting.
//! This crate provides the trailing-window statistics used for rolling
//! features, descriptive summaries over demand values, and the small dense
//! solver behind least-squares fitting.

use thiserror::Error;

pub mod linalg;
pub mod rolling;
pub mod summary;

pub use linalg::solve_symmetric;
pub use rolling::RollingWindow;
pub use summary::Summary;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Singular system: {0}")]
    Singular(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_their_context() {
        let err = MathError::InvalidInput("window must be positive".to_string());
        assert_eq!(err.to_string(), "Invalid input: window must be positive");
    }
}
