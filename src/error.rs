//! Error types for hierarchy construction, optimization and forecasting

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, StrategyError>;

/// Errors raised for invalid input or configuration.
///
/// Solver non-convergence and infeasible contribution bounds are not errors:
/// the optimizer falls back and the builder repairs, so neither shows up here.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// Contribution bounds are inverted after clamping into [0, 1]
    #[error("Invalid contribution bounds on unit '{unit}': min {min} exceeds max {max}")]
    InvalidBounds { unit: String, min: f64, max: f64 },

    /// A numeric input is NaN, infinite, or out of its domain
    #[error("Invalid {field} on unit '{unit}': {value}")]
    InvalidValue {
        unit: String,
        field: &'static str,
        value: f64,
    },

    /// A level was handed to the optimizer without any sub-units
    #[error("Unit '{unit}' has no sub-units to allocate")]
    EmptyLevel { unit: String },

    /// Invalid run configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Hierarchy description error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StrategyError {
    /// Create an invalid bounds error
    pub fn invalid_bounds(unit: impl Into<String>, min: f64, max: f64) -> Self {
        Self::InvalidBounds {
            unit: unit.into(),
            min,
            max,
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(unit: impl Into<String>, field: &'static str, value: f64) -> Self {
        Self::InvalidValue {
            unit: unit.into(),
            field,
            value,
        }
    }

    /// Create an empty level error
    pub fn empty_level(unit: impl Into<String>) -> Self {
        Self::EmptyLevel { unit: unit.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
