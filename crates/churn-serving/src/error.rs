//! Error types for the churn-serving crate.
//!
//! This module defines all error types used by model loading, input
//! collection, prediction and rendering.

use thiserror::Error;

/// Result type alias for serving operations.
pub type ServingResult<T> = Result<T, ServingError>;

/// Errors that can occur while loading a model or serving a prediction.
#[derive(Debug, Error)]
pub enum ServingError {
    /// Model loading failed.
    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    /// A form field held a value outside its domain.
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput {
        /// Key of the offending field.
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Prediction failed.
    #[error("Prediction failed: {0}")]
    PredictionError(String),

    /// Operation not allowed in the current session state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ServingError {
    /// Create a model load error.
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoadError(msg.into())
    }

    /// Create an invalid input error for a field.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a prediction error.
    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::PredictionError(msg.into())
    }

    /// Create an invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if this is a client error (bad input).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::ModelLoadError(_) | Self::PredictionError(_) | Self::IoError(_)
        )
    }
}

impl From<candle_core::Error> for ServingError {
    fn from(err: candle_core::Error) -> Self {
        ServingError::PredictionError(err.to_string())
    }
}
