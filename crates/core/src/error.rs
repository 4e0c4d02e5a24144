//! Error types for the forecasting pipeline.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the forecasting pipeline.
///
/// Numeric degeneracies (zero denominators, short windows) are not errors:
/// they surface as NaN in the computed features.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or missing input arrays, or a feature width mismatch.
    #[error("Input shape error: {0}")]
    InputShape(String),

    /// Not enough rows to perform the requested operation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Learner failure.
    #[error("Model error: {0}")]
    Model(String),

    /// Load/save failure on a model artifact or a data file.
    #[error("Persistence error at {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an input shape error.
    pub fn input_shape(msg: impl Into<String>) -> Self {
        Error::InputShape(msg.into())
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::InsufficientData(msg.into())
    }

    /// Create a model error.
    pub fn model(msg: impl Into<String>) -> Self {
        Error::Model(msg.into())
    }

    /// Create a persistence error carrying the offending path.
    pub fn persistence(path: impl AsRef<Path>, err: impl Display) -> Self {
        Error::Persistence {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }
}
