//! Domain error types for ci-weather.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use std::path::Path;

use crate::config::ConfigError;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Required input file is missing
    #[error("{0} not found")]
    NotFound(String),

    /// Input data could not be parsed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or compiled
    #[error("Configuration error: {0}")]
    Config(String),

    /// Output document could not be produced
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Build an I/O error that names the file involved.
    pub fn io_at(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound(path.display().to_string())
        } else {
            AppError::Io(format!("{}: {}", path.display(), err))
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Config(format!("YAML parsing error: {}", err))
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
