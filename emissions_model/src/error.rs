use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while resolving a city to a snapshot.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The id is not in the registry, or no data source exists and the
    /// synthetic fallback is disabled.
    #[error("city '{0}' not found")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed data in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl LoadError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LoadError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum EstimateError {
    #[error("pricing intensity must be within [0, 100], got {0}")]
    InvalidIntensity(f64),
}

/// Failures while reading the startup reference tables.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
