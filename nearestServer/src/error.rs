//! Error types shared across the store, query and configuration layers.

use std::path::PathBuf;

/// Configuration rejected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("radius must be a positive, finite number of meters (got {0})")]
    InvalidRadius(f64),
    #[error("center ({lat}, {lon}) is outside lat [-90, 90] / lon [-180, 180]")]
    InvalidCenter { lat: f64, lon: f64 },
    #[error("point count must be at least 1")]
    InvalidPointCount,
    #[error("{0} interval must be greater than zero")]
    InvalidInterval(&'static str),
    #[error("k must be at least 1")]
    InvalidK,
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Coordinate generation failed; the caller skips the tick.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeneratorError {
    #[error("sampling radius must be positive and finite (got {0})")]
    InvalidRadius(f64),
    #[error("generated a non-finite coordinate ({lat}, {lon})")]
    NonFinite { lat: f64, lon: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("nearest query against an empty point set")]
    EmptySet,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("point identifier must not be empty")]
    EmptyId,
    #[error("coordinate ({lat}, {lon}) is not a valid latitude/longitude")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}
