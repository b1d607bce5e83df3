//! Persistence error types.

use spawnward_spatial::GeometryError;
use spawnward_zone::FilterError;
use thiserror::Error;

/// Zone file error type.
#[derive(Debug, Error)]
pub enum PersistError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file or a record is not valid JSON for its schema.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored boundary violates a shape invariant.
    #[error("invalid boundary: {0}")]
    Geometry(#[from] GeometryError),

    /// A stored filter is out of range.
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),
}

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;
