//! Zone error types.

use spawnward_spatial::GeometryError;
use thiserror::Error;

/// Zone registry and zone model errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneError {
    /// Another zone already uses this name (case-insensitive).
    #[error("a zone named '{0}' already exists")]
    DuplicateName(String),

    /// No zone matches the given id or name.
    #[error("zone not found: {0}")]
    NotFound(String),

    /// Zone names must be non-empty and free of whitespace.
    #[error("invalid zone name: '{0}'")]
    InvalidName(String),

    /// The zone's filter was changed and has not been compiled since.
    #[error("filter of zone '{0}' is not compiled")]
    FilterNotCompiled(String),

    /// The chunk index disagrees with the zone maps.
    #[error("spatial index inconsistent: {0}")]
    IndexInconsistent(String),

    /// Boundary construction failed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Filter criteria out of range.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Invalid filter criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Light levels run from 0 to 15.
    #[error("light level out of range (0-15): {0}")]
    LightOutOfRange(u8),

    /// Moon phases run from 0 to 7.
    #[error("moon phase out of range (0-7): {0}")]
    MoonPhaseOutOfRange(u8),
}

/// A textual identifier did not name any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Result type for zone operations.
pub type ZoneResult<T> = Result<T, ZoneError>;
