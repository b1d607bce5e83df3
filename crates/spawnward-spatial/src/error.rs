//! Geometry error types.

use thiserror::Error;

/// Invalid boundary parameters, reported at construction.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    /// Sphere or cylinder radius was zero or negative.
    #[error("radius must be positive: {0}")]
    NonPositiveRadius(f64),

    /// A coordinate or radius was NaN or infinite.
    #[error("coordinate is not finite: {0}")]
    NonFinite(f64),

    /// A coordinate lies beyond [`MAX_COORDINATE`](crate::MAX_COORDINATE).
    #[error("coordinate out of range: {0}")]
    OutOfRange(f64),

    /// Horizontal extent exceeds [`MAX_HORIZONTAL_SPAN`](crate::MAX_HORIZONTAL_SPAN) blocks.
    #[error("horizontal extent too large: {0} blocks")]
    TooLarge(f64),
}
