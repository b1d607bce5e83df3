//! Spawnward spatial primitives.
//!
//! The map is divided into square columns ("chunks") of [`CHUNK_SIZE`] blocks.
//! Zones are described by a [`Boundary`], which can answer exact point
//! containment and a conservative chunk-intersection test used for indexing.
//!
//! ```text
//!   block x ──► chunk x = x >> CHUNK_SHIFT
//!   (cx, cz) ──► ChunkIndex = (cx << 32) | (cz as u32)
//! ```

mod boundary;
mod chunk;
mod error;

pub use boundary::{Aabb, Boundary, Cuboid, Cylinder, MAX_COORDINATE, MAX_HORIZONTAL_SPAN, Sphere};
pub use chunk::{CHUNK_SHIFT, CHUNK_SIZE, ChunkIndex, ChunkRange, Position};
pub use error::GeometryError;
