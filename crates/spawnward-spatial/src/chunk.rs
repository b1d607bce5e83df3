//! Chunk coordinates and packed chunk indices.
//!
//! # Key Format
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  ChunkIndex (8 bytes)                                      │
//! ├────────────────────────────────────────────────────────────┤
//! │  high 32 bits: chunk x (i32, two's complement)             │
//! │  low 32 bits:  chunk z (i32, two's complement)             │
//! └────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

/// Log2 of the chunk edge length.
pub const CHUNK_SHIFT: u32 = 5;

/// Chunk edge length in blocks.
pub const CHUNK_SIZE: i32 = 1 << CHUNK_SHIFT;

/// A chunk column packed into a single 64-bit key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkIndex(u64);

impl ChunkIndex {
    /// Pack chunk coordinates into an index.
    #[inline]
    #[must_use]
    pub const fn new(chunk_x: i32, chunk_z: i32) -> Self {
        Self(((chunk_x as u32 as u64) << 32) | (chunk_z as u32 as u64))
    }

    /// Index of the chunk containing an integer block position.
    #[inline]
    #[must_use]
    pub const fn from_block(block_x: i32, block_z: i32) -> Self {
        Self::new(block_x >> CHUNK_SHIFT, block_z >> CHUNK_SHIFT)
    }

    /// Index of the chunk containing a continuous world position.
    #[inline]
    #[must_use]
    pub fn containing(x: f64, z: f64) -> Self {
        Self::new(chunk_coord(x), chunk_coord(z))
    }

    /// Chunk x coordinate.
    #[inline]
    #[must_use]
    pub const fn x(self) -> i32 {
        (self.0 >> 32) as i32
    }

    /// Chunk z coordinate.
    #[inline]
    #[must_use]
    pub const fn z(self) -> i32 {
        self.0 as i32
    }

    /// Raw packed bits.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuild an index from raw packed bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Lowest block x inside this chunk.
    #[inline]
    #[must_use]
    pub const fn min_block_x(self) -> i32 {
        self.x() << CHUNK_SHIFT
    }

    /// Lowest block z inside this chunk.
    #[inline]
    #[must_use]
    pub const fn min_block_z(self) -> i32 {
        self.z() << CHUNK_SHIFT
    }
}

impl fmt::Debug for ChunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkIndex({}, {})", self.x(), self.z())
    }
}

impl fmt::Display for ChunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk({}, {})", self.x(), self.z())
    }
}

/// Convert a continuous block coordinate to its chunk coordinate.
#[inline]
#[must_use]
pub(crate) fn chunk_coord(block: f64) -> i32 {
    (block / f64::from(CHUNK_SIZE)).floor() as i32
}

/// Inclusive rectangle of chunk coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRange {
    pub min_x: i32,
    pub max_x: i32,
    pub min_z: i32,
    pub max_z: i32,
}

impl ChunkRange {
    /// Check whether a chunk lies inside the rectangle.
    #[inline]
    #[must_use]
    pub const fn contains(&self, chunk_x: i32, chunk_z: i32) -> bool {
        chunk_x >= self.min_x && chunk_x <= self.max_x && chunk_z >= self.min_z && chunk_z <= self.max_z
    }

    /// Number of chunks in the rectangle.
    #[must_use]
    pub fn len(&self) -> usize {
        let width = i64::from(self.max_x) - i64::from(self.min_x) + 1;
        let depth = i64::from(self.max_z) - i64::from(self.min_z) + 1;
        (width.max(0) * depth.max(0)) as usize
    }

    /// Check if the rectangle is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every chunk coordinate in the rectangle, x-major.
    pub fn iter(self) -> impl Iterator<Item = (i32, i32)> {
        (self.min_x..=self.max_x).flat_map(move |cx| (self.min_z..=self.max_z).map(move |cz| (cx, cz)))
    }
}

/// A point in world space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Chunk column containing this position.
    #[must_use]
    pub fn chunk(&self) -> ChunkIndex {
        ChunkIndex::containing(self.x, self.z)
    }

    /// Integer block height of this position.
    #[must_use]
    pub fn block_y(&self) -> i32 {
        self.y.floor() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip_signed() {
        for (x, z) in [(0, 0), (10, -5), (-1, -1), (i32::MIN, i32::MAX), (i32::MAX, i32::MIN)] {
            let index = ChunkIndex::new(x, z);
            assert_eq!((index.x(), index.z()), (x, z));
        }
    }

    #[test]
    fn test_distinct_coordinates_distinct_keys() {
        // Negative z must not bleed into the x half.
        assert_ne!(ChunkIndex::new(0, -1), ChunkIndex::new(-1, -1));
        assert_ne!(ChunkIndex::new(1, 0), ChunkIndex::new(0, 1));
    }

    #[test]
    fn test_block_to_chunk() {
        assert_eq!(ChunkIndex::from_block(0, 0), ChunkIndex::new(0, 0));
        assert_eq!(ChunkIndex::from_block(31, 31), ChunkIndex::new(0, 0));
        assert_eq!(ChunkIndex::from_block(32, 0), ChunkIndex::new(1, 0));
        assert_eq!(ChunkIndex::from_block(-1, -32), ChunkIndex::new(-1, -1));
        assert_eq!(ChunkIndex::from_block(-33, 0), ChunkIndex::new(-2, 0));
    }

    #[test]
    fn test_continuous_position_to_chunk() {
        assert_eq!(ChunkIndex::containing(31.9, 0.0), ChunkIndex::new(0, 0));
        assert_eq!(ChunkIndex::containing(-0.1, 0.0), ChunkIndex::new(-1, 0));
        assert_eq!(Position::new(64.0, 10.0, -64.0).chunk(), ChunkIndex::new(2, -2));
    }

    #[test]
    fn test_chunk_min_blocks() {
        let index = ChunkIndex::new(-2, 3);
        assert_eq!(index.min_block_x(), -64);
        assert_eq!(index.min_block_z(), 96);
    }

    #[test]
    fn test_range_iteration() {
        let range = ChunkRange {
            min_x: -1,
            max_x: 0,
            min_z: -1,
            max_z: 1,
        };
        let chunks: Vec<_> = range.iter().collect();
        assert_eq!(chunks.len(), range.len());
        assert_eq!(chunks.len(), 6);
        assert!(chunks.contains(&(-1, 1)));
        assert!(range.contains(0, -1));
        assert!(!range.contains(1, 0));
    }

    #[test]
    fn test_display() {
        assert_eq!(ChunkIndex::new(10, -5).to_string(), "chunk(10, -5)");
    }
}
