//! Zone boundary shapes.
//!
//! A [`Boundary`] is one of exactly three shapes. All shapes are immutable
//! once built; constructors validate their parameters and never clamp.
//!
//! Chunk intersection treats a chunk as the continuous square
//! `[min_block, min_block + CHUNK_SIZE)` on both horizontal axes, so any chunk
//! holding a contained point is reported as intersecting. Round shapes use a
//! closest-point test against that square and may report a chunk whose corner
//! the circle only just misses; callers re-check exact containment per point.

use std::f64::consts::PI;
use std::fmt;

use crate::chunk::{CHUNK_SIZE, ChunkRange, chunk_coord};
use crate::error::GeometryError;
use crate::Position;

/// Largest absolute value accepted for any coordinate.
pub const MAX_COORDINATE: f64 = 30_000_000.0;

/// Widest extent a boundary may cover along X or Z, in blocks.
///
/// Bounds the chunk rectangle of a single zone to 512 x 512 columns.
pub const MAX_HORIZONTAL_SPAN: f64 = 16_384.0;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Position,
    pub max: Position,
}

impl Aabb {
    /// Chunk rectangle covered by this box.
    #[must_use]
    pub fn chunk_range(&self) -> ChunkRange {
        ChunkRange {
            min_x: chunk_coord(self.min.x),
            max_x: chunk_coord(self.max.x),
            min_z: chunk_coord(self.min.z),
            max_z: chunk_coord(self.max.z),
        }
    }
}

/// Rectangular box with inclusive faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cuboid {
    min: Position,
    max: Position,
}

impl Cuboid {
    /// Build a box from two opposite corners in any order.
    pub fn new(a: Position, b: Position) -> Result<Self, GeometryError> {
        for value in [a.x, a.y, a.z, b.x, b.y, b.z] {
            coordinate(value)?;
        }
        span((a.x - b.x).abs())?;
        span((a.z - b.z).abs())?;
        Ok(Self {
            min: Position::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Position::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        })
    }

    #[must_use]
    pub const fn min(&self) -> Position {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> Position {
        self.max
    }

    #[inline]
    fn contains(&self, x: f64, y: f64, z: f64) -> bool {
        x >= self.min.x
            && x <= self.max.x
            && y >= self.min.y
            && y <= self.max.y
            && z >= self.min.z
            && z <= self.max.z
    }

    fn overlaps_square(&self, min_x: f64, min_z: f64) -> bool {
        let size = f64::from(CHUNK_SIZE);
        self.max.x >= min_x && self.min.x < min_x + size && self.max.z >= min_z && self.min.z < min_z + size
    }
}

/// Ball around a center point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    center: Position,
    radius: f64,
    radius_sq: f64,
}

impl Sphere {
    /// Build a sphere. The radius must be strictly positive.
    pub fn new(center: Position, radius: f64) -> Result<Self, GeometryError> {
        for value in [center.x, center.y, center.z, radius] {
            coordinate(value)?;
        }
        if radius <= 0.0 {
            return Err(GeometryError::NonPositiveRadius(radius));
        }
        span(radius * 2.0)?;
        Ok(Self {
            center,
            radius,
            radius_sq: radius * radius,
        })
    }

    #[must_use]
    pub const fn center(&self) -> Position {
        self.center
    }

    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    fn contains(&self, x: f64, y: f64, z: f64) -> bool {
        let dx = x - self.center.x;
        let dy = y - self.center.y;
        let dz = z - self.center.z;
        dx * dx + dy * dy + dz * dz <= self.radius_sq
    }
}

/// Vertical cylinder: a disc in the XZ plane extruded between two heights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    center_x: f64,
    center_z: f64,
    radius: f64,
    radius_sq: f64,
    min_y: f64,
    max_y: f64,
}

impl Cylinder {
    /// Build a cylinder. Heights may be given in any order.
    pub fn new(center_x: f64, center_z: f64, radius: f64, y1: f64, y2: f64) -> Result<Self, GeometryError> {
        for value in [center_x, center_z, radius, y1, y2] {
            coordinate(value)?;
        }
        if radius <= 0.0 {
            return Err(GeometryError::NonPositiveRadius(radius));
        }
        span(radius * 2.0)?;
        Ok(Self {
            center_x,
            center_z,
            radius,
            radius_sq: radius * radius,
            min_y: y1.min(y2),
            max_y: y1.max(y2),
        })
    }

    #[must_use]
    pub const fn center_x(&self) -> f64 {
        self.center_x
    }

    #[must_use]
    pub const fn center_z(&self) -> f64 {
        self.center_z
    }

    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    #[must_use]
    pub const fn min_y(&self) -> f64 {
        self.min_y
    }

    #[must_use]
    pub const fn max_y(&self) -> f64 {
        self.max_y
    }

    #[inline]
    fn contains(&self, x: f64, y: f64, z: f64) -> bool {
        // Height first: it rejects most points without any multiplication.
        if y < self.min_y || y > self.max_y {
            return false;
        }
        let dx = x - self.center_x;
        let dz = z - self.center_z;
        dx * dx + dz * dz <= self.radius_sq
    }
}

/// The spatial extent of a zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary {
    Cuboid(Cuboid),
    Sphere(Sphere),
    Cylinder(Cylinder),
}

impl Boundary {
    /// Box spanning two corners.
    pub fn cuboid(a: Position, b: Position) -> Result<Self, GeometryError> {
        Cuboid::new(a, b).map(Self::Cuboid)
    }

    /// Sphere around `center`.
    pub fn sphere(center: Position, radius: f64) -> Result<Self, GeometryError> {
        Sphere::new(center, radius).map(Self::Sphere)
    }

    /// Vertical cylinder around `(center_x, center_z)` between `y1` and `y2`.
    pub fn cylinder(center_x: f64, center_z: f64, radius: f64, y1: f64, y2: f64) -> Result<Self, GeometryError> {
        Cylinder::new(center_x, center_z, radius, y1, y2).map(Self::Cylinder)
    }

    /// Short lowercase identifier of the shape.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Cuboid(_) => "cuboid",
            Self::Sphere(_) => "sphere",
            Self::Cylinder(_) => "cylinder",
        }
    }

    /// Exact containment test. Points on the surface are inside.
    #[inline]
    #[must_use]
    pub fn contains(&self, pos: Position) -> bool {
        match self {
            Self::Cuboid(c) => c.contains(pos.x, pos.y, pos.z),
            Self::Sphere(s) => s.contains(pos.x, pos.y, pos.z),
            Self::Cylinder(c) => c.contains(pos.x, pos.y, pos.z),
        }
    }

    /// Conservative test for whether this boundary reaches into a chunk column.
    ///
    /// Never returns `false` for a chunk that holds a contained point. Only
    /// chunks inside [`Boundary::chunk_range`] can intersect.
    #[must_use]
    pub fn intersects_chunk(&self, chunk_x: i32, chunk_z: i32) -> bool {
        if !self.chunk_range().contains(chunk_x, chunk_z) {
            return false;
        }

        let min_x = f64::from(chunk_x) * f64::from(CHUNK_SIZE);
        let min_z = f64::from(chunk_z) * f64::from(CHUNK_SIZE);

        match self {
            Self::Cuboid(c) => c.overlaps_square(min_x, min_z),
            Self::Sphere(s) => circle_touches_square(s.center.x, s.center.z, s.radius_sq, min_x, min_z),
            Self::Cylinder(c) => circle_touches_square(c.center_x, c.center_z, c.radius_sq, min_x, min_z),
        }
    }

    /// Axis-aligned bounding box.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        match self {
            Self::Cuboid(c) => Aabb { min: c.min, max: c.max },
            Self::Sphere(s) => Aabb {
                min: Position::new(s.center.x - s.radius, s.center.y - s.radius, s.center.z - s.radius),
                max: Position::new(s.center.x + s.radius, s.center.y + s.radius, s.center.z + s.radius),
            },
            Self::Cylinder(c) => Aabb {
                min: Position::new(c.center_x - c.radius, c.min_y, c.center_z - c.radius),
                max: Position::new(c.center_x + c.radius, c.max_y, c.center_z + c.radius),
            },
        }
    }

    /// Chunk rectangle covered by the bounding box.
    #[must_use]
    pub fn chunk_range(&self) -> ChunkRange {
        self.aabb().chunk_range()
    }

    /// Inclusive integer height range: floor of the lowest point to ceil of the highest.
    #[must_use]
    pub fn block_y_range(&self) -> (i32, i32) {
        let aabb = self.aabb();
        (aabb.min.y.floor() as i32, aabb.max.y.ceil() as i32)
    }

    /// Volume in cubic blocks. Diagnostics only.
    #[must_use]
    pub fn volume(&self) -> f64 {
        match self {
            Self::Cuboid(c) => (c.max.x - c.min.x) * (c.max.y - c.min.y) * (c.max.z - c.min.z),
            Self::Sphere(s) => 4.0 / 3.0 * PI * s.radius * s.radius * s.radius,
            Self::Cylinder(c) => PI * c.radius_sq * (c.max_y - c.min_y),
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cuboid(c) => write!(
                f,
                "Cuboid from ({:.1}, {:.1}, {:.1}) to ({:.1}, {:.1}, {:.1})",
                c.min.x, c.min.y, c.min.z, c.max.x, c.max.y, c.max.z
            ),
            Self::Sphere(s) => write!(
                f,
                "Sphere at ({:.1}, {:.1}, {:.1}) with radius {:.1}",
                s.center.x, s.center.y, s.center.z, s.radius
            ),
            Self::Cylinder(c) => write!(
                f,
                "Cylinder at ({:.1}, {:.1}) with radius {:.1}, Y: {:.1} to {:.1}",
                c.center_x, c.center_z, c.radius, c.min_y, c.max_y
            ),
        }
    }
}

/// Closest-point test between a circle and a chunk square.
#[inline]
fn circle_touches_square(center_x: f64, center_z: f64, radius_sq: f64, min_x: f64, min_z: f64) -> bool {
    let size = f64::from(CHUNK_SIZE);
    let closest_x = center_x.clamp(min_x, min_x + size);
    let closest_z = center_z.clamp(min_z, min_z + size);
    let dx = center_x - closest_x;
    let dz = center_z - closest_z;
    dx * dx + dz * dz <= radius_sq
}

fn coordinate(value: f64) -> Result<(), GeometryError> {
    if !value.is_finite() {
        return Err(GeometryError::NonFinite(value));
    }
    if value.abs() > MAX_COORDINATE {
        return Err(GeometryError::OutOfRange(value));
    }
    Ok(())
}

fn span(extent: f64) -> Result<(), GeometryError> {
    if extent > MAX_HORIZONTAL_SPAN {
        Err(GeometryError::TooLarge(extent))
    } else {
        Ok(())
    }
}
