//! Serialized zone records.
//!
//! Records mirror the on-disk JSON layout. They are plain data; converting a
//! record into a [`SpawnZone`] re-validates the boundary and filter.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use spawnward_spatial::{Boundary, Position};
use spawnward_zone::{SpawnZone, TimeOfDay, ZoneFilter, ZoneMode};
use uuid::Uuid;

use crate::error::PersistError;

/// A point in block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Position> for PointRecord {
    fn from(pos: Position) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            z: pos.z,
        }
    }
}

impl From<PointRecord> for Position {
    fn from(point: PointRecord) -> Self {
        Self::new(point.x, point.y, point.z)
    }
}

/// Boundary shape, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BoundaryRecord {
    Cuboid {
        min: PointRecord,
        max: PointRecord,
    },
    Sphere {
        center: PointRecord,
        radius: f64,
    },
    #[serde(rename_all = "camelCase")]
    Cylinder {
        center_x: f64,
        center_z: f64,
        radius: f64,
        min_y: f64,
        max_y: f64,
    },
}

impl From<&Boundary> for BoundaryRecord {
    fn from(boundary: &Boundary) -> Self {
        match boundary {
            Boundary::Cuboid(c) => Self::Cuboid {
                min: c.min().into(),
                max: c.max().into(),
            },
            Boundary::Sphere(s) => Self::Sphere {
                center: s.center().into(),
                radius: s.radius(),
            },
            Boundary::Cylinder(c) => Self::Cylinder {
                center_x: c.center_x(),
                center_z: c.center_z(),
                radius: c.radius(),
                min_y: c.min_y(),
                max_y: c.max_y(),
            },
        }
    }
}

impl TryFrom<&BoundaryRecord> for Boundary {
    type Error = PersistError;

    fn try_from(record: &BoundaryRecord) -> Result<Self, Self::Error> {
        let boundary = match *record {
            BoundaryRecord::Cuboid { min, max } => Self::cuboid(min.into(), max.into())?,
            BoundaryRecord::Sphere { center, radius } => Self::sphere(center.into(), radius)?,
            BoundaryRecord::Cylinder {
                center_x,
                center_z,
                radius,
                min_y,
                max_y,
            } => Self::cylinder(center_x, center_z, radius, min_y, max_y)?,
        };
        Ok(boundary)
    }
}

/// Filter criteria. Absent criteria are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRecord {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_light: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_light: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_y: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub times: BTreeSet<TimeOfDay>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub moon_phases: BTreeSet<u8>,
}

impl FilterRecord {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&ZoneFilter> for FilterRecord {
    fn from(filter: &ZoneFilter) -> Self {
        Self {
            roles: filter.roles().map(str::to_owned).collect(),
            groups: filter.groups().map(str::to_owned).collect(),
            min_light: filter.min_light(),
            max_light: filter.max_light(),
            min_y: filter.min_y(),
            max_y: filter.max_y(),
            times: filter.times().collect(),
            moon_phases: filter.moon_phases().collect(),
        }
    }
}

impl TryFrom<&FilterRecord> for ZoneFilter {
    type Error = PersistError;

    fn try_from(record: &FilterRecord) -> Result<Self, Self::Error> {
        let mut builder = Self::builder()
            .roles(record.roles.iter().cloned())
            .groups(record.groups.iter().cloned())
            .times(record.times.iter().copied())
            .moon_phases(record.moon_phases.iter().copied());
        if let Some(level) = record.min_light {
            builder = builder.min_light(level);
        }
        if let Some(level) = record.max_light {
            builder = builder.max_light(level);
        }
        if let Some(y) = record.min_y {
            builder = builder.min_y(y);
        }
        if let Some(y) = record.max_y {
            builder = builder.max_y(y);
        }
        Ok(builder.build()?)
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_rate_multiplier() -> f64 {
    1.0
}

/// One zone as stored in the zone file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRecord {
    pub id: Uuid,
    pub name: String,
    pub world: String,
    pub boundary: BoundaryRecord,
    #[serde(default)]
    pub mode: ZoneMode,
    #[serde(default, skip_serializing_if = "FilterRecord::is_empty")]
    pub filter: FilterRecord,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_rate_multiplier")]
    pub rate_multiplier: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitute: Option<String>,
}

impl From<&SpawnZone> for ZoneRecord {
    fn from(zone: &SpawnZone) -> Self {
        Self {
            id: zone.id(),
            name: zone.name().to_owned(),
            world: zone.world().to_owned(),
            boundary: zone.boundary().into(),
            mode: zone.mode(),
            filter: zone.filter().into(),
            priority: zone.priority(),
            enabled: zone.is_enabled(),
            rate_multiplier: zone.rate_multiplier(),
            substitute: zone.substitute().map(str::to_owned),
        }
    }
}

impl TryFrom<ZoneRecord> for SpawnZone {
    type Error = PersistError;

    /// The filter comes back uncompiled.
    fn try_from(record: ZoneRecord) -> Result<Self, Self::Error> {
        let boundary = Boundary::try_from(&record.boundary)?;
        let filter = ZoneFilter::try_from(&record.filter)?;
        Ok(Self::with_id(record.id, record.name, record.world, boundary)
            .with_mode(record.mode)
            .with_filter(filter)
            .with_priority(record.priority)
            .with_enabled(record.enabled)
            .with_rate_multiplier(record.rate_multiplier)
            .with_substitute(record.substitute))
    }
}
