//! The JSON zone file.
//!
//! ```text
//! <data_dir>/zones.json       current document
//! <data_dir>/zones.json.tmp   written first, renamed over zones.json
//! <data_dir>/zones.json.bak   previous document, refreshed on every save
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use spawnward_zone::SpawnZone;

use crate::error::{PersistError, PersistResult};
use crate::record::ZoneRecord;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

const FILE_NAME: &str = "zones.json";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteDocument<'a> {
    schema_version: u32,
    last_saved: u64,
    zones: &'a [ZoneRecord],
}

/// Zones are kept as raw values so one bad record does not sink the file.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadDocument {
    #[serde(default)]
    schema_version: u32,
    #[serde(default)]
    zones: Vec<serde_json::Value>,
}

/// Zone file inside a data directory.
#[derive(Debug, Clone)]
pub struct ZoneFile {
    path: PathBuf,
}

impl ZoneFile {
    /// Zone file at `<data_dir>/zones.json`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::at(data_dir.as_ref().join(FILE_NAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.with_suffix("bak")
    }

    fn temp_path(&self) -> PathBuf {
        self.with_suffix("tmp")
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Read every valid zone. A missing file yields no zones.
    ///
    /// Records that fail to parse or validate are skipped with a warning.
    /// Filters come back uncompiled.
    pub fn load(&self) -> PersistResult<Vec<SpawnZone>> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no zone file; starting empty");
            return Ok(Vec::new());
        }

        let bytes = fs::read(&self.path)?;
        let document: ReadDocument = serde_json::from_slice(&bytes)?;
        if document.schema_version > SCHEMA_VERSION {
            tracing::warn!(
                path = %self.path.display(),
                found = document.schema_version,
                supported = SCHEMA_VERSION,
                "zone file was written by a newer version; unknown fields are ignored"
            );
        }

        let total = document.zones.len();
        let mut zones = Vec::with_capacity(total);
        for (position, value) in document.zones.into_iter().enumerate() {
            let zone = serde_json::from_value::<ZoneRecord>(value)
                .map_err(PersistError::from)
                .and_then(SpawnZone::try_from);
            match zone {
                Ok(zone) => zones.push(zone),
                Err(e) => tracing::warn!(path = %self.path.display(), position, error = %e, "skipping zone record"),
            }
        }

        tracing::info!(path = %self.path.display(), loaded = zones.len(), skipped = total - zones.len(), "loaded zone file");
        Ok(zones)
    }

    /// Write `zones`, keeping the previous file as a backup.
    ///
    /// Returns the number of zones written.
    pub fn save<'a, I>(&self, zones: I) -> PersistResult<usize>
    where
        I: IntoIterator<Item = &'a SpawnZone>,
    {
        let records: Vec<ZoneRecord> = zones.into_iter().map(ZoneRecord::from).collect();
        let document = WriteDocument {
            schema_version: SCHEMA_VERSION,
            last_saved: unix_millis(),
            zones: &records,
        };

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let temp = self.temp_path();
        fs::write(&temp, serde_json::to_vec_pretty(&document)?)?;
        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }
        fs::rename(&temp, &self.path)?;

        tracing::debug!(path = %self.path.display(), zones = records.len(), "saved zone file");
        Ok(records.len())
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use spawnward_spatial::{Boundary, Position};
    use spawnward_zone::{ZoneFilter, ZoneMode};

    use super::*;

    fn zone(name: &str) -> SpawnZone {
        SpawnZone::new(
            name,
            "overworld",
            Boundary::cuboid(Position::new(-10.0, 0.0, -10.0), Position::new(10.0, 50.0, 10.0)).unwrap(),
        )
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = ZoneFile::in_dir(dir.path());
        assert!(file.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = ZoneFile::in_dir(dir.path());
        let deny = zone("deny")
            .with_mode(ZoneMode::Deny)
            .with_filter(ZoneFilter::builder().group("hostile").build().unwrap());
        let spawn = zone("spawn").with_priority(10);

        assert_eq!(file.save([&deny, &spawn]).unwrap(), 2);
        assert!(!file.temp_path().exists());

        let loaded = file.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id(), deny.id());
        assert_eq!(loaded[0].mode(), ZoneMode::Deny);
        assert_eq!(loaded[0].filter(), deny.filter());
        assert_eq!(loaded[1].name(), "spawn");
        assert_eq!(loaded[1].priority(), 10);
    }

    #[test]
    fn test_document_header() {
        let dir = tempfile::tempdir().unwrap();
        let file = ZoneFile::in_dir(dir.path());
        file.save([&zone("spawn")]).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&fs::read(file.path()).unwrap()).unwrap();
        assert_eq!(value["schemaVersion"], json!(1));
        assert!(value["lastSaved"].as_u64().unwrap() > 0);
        assert_eq!(value["zones"][0]["boundary"]["type"], json!("cuboid"));
        assert_eq!(value["zones"][0]["mode"], json!("block"));
    }

    #[test]
    fn test_second_save_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let file = ZoneFile::in_dir(dir.path());
        file.save([&zone("first")]).unwrap();
        assert!(!file.backup_path().exists());

        file.save([&zone("second")]).unwrap();
        let backup = ZoneFile::at(file.backup_path()).load().unwrap();
        assert_eq!(backup.len(), 1);
        assert_eq!(backup[0].name(), "first");
        assert_eq!(file.load().unwrap()[0].name(), "second");
    }

    #[test]
    fn test_bad_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = ZoneFile::in_dir(dir.path());
        let document = json!({
            "schemaVersion": 1,
            "zones": [
                {"name": "no-id", "world": "overworld"},
                {
                    "id": "6f1c7d1e-8a4b-4c2d-9e3f-0a1b2c3d4e5f",
                    "name": "bad-radius",
                    "world": "overworld",
                    "boundary": {"type": "sphere", "center": {"x": 0.0, "y": 0.0, "z": 0.0}, "radius": 0.0}
                },
                {
                    "id": "0b7e4a52-1c9d-4f3e-8a6b-5d2c1e0f9a8b",
                    "name": "good",
                    "world": "overworld",
                    "boundary": {"type": "sphere", "center": {"x": 0.0, "y": 0.0, "z": 0.0}, "radius": 4.0}
                }
            ]
        });
        fs::write(file.path(), document.to_string()).unwrap();

        let loaded = file.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name(), "good");
    }

    #[test]
    fn test_newer_schema_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let file = ZoneFile::in_dir(dir.path());
        let document = json!({
            "schemaVersion": 7,
            "futureField": true,
            "zones": [{
                "id": "0b7e4a52-1c9d-4f3e-8a6b-5d2c1e0f9a8b",
                "name": "good",
                "world": "nether",
                "boundary": {"type": "cylinder", "centerX": 0.0, "centerZ": 0.0, "radius": 4.0, "minY": 0.0, "maxY": 9.0}
            }]
        });
        fs::write(file.path(), document.to_string()).unwrap();

        let loaded = file.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].world(), "nether");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = ZoneFile::in_dir(dir.path());
        fs::write(file.path(), "{ not json").unwrap();
        assert!(matches!(file.load(), Err(PersistError::Json(_))));
    }
}
