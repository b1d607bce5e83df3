//! Service configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spawnward_zone::{RoleIndex, ZoneMode, clamp_rate_multiplier};

use crate::error::ConfigError;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Settings read from `<data_dir>/config.json`. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnwardConfig {
    pub debug_mode: bool,
    pub auto_save_interval_minutes: u32,
    /// Mode given to zones created through the service.
    pub default_zone_mode: ZoneMode,
    /// Multiplied into every rate multiplier answer.
    pub global_spawn_multiplier: f64,
    /// Block every spawn everywhere.
    pub global_spawn_paused: bool,
    /// Worlds registered at start.
    pub worlds: Vec<String>,
    /// Static role catalog: role name to role index.
    pub roles: BTreeMap<String, RoleIndex>,
    /// Role groups: group name to member role names.
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Default for SpawnwardConfig {
    fn default() -> Self {
        Self {
            debug_mode: false,
            auto_save_interval_minutes: 5,
            default_zone_mode: ZoneMode::Block,
            global_spawn_multiplier: 1.0,
            global_spawn_paused: false,
            worlds: vec!["overworld".to_owned()],
            roles: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }
}

impl SpawnwardConfig {
    /// Read the configuration, writing defaults if the file does not exist.
    ///
    /// An unparsable file is left alone and defaults are used.
    pub fn load_or_create(data_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = data_dir.as_ref().join(CONFIG_FILE);
        if !path.exists() {
            let config = Self::default();
            config.save(&path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            return Ok(config);
        }

        let bytes = fs::read(&path)?;
        match serde_json::from_slice::<Self>(&bytes) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded configuration");
                Ok(config.normalized())
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "configuration unreadable; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Clamp out-of-range values.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.auto_save_interval_minutes = self.auto_save_interval_minutes.max(1);
        self.global_spawn_multiplier = clamp_rate_multiplier(self.global_spawn_multiplier);
        self
    }

    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.auto_save_interval_minutes) * 60)
    }
}
