use spawnward_persist::PersistError;
use spawnward_suppression::SyncError;
use spawnward_zone::ZoneError;
use thiserror::Error;

/// Configuration file error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Service operation error.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("world {0} is not registered")]
    UnknownWorld(String),

    #[error("world {0} is already registered")]
    WorldAlreadyRegistered(String),

    #[error(transparent)]
    Zone(#[from] ZoneError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}
