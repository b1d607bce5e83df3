//! Spawnward runner.
//!
//! This binary:
//! 1. Loads `config.json` from the data directory (writing defaults if missing)
//! 2. Loads `zones.json` and compiles every zone filter
//! 3. Registers the configured worlds against in-memory suppression stores
//! 4. Verifies the spatial index and logs a summary
//! 5. Saves changed zones every `auto_save_interval_minutes` until Ctrl-C
//! 6. On shutdown, saves once more and clears every world's store
//!
//! The data directory is the first argument, else `SPAWNWARD_DATA_DIR`, else
//! `./spawnward`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;

use spawnward_persist::ZoneFile;
use spawnward_runner::{AutoSaver, CatalogRoleResolver, SpawnControl, SpawnwardConfig};
use spawnward_suppression::{MemorySuppressionStore, SuppressionStore};
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, reload};

const CRATES: [&str; 5] = [
    "spawnward",
    "spawnward_runner",
    "spawnward_zone",
    "spawnward_suppression",
    "spawnward_persist",
];

fn env_filter(debug: bool) -> eyre::Result<EnvFilter> {
    let level = if debug { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for krate in CRATES {
        filter = filter.add_directive(format!("{krate}={level}").parse()?);
    }
    Ok(filter)
}

fn main() -> eyre::Result<()> {
    // Initialize logging; the level is raised once the config is read
    let (filter, filter_handle) = reload::Layer::new(env_filter(false)?);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("SPAWNWARD_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("spawnward"));
    info!("Data directory: {}", data_dir.display());

    let config = SpawnwardConfig::load_or_create(&data_dir)?;
    if config.debug_mode {
        filter_handle.reload(env_filter(true)?)?;
        debug!("Debug logging enabled");
    }

    let resolver = Arc::new(CatalogRoleResolver::from_config(&config));
    let control = SpawnControl::new(config.clone(), resolver);

    let zone_file = ZoneFile::in_dir(&data_dir);
    let loaded = control.load_zones(&zone_file)?;
    info!("Loaded {} zone(s) from {}", loaded, zone_file.path().display());

    for world in &config.worlds {
        let store: Arc<dyn SuppressionStore> = Arc::new(MemorySuppressionStore::new());
        match control.register_world(world, Some(store)) {
            Ok(report) => info!(
                "{}: {} cached zone(s) in {} chunk(s); {}",
                world, report.cache.zones, report.cache.chunks, report.sync
            ),
            Err(e) => warn!("Failed to register world {}: {}", world, e),
        }
    }

    control.registry().verify_index()?;
    let stats = control.registry().stats();
    info!(
        "{} zone(s) across {} world(s), {} indexed chunk(s)",
        stats.zones, stats.worlds, stats.indexed_chunks
    );

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    let saver = AutoSaver::start(Arc::clone(&control), zone_file, config.auto_save_interval())?;
    info!("Running; press Ctrl-C to stop");
    let _ = stop_rx.recv();

    info!("Shutting down...");
    match saver.stop() {
        Ok(Some(saved)) => info!("Saved {} zone(s)", saved),
        Ok(None) => debug!("No zone changes to save"),
        Err(e) => warn!("Final save failed: {}", e),
    }

    for world in control.worlds() {
        if let Err(e) = control.unregister_world(&world) {
            warn!("Failed to unregister world {}: {}", world, e);
        }
    }
    info!("Shutdown complete");
    Ok(())
}
