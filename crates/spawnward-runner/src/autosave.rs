//! Periodic zone saving.
//!
//! ```text
//!   AutoSaver::start ──► worker: every interval ──► save_if_dirty
//!   AutoSaver::stop  ──► signal + join ──► final save_if_dirty
//! ```

use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use spawnward_persist::ZoneFile;

use crate::control::SpawnControl;
use crate::error::ControlError;

/// Background thread that saves dirty zones on a fixed interval.
///
/// Dropping the saver stops the thread without a final save; call
/// [`AutoSaver::stop`] on shutdown to flush pending edits.
#[derive(Debug)]
pub struct AutoSaver {
    control: Arc<SpawnControl>,
    file: ZoneFile,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl AutoSaver {
    /// Spawn the saving thread.
    pub fn start(control: Arc<SpawnControl>, file: ZoneFile, interval: Duration) -> io::Result<Self> {
        let (shutdown, signal) = mpsc::channel::<()>();
        let worker = {
            let control = Arc::clone(&control);
            let file = file.clone();
            thread::Builder::new()
                .name("spawnward-autosave".into())
                .spawn(move || {
                    // Any message or a dropped sender ends the loop.
                    while let Err(RecvTimeoutError::Timeout) = signal.recv_timeout(interval) {
                        if let Err(e) = control.save_if_dirty(&file) {
                            tracing::warn!(path = %file.path().display(), error = %e, "auto-save failed");
                        }
                    }
                    tracing::debug!("auto-save thread stopped");
                })?
        };
        tracing::info!(interval_secs = interval.as_secs(), path = %file.path().display(), "auto-save started");

        Ok(Self {
            control,
            file,
            shutdown: Some(shutdown),
            worker: Some(worker),
        })
    }

    /// Stop the thread and save anything still dirty.
    ///
    /// Returns the number of zones written by the final save, or `None` when
    /// nothing had changed since the last one.
    pub fn stop(mut self) -> Result<Option<usize>, ControlError> {
        self.halt();
        self.control.save_if_dirty(&self.file)
    }

    fn halt(&mut self) {
        drop(self.shutdown.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("auto-save thread panicked");
            }
        }
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use spawnward_spatial::{Boundary, Position};

    use super::*;
    use crate::{CatalogRoleResolver, SpawnwardConfig};

    fn control() -> Arc<SpawnControl> {
        SpawnControl::new(SpawnwardConfig::default(), Arc::new(CatalogRoleResolver::new()))
    }

    fn ball(x: f64) -> Boundary {
        Boundary::sphere(Position::new(x, 64.0, 0.0), 5.0).unwrap()
    }

    #[test]
    fn test_saves_on_interval_and_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let file = ZoneFile::in_dir(dir.path());
        let control = control();
        let saver = AutoSaver::start(Arc::clone(&control), file.clone(), Duration::from_millis(20)).unwrap();

        control.create_zone("first", "overworld", ball(0.0)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !file.path().exists() {
            assert!(Instant::now() < deadline, "auto-save never wrote {}", file.path().display());
            thread::sleep(Duration::from_millis(5));
        }

        control.create_zone("second", "overworld", ball(100.0)).unwrap();
        saver.stop().unwrap();
        assert!(!control.registry().is_dirty());

        let names: Vec<_> = file.load().unwrap().iter().map(|zone| zone.name().to_owned()).collect();
        assert_eq!(names, vec!["first".to_owned(), "second".to_owned()]);
    }

    #[test]
    fn test_stop_without_changes_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = ZoneFile::in_dir(dir.path());
        let saver = AutoSaver::start(control(), file.clone(), Duration::from_secs(3600)).unwrap();

        assert_eq!(saver.stop().unwrap(), None);
        assert!(!file.path().exists());
    }

    #[test]
    fn test_drop_stops_thread_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let saver = AutoSaver::start(control(), ZoneFile::in_dir(dir.path()), Duration::from_secs(3600)).unwrap();
        let started = Instant::now();
        drop(saver);
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
