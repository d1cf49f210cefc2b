//! Periodic save RAM writer
//!
//! One worker thread per persistent memory region. The main thread copies
//! the region every `interval` and hands the copy over only if its CRC
//! changed; the worker does the file I/O. Dropping an [`Autosave`] flushes
//! and joins its worker.

use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::plugin::Core;
use crate::savefile::{self, SaveFile};

pub struct Autosave {
    file: SaveFile,
    interval: Duration,
    last_check: Instant,
    last_crc: Option<u32>,
    tx: Option<SyncSender<Vec<u8>>>,
    handle: Option<JoinHandle<()>>,
}

impl Autosave {
    /// Spawn the worker for `file`.
    pub fn spawn(file: SaveFile, interval: Duration) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(1);
        let path = file.path.clone();
        let handle = thread::Builder::new()
            .name(format!("autosave-{}", file.id))
            .spawn(move || {
                tracing::debug!(path = %path.display(), "Autosave thread started");
                while let Ok(data) = rx.recv() {
                    match savefile::write(&path, &data) {
                        Ok(()) => tracing::debug!(path = %path.display(), "Autosaved"),
                        Err(e) => tracing::warn!(error = %e, "Autosave failed"),
                    }
                }
                tracing::debug!(path = %path.display(), "Autosave thread finished");
            })?;

        Ok(Self {
            file,
            interval,
            last_check: Instant::now(),
            last_crc: None,
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn file(&self) -> &SaveFile {
        &self.file
    }

    /// Offer the region to the worker if the interval elapsed.
    pub fn tick(&mut self, core: &mut dyn Core) {
        if self.last_check.elapsed() < self.interval {
            return;
        }
        self.last_check = Instant::now();
        self.offer(core);
    }

    /// Offer the region now, skipping unchanged contents. Returns true if a
    /// copy was handed to the worker.
    pub fn offer(&mut self, core: &mut dyn Core) -> bool {
        let Some(region) = core.memory_data(self.file.id).filter(|r| !r.is_empty()) else {
            return false;
        };
        let crc = crc32fast::hash(region);
        if self.last_crc == Some(crc) {
            return false;
        }
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(region.to_vec()) {
            Ok(()) => {
                self.last_crc = Some(crc);
                true
            }
            // Worker still busy with the previous copy; retry next interval.
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!(path = %self.file.path.display(), "Autosave thread gone");
                self.tx = None;
                false
            }
        }
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!(path = %self.file.path.display(), "Autosave thread panicked");
        }
    }
}

/// Start one worker per non-empty persistent region of the core.
pub fn init(core: &mut dyn Core, files: &[SaveFile], interval: Duration) -> Vec<Autosave> {
    let mut workers = Vec::new();
    for file in files {
        if core.memory_size(file.id) == 0 {
            continue;
        }
        match Autosave::spawn(file.clone(), interval) {
            Ok(worker) => workers.push(worker),
            Err(e) => tracing::warn!(
                path = %file.path.display(),
                error = %e,
                "Could not start autosave thread"
            ),
        }
    }
    if !workers.is_empty() {
        tracing::info!(
            regions = workers.len(),
            interval_secs = interval.as_secs(),
            "Autosave enabled"
        );
    }
    workers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::savefile::save_files;
    use crate::test_utils::TestCore;

    #[test]
    fn test_only_nonempty_regions_get_workers() {
        let dir = tempfile::tempdir().unwrap();
        let files = save_files(dir.path(), "game");
        let mut core = TestCore::new().with_sram(8);
        let workers = init(&mut core, &files, Duration::from_secs(10));
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].file().path, files[0].path);
    }

    #[test]
    fn test_changed_region_is_written_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let files = save_files(dir.path(), "game");
        let mut core = TestCore::new().with_sram(8);
        let mut worker = Autosave::spawn(files[0].clone(), Duration::ZERO).unwrap();

        core.sram_mut().fill(3);
        assert!(worker.offer(&mut core));
        drop(worker);
        assert_eq!(std::fs::read(&files[0].path).unwrap(), vec![3u8; 8]);
    }

    #[test]
    fn test_unchanged_region_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let files = save_files(dir.path(), "game");
        let mut core = TestCore::new().with_sram(8);
        let mut worker = Autosave::spawn(files[0].clone(), Duration::ZERO).unwrap();

        assert!(worker.offer(&mut core));
        // Let the worker drain the first copy.
        let deadline = Instant::now() + Duration::from_secs(5);
        while !files[0].path.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!worker.offer(&mut core));
    }
}
