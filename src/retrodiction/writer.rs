//! SnapshotWriter - persists retrodiction reports off the turn loop
//!
//! A dedicated thread drains a bounded queue and writes
//! `snapshot_results_{snapshot_id}.json`. Submitting never blocks: a full
//! queue drops the report with a warning. Failed writes are retried, then
//! dropped with an error log.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::core::config::StorageConfig;
use crate::core::error::{PulseError, Result};
use crate::core::types::SnapshotId;
use crate::retrodiction::counterfactual::RetrodictionReport;

/// Pause between write attempts
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

pub fn snapshot_file_name(id: SnapshotId) -> String {
    format!("snapshot_results_{}.json", id)
}

/// Write one report synchronously
pub fn persist_report(directory: &Path, report: &RetrodictionReport) -> Result<PathBuf> {
    let path = directory.join(snapshot_file_name(report.snapshot.id));
    let failure = |reason: String| PulseError::SnapshotPersistence {
        path: path.clone(),
        reason,
    };
    fs::create_dir_all(directory).map_err(|e| failure(e.to_string()))?;
    let json = serde_json::to_string_pretty(report).map_err(|e| failure(e.to_string()))?;
    fs::write(&path, json).map_err(|e| failure(e.to_string()))?;
    Ok(path)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterStats {
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WriterStats {
        WriterStats {
            written: self.written.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct SnapshotWriter {
    tx: Option<Sender<RetrodictionReport>>,
    handle: Option<JoinHandle<()>>,
    directory: PathBuf,
    counters: Arc<Counters>,
}

impl SnapshotWriter {
    /// Start the writer thread
    pub fn spawn(config: &StorageConfig) -> Result<Self> {
        let (tx, rx) = bounded::<RetrodictionReport>(config.writer_queue_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let directory = config.directory.clone();
        let retries = config.write_retries;

        let thread_counters = Arc::clone(&counters);
        let thread_dir = directory.clone();
        let handle = thread::Builder::new()
            .name("pulse-snapshot-writer".to_string())
            .spawn(move || {
                for report in rx.iter() {
                    write_with_retries(&thread_dir, &report, retries, &thread_counters);
                }
                tracing::debug!("Snapshot writer stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            directory,
            counters,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Queue a report; false when it was dropped
    pub fn submit(&self, report: RetrodictionReport) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(report) {
            Ok(()) => true,
            Err(TrySendError::Full(report)) => {
                tracing::warn!(snapshot = %report.snapshot.id, "Snapshot writer queue full; dropping report");
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(report)) => {
                tracing::warn!(snapshot = %report.snapshot.id, "Snapshot writer stopped; dropping report");
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn stats(&self) -> WriterStats {
        self.counters.snapshot()
    }

    /// Finish queued writes and stop the thread
    pub fn shutdown(mut self) -> WriterStats {
        self.stop();
        self.counters.snapshot()
    }

    fn stop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Snapshot writer thread panicked");
            }
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn write_with_retries(directory: &Path, report: &RetrodictionReport, retries: u32, counters: &Counters) {
    for attempt in 0..=retries {
        match persist_report(directory, report) {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "Snapshot results written");
                counters.written.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) if attempt < retries => {
                tracing::warn!(attempt, error = %e, "Snapshot write failed; retrying");
                thread::sleep(RETRY_BACKOFF);
            }
            Err(e) => {
                tracing::error!(snapshot = %report.snapshot.id, error = %e, "Snapshot write failed; dropping");
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RetrodictionConfig;
    use crate::retrodiction::trigger::RetrodictionTrigger;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn report() -> RetrodictionReport {
        let mut trigger = RetrodictionTrigger::new(&RetrodictionConfig::default());
        RetrodictionReport {
            snapshot: trigger.manual(None, BTreeMap::new()),
            generated_at: Utc::now(),
            results: Vec::new(),
        }
    }

    #[test]
    fn test_persist_report_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let report = report();
        let path = persist_report(dir.path(), &report).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("snapshot_results_{}.json", report.snapshot.id)
        );
        let loaded: RetrodictionReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.snapshot.id, report.snapshot.id);
    }

    #[test]
    fn test_writer_thread_writes_all() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::spawn(&StorageConfig {
            directory: dir.path().join("results"),
            ..StorageConfig::default()
        })
        .unwrap();

        for _ in 0..3 {
            assert!(writer.submit(report()));
        }
        let stats = writer.shutdown();

        assert_eq!(stats.written, 3);
        assert_eq!(fs::read_dir(dir.path().join("results")).unwrap().count(), 3);
    }

    #[test]
    fn test_unwritable_directory_counts_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let writer = SnapshotWriter::spawn(&StorageConfig {
            directory: blocker.join("results"),
            write_retries: 1,
            ..StorageConfig::default()
        })
        .unwrap();

        writer.submit(report());
        let stats = writer.shutdown();

        assert_eq!(stats.written, 0);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_persist_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = persist_report(&blocker, &report()).unwrap_err();
        assert!(matches!(err, PulseError::SnapshotPersistence { .. }));
    }
}
