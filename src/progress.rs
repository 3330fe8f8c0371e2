// Progress tracking - per-session download state shared with pollers

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Phase of a download as seen by pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// No download has produced an event yet
    #[default]
    Idle,
    /// Bytes are flowing
    Downloading,
    /// The engine reported completion
    Finished,
}

/// Snapshot of a download's progress.
///
/// Snapshots are plain values; mutating one never affects the tracker it
/// came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub status: DownloadStatus,
    /// Bytes transferred so far
    pub downloaded: u64,
    /// Expected size in bytes; 0 while unknown
    pub total: u64,
    /// Name the engine is writing to; empty until the first event supplies one
    pub filename: String,
}

impl Progress {
    /// Completion percentage in `[0.0, 100.0]`; 0.0 while the total is unknown.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.downloaded as f64 / self.total as f64 * 100.0).min(100.0)
    }
}

/// One progress notification pushed by a download engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// Bytes are moving; fields the engine did not report are `None`
    Downloading {
        downloaded: Option<u64>,
        total: Option<u64>,
        total_estimate: Option<u64>,
        filename: Option<String>,
    },
    /// Terminal update for a completed transfer
    Finished { filename: Option<String> },
    /// The engine flagged the transfer as failing; the error itself arrives
    /// through the download call's result, not through the record
    Errored,
    /// A status string outside the known set
    Other(String),
}

/// Receiver for typed progress updates.
///
/// [`ProgressTracker`] implements this, and so does any
/// `Fn(ProgressUpdate) + Send + Sync` closure, so embedders can observe the
/// raw event stream instead of (or in addition to) the record.
pub trait ProgressSink: Send + Sync {
    fn push(&self, update: ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn push(&self, update: ProgressUpdate) {
        self(update)
    }
}

/// Shared, cheaply clonable handle over one download's progress record.
///
/// The engine pushes updates in; pollers take snapshots out. Each tracker
/// belongs to one session. Nothing resets the record between downloads; a
/// new event stream simply overwrites the old values.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    record: Arc<Mutex<Progress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record by value.
    pub fn snapshot(&self) -> Progress {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressSink for ProgressTracker {
    fn push(&self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::Downloading {
                downloaded,
                total,
                total_estimate,
                filename,
            } => {
                let mut record = self.lock();
                record.status = DownloadStatus::Downloading;
                record.downloaded = downloaded.unwrap_or(0);
                // A zero in either field means the engine has no figure yet
                record.total = total
                    .filter(|&t| t > 0)
                    .or_else(|| total_estimate.filter(|&e| e > 0))
                    .unwrap_or(0);
                if let Some(name) = filename {
                    record.filename = name;
                }
            }
            ProgressUpdate::Finished { filename } => {
                let mut record = self.lock();
                record.status = DownloadStatus::Finished;
                if let Some(name) = filename {
                    record.filename = name;
                }
            }
            ProgressUpdate::Errored => {
                warn!("engine reported a failing transfer; record left as-is");
            }
            ProgressUpdate::Other(status) => {
                debug!("ignored unrecognized progress status: {}", status);
            }
        }
    }
}
