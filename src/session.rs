// Download session - one engine, one progress record, one download at a time

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::engine::{AudioEngine, TrackInfo, YtDlpEngine};
use crate::error::{Error, Result};
use crate::options::DownloadOptions;
use crate::progress::{Progress, ProgressTracker};

/// A download session: an engine plus the progress record its events feed.
///
/// Each session tracks its own progress, so concurrent sessions never
/// overwrite each other's records. Within a session, only one download
/// may run at a time; a second call fails fast with [`Error::SessionBusy`].
pub struct DownloadSession {
    engine: Arc<dyn AudioEngine>,
    options: DownloadOptions,
    tracker: ProgressTracker,
    in_flight: AtomicBool,
}

impl DownloadSession {
    pub fn new(engine: Arc<dyn AudioEngine>, options: DownloadOptions) -> Self {
        Self {
            engine,
            options,
            tracker: ProgressTracker::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Session backed by a discovered yt-dlp binary and default options.
    pub fn with_defaults() -> Result<Self> {
        let engine = YtDlpEngine::discover()?;
        Ok(Self::new(Arc::new(engine), DownloadOptions::default()))
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Current progress; a copy, safe to poll from another task.
    pub fn progress(&self) -> Progress {
        self.tracker.snapshot()
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Probe metadata for a single video without downloading it.
    pub async fn inspect(&self, url: &str) -> Result<TrackInfo> {
        self.engine.inspect(url, &self.options).await
    }

    /// Download the audio stream of `url` into `output_dir`.
    ///
    /// Blocks (asynchronously) until the engine exits and returns the path
    /// of the file it produced. Engine failures pass through unmodified.
    pub async fn download_audio(&self, url: &str, output_dir: &Path) -> Result<PathBuf> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidUrl("empty URL".to_string()));
        }

        let _guard = FlightGuard::acquire(&self.in_flight)?;

        info!("downloading {} via {}", url, self.engine.name());
        self.engine
            .download(url, output_dir, &self.options, &self.tracker)
            .await
    }
}

/// Marks a session busy for as long as it is alive.
///
/// Clears the in-flight flag on every exit path, including cancellation.
pub(crate) struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| Error::SessionBusy)?;
        Ok(Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
