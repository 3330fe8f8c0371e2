// Engine abstraction - the external program that extracts and downloads audio

mod parse;
pub mod ytdlp;

pub use ytdlp::YtDlpEngine;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::options::DownloadOptions;
use crate::progress::ProgressSink;

/// Metadata for a single track, probed before download.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub thumbnail: String,
}

/// Driver for an external download engine.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Whether the engine's binary is present on this machine.
    fn is_available(&self) -> bool;

    /// Probe track metadata without downloading anything.
    async fn inspect(&self, url: &str, options: &DownloadOptions) -> Result<TrackInfo>;

    /// Download the selected stream for `url` into `dest_dir` and resolve
    /// the final file path.
    ///
    /// Pushes zero or more downloading updates followed by exactly one
    /// finished update into `sink` before returning `Ok`. A finished update
    /// means the engine reported its transfer complete, not that the call
    /// succeeded: an engine failing after the transfer phase may push
    /// finished and still return `Err` with its error as-is. The call runs
    /// until the engine completes or fails; there is no cancellation or
    /// timeout.
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        options: &DownloadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf>;
}
