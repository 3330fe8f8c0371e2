// yt-dlp engine - spawns the binary and streams its progress into a sink

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::parse::{self, EngineLine};
use super::{AudioEngine, TrackInfo};
use crate::error::{Error, Result};
use crate::options::DownloadOptions;
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::tools::{self, ToolKind};

/// Seconds allowed for a metadata probe.
const INSPECT_TIMEOUT_SECS: u64 = 30;

/// Driver for the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary: PathBuf,
}

impl YtDlpEngine {
    /// Use a specific binary, e.g. a bundled one.
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Locate yt-dlp via `YTDLP_PATH`, common install paths, then `PATH`.
    pub fn discover() -> Result<Self> {
        tools::require(ToolKind::YtDlp).map(Self::new)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Argument list for a download; order is fixed so tests can pin it.
    fn download_args(&self, url: &str, dest_dir: &Path, options: &DownloadOptions) -> Vec<String> {
        let mut args = vec!["-f".to_string(), options.format.clone()];
        if !options.playlist {
            // A playlist URL downloads only its primary item
            args.push("--no-playlist".to_string());
        }
        args.extend([
            "--newline".to_string(),
            "--no-warnings".to_string(),
            // --print implies quiet mode; --progress keeps template lines flowing
            "--progress".to_string(),
            "--progress-template".to_string(),
            parse::PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            parse::SAVED_TEMPLATE.to_string(),
            "-P".to_string(),
            dest_dir.display().to_string(),
            "-o".to_string(),
            options.output_template.clone(),
        ]);
        if let Some(proxy) = &options.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        if let Some(secs) = options.socket_timeout {
            args.push("--socket-timeout".to_string());
            args.push(secs.to_string());
        }
        args.push(url.to_string());
        args
    }

    fn inspect_args(&self, url: &str, options: &DownloadOptions) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        if let Some(proxy) = &options.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        if let Some(secs) = options.socket_timeout {
            args.push("--socket-timeout".to_string());
            args.push(secs.to_string());
        }
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl AudioEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn is_available(&self) -> bool {
        self.binary.exists() || which::which(&self.binary).is_ok()
    }

    async fn inspect(&self, url: &str, options: &DownloadOptions) -> Result<TrackInfo> {
        let args = self.inspect_args(url, options);
        debug!("probing metadata: {} {:?}", self.binary.display(), args);

        let output = tools::run_with_timeout(&self.binary, &args, INSPECT_TIMEOUT_SECS).await?;
        if !output.status.success() {
            return Err(Error::ToolFailed {
                tool: "yt-dlp",
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_track_info(&output.stdout)
    }

    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        options: &DownloadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let args = self.download_args(url, dest_dir, options);
        debug!("starting download: {} {:?}", self.binary.display(), args);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Execution(format!("failed to start yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Execution("failed to capture yt-dlp stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Execution("failed to capture yt-dlp stderr".to_string()))?;

        // Collect stderr on the side; it only matters if the engine fails
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push(line);
            }
            collected.join("\n")
        });

        let mut saved_path: Option<PathBuf> = None;
        let mut destination: Option<PathBuf> = None;
        let mut finished_seen = false;

        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse::parse_line(&line) {
                    Some(EngineLine::Progress(update)) => {
                        if matches!(update, ProgressUpdate::Finished { .. }) {
                            finished_seen = true;
                        }
                        sink.push(update);
                    }
                    Some(EngineLine::Saved(path)) => saved_path = Some(path),
                    Some(EngineLine::Destination(path)) => destination = Some(path),
                    None => debug!("yt-dlp: {}", line),
                },
                Ok(None) => break,
                // the reader consumes an undecodable line and stays usable
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    debug!("skipping undecodable yt-dlp output: {}", e);
                }
                Err(e) => {
                    debug!("stopped reading yt-dlp output: {}", e);
                    break;
                }
            }
        }
        // closing the pipe keeps a still-writing child from blocking on it
        drop(lines);

        let status = child
            .wait()
            .await
            .map_err(|e| Error::Execution(format!("failed to wait for yt-dlp: {}", e)))?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if !status.success() {
            warn!("yt-dlp exited with {:?}", status.code());
            return Err(Error::ToolFailed {
                tool: "yt-dlp",
                code: status.code().unwrap_or(-1),
                stderr: stderr_output,
            });
        }

        let path = saved_path.or(destination).ok_or_else(|| {
            Error::Parse("yt-dlp finished without reporting a file path".to_string())
        })?;

        // The skip-download path (file already on disk) emits no hook events
        if !finished_seen {
            sink.push(ProgressUpdate::Finished {
                filename: Some(path.display().to_string()),
            });
        }

        info!("downloaded {}", path.display());
        Ok(path)
    }
}

/// Pull the audio-relevant fields out of a `--dump-json` blob.
fn parse_track_info(stdout: &[u8]) -> Result<TrackInfo> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| Error::Parse(format!("metadata JSON: {}", e)))?;

    Ok(TrackInfo {
        id: json["id"].as_str().unwrap_or_default().to_string(),
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        uploader: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
        duration_seconds: json["duration"].as_f64().unwrap_or(0.0) as u64,
        thumbnail: json["thumbnail"].as_str().unwrap_or_default().to_string(),
    })
}
