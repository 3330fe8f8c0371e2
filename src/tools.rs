// Tool discovery - locate yt-dlp and ffmpeg, probe their versions

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::error::{Error, Result};

/// Seconds a version probe may take before the child is killed.
const VERSION_PROBE_SECS: u64 = 10;

/// External binaries this crate drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolKind {
    YtDlp,
    Ffmpeg,
}

impl ToolKind {
    pub fn binary_name(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "yt-dlp",
            ToolKind::Ffmpeg => "ffmpeg",
        }
    }

    /// Environment variable overriding discovery, e.g.
    /// `export YTDLP_PATH="$HOME/.venv/bin/yt-dlp"`.
    pub fn env_override(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "YTDLP_PATH",
            ToolKind::Ffmpeg => "FFMPEG_PATH",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "--version",
            ToolKind::Ffmpeg => "-version",
        }
    }
}

/// Discovery and probe result for one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStatus {
    pub kind: ToolKind,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    pub is_available: bool,
}

/// Find a tool: env override first, then common install paths, then `PATH`.
pub fn locate(kind: ToolKind) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(kind.env_override()) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        debug!("{} points at a missing file, ignoring", kind.env_override());
    }

    // Common paths where Homebrew and system packages put binaries
    let common_dirs = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];
    for dir in common_dirs {
        let candidate = Path::new(dir).join(kind.binary_name());
        if candidate.exists() {
            return Some(candidate);
        }
    }

    which::which(kind.binary_name()).ok()
}

/// Like [`locate`], but an error when the tool is missing.
pub fn require(kind: ToolKind) -> Result<PathBuf> {
    locate(kind).ok_or_else(|| Error::ToolNotFound(kind.binary_name().to_string()))
}

/// Locate a tool and probe its version.
pub async fn inspect(kind: ToolKind) -> ToolStatus {
    let path = locate(kind);
    let version = match &path {
        Some(p) => probe_version(kind, p).await,
        None => None,
    };
    ToolStatus {
        kind,
        is_available: path.is_some(),
        path,
        version,
    }
}

async fn probe_version(kind: ToolKind, path: &Path) -> Option<String> {
    let args = vec![kind.version_arg().to_string()];
    let output = run_with_timeout(path, &args, VERSION_PROBE_SECS).await.ok()?;
    if !output.status.success() {
        return None;
    }
    // ffmpeg prints a multi-line banner; the version sits on the first line
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}

/// Run a command, capture its output, kill it if it outlives `timeout_secs`.
pub async fn run_with_timeout(
    program: &Path,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output> {
    let program_name = program.display().to_string();
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Execution(format!("failed to start {}: {}", program_name, e)))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| Error::Execution(format!("failed to capture stdout from {}", program_name)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| Error::Execution(format!("failed to capture stderr from {}", program_name)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => {
            let status = status
                .map_err(|e| Error::Execution(format!("failed to wait for {}: {}", program_name, e)))?;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(Error::Execution(format!(
                "{} timed out after {}s",
                program_name, timeout_secs
            )))
        }
    }
}
