// Error types shared across the crate

use thiserror::Error;

/// Errors raised while locating tools, driving them, or exporting files.
#[derive(Debug, Error)]
pub enum Error {
    /// yt-dlp or ffmpeg could not be located
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// A child process could not be spawned or its pipes captured
    #[error("execution error: {0}")]
    Execution(String),

    /// An external tool exited with a failure; stderr is passed through untouched
    #[error("{tool} exited with code {code}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        code: i32,
        stderr: String,
    },

    /// Tool output that should have been well formed was not
    #[error("parse error: {0}")]
    Parse(String),

    /// The URL is empty or not a recognizable watch page
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The session already has a download in flight
    #[error("a download is already in progress on this session")]
    SessionBusy,

    /// Filesystem failure while staging or exporting files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
