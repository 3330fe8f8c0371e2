//! Grab the audio track of a YouTube video as an MP3 in your music library.
//!
//! The heavy lifting is delegated to two external tools: yt-dlp fetches the
//! best available audio stream, ffmpeg converts it to MP3. This crate finds
//! the binaries, drives them, reports download progress through a pollable
//! record and files the result into the user's music directory.
//!
//! # Quick start
//!
//! ```no_run
//! use tunegrab::Mp3Pipeline;
//!
//! # async fn demo() -> tunegrab::Result<()> {
//! let pipeline = Mp3Pipeline::with_defaults()?;
//! let saved = pipeline.run("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
//! println!("saved {} to {}", saved.title, saved.path.display());
//! # Ok(())
//! # }
//! ```
//!
//! The pieces compose individually as well: [`DownloadSession`] downloads
//! without converting, [`FfmpegTranscoder`] converts existing files, and
//! both tools sit behind traits ([`AudioEngine`], [`Transcoder`]) so tests
//! and alternative backends can stand in for the real binaries.

pub mod engine;
pub mod error;
pub mod library;
pub mod options;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod tools;
pub mod transcode;
pub mod url;

pub use engine::{AudioEngine, TrackInfo, YtDlpEngine};
pub use error::{Error, Result};
pub use library::{MusicLibrary, SavedTrack};
pub use options::{DownloadOptions, DEFAULT_FORMAT, DEFAULT_OUTPUT_TEMPLATE};
pub use pipeline::{Mp3Pipeline, PipelineStage};
pub use progress::{DownloadStatus, Progress, ProgressSink, ProgressTracker, ProgressUpdate};
pub use session::DownloadSession;
pub use tools::{ToolKind, ToolStatus};
pub use transcode::{mp3_path_for, FfmpegTranscoder, Transcoder};
pub use url::{extract_video_id, is_watch_page, normalize_watch_url};
