// MP3 pipeline - download, convert, file into the library

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::library::{remove_quietly, MusicLibrary, SavedTrack};
use crate::progress::Progress;
use crate::session::{DownloadSession, FlightGuard};
use crate::transcode::{mp3_path_for, FfmpegTranscoder, Transcoder};
use crate::url;

/// Where a pipeline run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineStage {
    #[default]
    Idle,
    Downloading,
    Converting,
    Exporting,
    Done,
    Failed(String),
}

/// End-to-end flow: fetch the audio stream of a YouTube video, convert it
/// to MP3 and file it into the music library.
///
/// Intermediate files live in a staging directory and are cleaned up on
/// both success and failure. One run at a time; a second call fails fast
/// with [`Error::SessionBusy`].
pub struct Mp3Pipeline {
    session: DownloadSession,
    transcoder: Arc<dyn Transcoder>,
    library: MusicLibrary,
    staging_dir: PathBuf,
    stage: Mutex<PipelineStage>,
    in_flight: AtomicBool,
}

impl Mp3Pipeline {
    pub fn new(
        session: DownloadSession,
        transcoder: Arc<dyn Transcoder>,
        library: MusicLibrary,
        staging_dir: PathBuf,
    ) -> Self {
        Self {
            session,
            transcoder,
            library,
            staging_dir,
            stage: Mutex::new(PipelineStage::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Discovered yt-dlp and ffmpeg, cache-dir staging, default library.
    pub fn with_defaults() -> Result<Self> {
        let session = DownloadSession::with_defaults()?;
        let transcoder = FfmpegTranscoder::discover()?;
        let staging_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tunegrab");
        Ok(Self::new(
            session,
            Arc::new(transcoder),
            MusicLibrary::default(),
            staging_dir,
        ))
    }

    pub fn stage(&self) -> PipelineStage {
        self.lock_stage().clone()
    }

    /// Download progress of the current or most recent run.
    pub fn progress(&self) -> Progress {
        self.session.progress()
    }

    /// Run the whole pipeline for one video URL.
    ///
    /// Accepts watch, shorts and youtu.be links; anything else is rejected
    /// before any tool runs.
    pub async fn run(&self, url: &str) -> Result<SavedTrack> {
        let _guard = FlightGuard::acquire(&self.in_flight)?;

        let result = self.run_inner(url).await;
        match &result {
            Ok(saved) => {
                self.set_stage(PipelineStage::Done);
                info!("pipeline finished: {}", saved.path.display());
            }
            Err(e) => {
                self.set_stage(PipelineStage::Failed(e.to_string()));
                warn!("pipeline failed: {}", e);
            }
        }
        result
    }

    async fn run_inner(&self, url: &str) -> Result<SavedTrack> {
        let watch_url = url::normalize_watch_url(url)
            .ok_or_else(|| Error::InvalidUrl(url.trim().to_string()))?;

        std::fs::create_dir_all(&self.staging_dir)?;

        self.set_stage(PipelineStage::Downloading);
        let audio_path = self
            .session
            .download_audio(&watch_url, &self.staging_dir)
            .await?;

        self.set_stage(PipelineStage::Converting);
        let mp3_path = mp3_path_for(&audio_path, &self.staging_dir);
        let converted = self.transcoder.transcode(&audio_path, &mp3_path).await;
        // the downloaded stream is temporary regardless of outcome
        remove_quietly(&audio_path);
        if converted.is_err() {
            // ffmpeg -y creates the output file before it fails
            remove_quietly(&mp3_path);
        }
        converted?;

        self.set_stage(PipelineStage::Exporting);
        let saved = self.library.save(&mp3_path);
        if saved.is_err() {
            remove_quietly(&mp3_path);
        }
        saved
    }

    fn set_stage(&self, stage: PipelineStage) {
        *self.lock_stage() = stage;
    }

    fn lock_stage(&self) -> MutexGuard<'_, PipelineStage> {
        self.stage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AudioEngine, TrackInfo};
    use crate::options::DownloadOptions;
    use crate::progress::{DownloadStatus, ProgressSink, ProgressUpdate};
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    /// Engine double that writes a real file into the staging directory.
    struct StubEngine {
        file_name: String,
        hold: Option<Duration>,
    }

    impl StubEngine {
        fn ok(file_name: &str) -> Self {
            Self {
                file_name: file_name.to_string(),
                hold: None,
            }
        }

        fn slow(file_name: &str, hold: Duration) -> Self {
            Self {
                file_name: file_name.to_string(),
                hold: Some(hold),
            }
        }
    }

    #[async_trait]
    impl AudioEngine for StubEngine {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn inspect(&self, _url: &str, _options: &DownloadOptions) -> Result<TrackInfo> {
            Ok(TrackInfo::default())
        }

        async fn download(
            &self,
            _url: &str,
            dest_dir: &Path,
            _options: &DownloadOptions,
            sink: &dyn ProgressSink,
        ) -> Result<PathBuf> {
            if let Some(hold) = self.hold {
                tokio::time::sleep(hold).await;
            }
            let path = dest_dir.join(&self.file_name);
            std::fs::write(&path, "stream bytes")?;
            sink.push(ProgressUpdate::Downloading {
                downloaded: Some(2048),
                total: Some(2048),
                total_estimate: None,
                filename: Some(path.display().to_string()),
            });
            sink.push(ProgressUpdate::Finished {
                filename: Some(path.display().to_string()),
            });
            Ok(path)
        }
    }

    struct CopyTranscoder;

    #[async_trait]
    impl Transcoder for CopyTranscoder {
        fn name(&self) -> &'static str {
            "copy"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
            std::fs::copy(input, output)?;
            Ok(())
        }
    }

    /// Leaves a partial output behind, the way ffmpeg -y truncates its
    /// output file before decoding fails.
    struct FailingTranscoder;

    #[async_trait]
    impl Transcoder for FailingTranscoder {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn transcode(&self, _input: &Path, output: &Path) -> Result<()> {
            std::fs::write(output, "half a frame")?;
            Err(Error::ToolFailed {
                tool: "ffmpeg",
                code: 1,
                stderr: "conversion blew up".to_string(),
            })
        }
    }

    fn pipeline_with(
        engine: StubEngine,
        transcoder: Arc<dyn Transcoder>,
        dir: &Path,
    ) -> Mp3Pipeline {
        let session = DownloadSession::new(Arc::new(engine), DownloadOptions::default());
        Mp3Pipeline::new(
            session,
            transcoder,
            MusicLibrary::new(dir.join("library")),
            dir.join("staging"),
        )
    }

    fn staging_entries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir.join("staging"))
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect()
    }

    #[tokio::test]
    async fn test_run_downloads_converts_and_files_the_track() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(StubEngine::ok("Track.m4a"), Arc::new(CopyTranscoder), dir.path());

        let saved = pipeline.run("https://youtu.be/dQw4w9WgXcQ").await.unwrap();

        assert_eq!(saved.title, "Track");
        assert_eq!(saved.path, dir.path().join("library").join("Track.mp3"));
        assert!(saved.path.exists());
        assert_eq!(pipeline.stage(), PipelineStage::Done);
        assert_eq!(pipeline.progress().status, DownloadStatus::Finished);
        assert!(staging_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_stage_starts_idle() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(StubEngine::ok("x.m4a"), Arc::new(CopyTranscoder), dir.path());
        assert_eq!(pipeline.stage(), PipelineStage::Idle);
    }

    #[tokio::test]
    async fn test_conversion_failure_still_cleans_staging() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(
            StubEngine::ok("Track.m4a"),
            Arc::new(FailingTranscoder),
            dir.path(),
        );

        let err = pipeline
            .run("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ToolFailed { tool: "ffmpeg", .. }));
        match pipeline.stage() {
            PipelineStage::Failed(msg) => assert!(msg.contains("ffmpeg")),
            other => panic!("unexpected stage: {:?}", other),
        }
        assert!(staging_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_non_watch_urls_are_rejected_before_any_tool_runs() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(StubEngine::ok("x.m4a"), Arc::new(CopyTranscoder), dir.path());

        let err = pipeline.run("https://example.com/video").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert!(matches!(pipeline.stage(), PipelineStage::Failed(_)));
    }

    #[tokio::test]
    async fn test_second_run_is_busy_and_leaves_the_first_alone() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Arc::new(pipeline_with(
            StubEngine::slow("Track.m4a", Duration::from_millis(200)),
            Arc::new(CopyTranscoder),
            dir.path(),
        ));

        let bg = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.run("https://youtu.be/dQw4w9WgXcQ").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = pipeline
            .run("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionBusy));
        // the rejected call never touched the running attempt's stage
        assert_eq!(pipeline.stage(), PipelineStage::Downloading);

        bg.await.unwrap().unwrap();
        assert_eq!(pipeline.stage(), PipelineStage::Done);
    }
}
