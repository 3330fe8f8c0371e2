// Audio transcoding - ffmpeg wrapper that converts downloaded streams to MP3

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::tools::{self, ToolKind};

/// Converts one audio file into another format.
#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Convert `input` into `output`, overwriting an existing output file.
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// MP3 transcoder backed by the ffmpeg binary.
///
/// Produces 44.1 kHz stereo at 192 kbps, with source metadata carried over.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Locate ffmpeg via `FFMPEG_PATH`, common install paths, then `PATH`.
    pub fn discover() -> Result<Self> {
        tools::require(ToolKind::Ffmpeg).map(Self::new)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn transcode_args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-map_metadata".to_string(),
            "0".to_string(),
            "-vn".to_string(),
            "-ar".to_string(),
            "44100".to_string(),
            "-ac".to_string(),
            "2".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            output.display().to_string(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        self.binary.exists() || which::which(&self.binary).is_ok()
    }

    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let args = self.transcode_args(input, output);
        debug!("transcoding: {} {:?}", self.binary.display(), args);

        let result = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::Execution(format!("failed to start ffmpeg: {}", e)))?;

        if !result.status.success() {
            return Err(Error::ToolFailed {
                tool: "ffmpeg",
                code: result.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        info!("transcoded {} -> {}", input.display(), output.display());
        Ok(())
    }
}

/// MP3 sibling of `input`, placed in `dir`.
pub fn mp3_path_for(input: &Path, dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    dir.join(format!("{}.mp3", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mp3_path_for() {
        assert_eq!(
            mp3_path_for(Path::new("/tmp/dl/My Song.m4a"), Path::new("/tmp/dl")),
            PathBuf::from("/tmp/dl/My Song.mp3")
        );
        assert_eq!(
            mp3_path_for(Path::new("/tmp/dl/track.webm"), Path::new("/out")),
            PathBuf::from("/out/track.mp3")
        );
        assert_eq!(
            mp3_path_for(Path::new("noext"), Path::new("/out")),
            PathBuf::from("/out/noext.mp3")
        );
    }

    #[test]
    fn test_transcode_args_pin_the_audio_profile() {
        let transcoder = FfmpegTranscoder::new(PathBuf::from("ffmpeg"));
        let args = transcoder.transcode_args(Path::new("/in/a.m4a"), Path::new("/out/a.mp3"));

        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "/in/a.m4a",
                "-map_metadata",
                "0",
                "-vn",
                "-ar",
                "44100",
                "-ac",
                "2",
                "-b:a",
                "192k",
                "/out/a.mp3",
            ]
        );
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        fn fake_ffmpeg(dir: &Path, body: &str) -> FfmpegTranscoder {
            let path = dir.join("fake-ffmpeg");
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "#!/bin/sh").unwrap();
            writeln!(file, "{}", body).unwrap();
            drop(file);
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            FfmpegTranscoder::new(path)
        }

        #[tokio::test]
        async fn test_scripted_transcode_writes_the_output_file() {
            let dir = tempfile::tempdir().unwrap();
            // the output path is the last argument
            let transcoder = fake_ffmpeg(
                dir.path(),
                "for a; do last=$a; done\necho data > \"$last\"",
            );

            let input = dir.path().join("in.m4a");
            std::fs::write(&input, b"stream").unwrap();
            let output = dir.path().join("out.mp3");

            transcoder.transcode(&input, &output).await.unwrap();
            assert!(output.exists());
        }

        #[tokio::test]
        async fn test_scripted_failure_surfaces_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let transcoder = fake_ffmpeg(
                dir.path(),
                "echo 'Invalid data found when processing input' >&2\nexit 2",
            );

            let err = transcoder
                .transcode(Path::new("/in/a.m4a"), Path::new("/out/a.mp3"))
                .await
                .unwrap_err();

            match err {
                Error::ToolFailed { tool, code, stderr } => {
                    assert_eq!(tool, "ffmpeg");
                    assert_eq!(code, 2);
                    assert!(stderr.contains("Invalid data"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }
}
