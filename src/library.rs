// Music library - final resting place for converted tracks

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Folder created inside the user's music directory.
pub const LIBRARY_SUBDIR: &str = "Tunegrab";

/// Upper bound on " (n)" suffixes tried when a name is taken.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A track that has been filed into the library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTrack {
    pub title: String,
    pub path: PathBuf,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

/// Directory that holds the user's saved tracks.
#[derive(Debug, Clone)]
pub struct MusicLibrary {
    root: PathBuf,
}

impl MusicLibrary {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Platform music directory plus [`LIBRARY_SUBDIR`], e.g. `~/Music/Tunegrab`.
    pub fn default_dir() -> PathBuf {
        dirs::audio_dir()
            .unwrap_or_else(|| PathBuf::from("./Music"))
            .join(LIBRARY_SUBDIR)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File `source` into the library under its own name, renaming to
    /// "name (n).ext" when the name is taken. The source file is consumed.
    pub fn save(&self, source: &Path) -> Result<SavedTrack> {
        std::fs::create_dir_all(&self.root)?;

        let name = source.file_name().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a file: {}", source.display()),
            ))
        })?;

        let target = self.unique_target(name)?;
        let staging = staging_path(&target);

        // Land at a staging name first so a half-copied file never sits
        // at the final name
        if let Err(e) = std::fs::rename(source, &staging) {
            debug!("rename into library failed ({}), copying instead", e);
            if let Err(e) = std::fs::copy(source, &staging) {
                remove_quietly(&staging);
                return Err(e.into());
            }
        }
        if let Err(e) = std::fs::rename(&staging, &target) {
            remove_quietly(&staging);
            return Err(e.into());
        }
        if source.exists() {
            remove_quietly(source);
        }

        let title = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!("saved {:?} to {}", title, target.display());
        Ok(SavedTrack {
            title,
            path: target,
            saved_at: OffsetDateTime::now_utc(),
        })
    }

    fn unique_target(&self, name: &OsStr) -> Result<PathBuf> {
        let candidate = self.root.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }

        let name = Path::new(name);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = name.extension().map(|s| s.to_string_lossy().into_owned());

        for n in 1..MAX_NAME_ATTEMPTS {
            let renamed = match &ext {
                Some(ext) => format!("{} ({}).{}", stem, n, ext),
                None => format!("{} ({})", stem, n),
            };
            let candidate = self.root.join(renamed);
            if !candidate.exists() {
                return Ok(candidate);
            }
        }

        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!(
                "no free name for {} after {} attempts",
                name.display(),
                MAX_NAME_ATTEMPTS
            ),
        )))
    }
}

impl Default for MusicLibrary {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}

/// Best-effort delete for files nobody needs anymore.
pub(crate) fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("could not remove {}: {}", path.display(), e);
        }
    }
}
