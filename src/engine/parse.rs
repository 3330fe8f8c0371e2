// Line protocol between yt-dlp and this crate
//
// Downloads run with a pinned progress template and a pinned after-move
// print, so stdout carries machine-readable lines instead of the human
// progress bar:
//
//   @progress <status> <downloaded> <total> <estimate> <filename>
//   @saved <final path>
//
// Fields the progress hook has no value for render as NA.

use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;

use crate::progress::ProgressUpdate;

/// Passed to `--progress-template`; renders the fields the progress hook
/// carries. The filename goes last so it may contain spaces.
pub(crate) const PROGRESS_TEMPLATE: &str = "download:@progress %(progress.status)s \
     %(progress.downloaded_bytes)s %(progress.total_bytes)s \
     %(progress.total_bytes_estimate)s %(progress.filename)s";

/// Passed to `--print`; emits the final path once the file is in place.
pub(crate) const SAVED_TEMPLATE: &str = "after_move:@saved %(filepath)s";

lazy_static! {
    static ref PROGRESS_RE: Regex =
        Regex::new(r"^@progress\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s*(.*)$").unwrap();
    static ref SAVED_RE: Regex = Regex::new(r"^@saved\s+(.+)$").unwrap();
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
}

/// One recognized stdout line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EngineLine {
    Progress(ProgressUpdate),
    /// Final path printed after the file reached its destination
    Saved(PathBuf),
    /// Fallback path source when the after-move print is unavailable
    Destination(PathBuf),
}

/// Classify a stdout line; `None` for anything outside the protocol.
pub(crate) fn parse_line(line: &str) -> Option<EngineLine> {
    let line = line.trim_end();

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let status = caps.get(1)?.as_str();
        let downloaded = parse_bytes(caps.get(2)?.as_str());
        let total = parse_bytes(caps.get(3)?.as_str());
        let total_estimate = parse_bytes(caps.get(4)?.as_str());
        let filename = parse_name(caps.get(5).map(|m| m.as_str()).unwrap_or(""));

        let update = match status {
            "downloading" => ProgressUpdate::Downloading {
                downloaded,
                total,
                total_estimate,
                filename,
            },
            "finished" => ProgressUpdate::Finished { filename },
            "error" => ProgressUpdate::Errored,
            other => ProgressUpdate::Other(other.to_string()),
        };
        return Some(EngineLine::Progress(update));
    }

    if let Some(caps) = SAVED_RE.captures(line) {
        return Some(EngineLine::Saved(PathBuf::from(caps.get(1)?.as_str().trim())));
    }

    if let Some(caps) = DEST_RE.captures(line) {
        return Some(EngineLine::Destination(PathBuf::from(
            caps.get(1)?.as_str().trim(),
        )));
    }

    None
}

/// Numeric field; NA or anything unparsable means the hook had no value.
fn parse_bytes(field: &str) -> Option<u64> {
    if let Ok(n) = field.parse::<u64>() {
        return Some(n);
    }
    // estimates sometimes render as floats
    field
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f as u64)
}

fn parse_name(field: &str) -> Option<String> {
    let name = field.trim();
    if name.is_empty() || name == "NA" {
        None
    } else {
        Some(name.to_string())
    }
}
