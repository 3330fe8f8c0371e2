// YouTube watch-page helpers - detection, video id extraction, normalization

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Video ids are 11 characters of [A-Za-z0-9_-], ended by `& ? / #` or the
    // end of the URL. Hosts match case-insensitively behind a `.`/`/` boundary
    // so m.youtube.com and music.youtube.com work and lookalike hosts do not.
    static ref WATCH_RE: Regex = Regex::new(
        r"(?i)(?:^|[./])youtube\.com/watch\?v=([A-Za-z0-9_-]{11})(?:[&?/#]|$)"
    )
    .unwrap();
    static ref SHORTS_RE: Regex = Regex::new(
        r"(?i)(?:^|[./])youtube\.com/shorts/([A-Za-z0-9_-]{11})(?:[&?/#]|$)"
    )
    .unwrap();
    static ref SHORT_LINK_RE: Regex = Regex::new(
        r"(?i)(?:^|[./])youtu\.be/([A-Za-z0-9_-]{11})(?:[&?/#]|$)"
    )
    .unwrap();
}

/// True when the URL points at a single YouTube video.
///
/// Recognized shapes:
/// - `youtube.com/watch?v=VIDEO_ID`
/// - `youtube.com/shorts/VIDEO_ID`
/// - `youtu.be/VIDEO_ID`
/// including subdomain hosts like `m.youtube.com` and `music.youtube.com`.
pub fn is_watch_page(url: &str) -> bool {
    extract_video_id(url).is_some()
}

/// Pull the 11-character video id out of a watch, shorts, or youtu.be URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    let url = url.trim();
    for re in [&*WATCH_RE, &*SHORTS_RE, &*SHORT_LINK_RE] {
        if let Some(caps) = re.captures(url) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }
    }
    None
}

/// Canonical `https://www.youtube.com/watch?v=VIDEO_ID` form for anything
/// [`extract_video_id`] recognizes.
pub fn normalize_watch_url(url: &str) -> Option<String> {
    extract_video_id(url).map(|id| format!("https://www.youtube.com/watch?v={}", id))
}
