// Download configuration handed to the engine

/// Format preference: best audio-only stream, m4a container first, then any
/// audio, then any stream at all.
pub const DEFAULT_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio/best";

/// yt-dlp's default template is "%(title)s [%(id)s].%(ext)s"; this override
/// drops the [id].
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Options for a single download.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Stream selection string, engine syntax
    pub format: String,
    /// Output naming template, expanded by the engine
    pub output_template: String,
    /// Expand playlist URLs; off means a playlist URL yields only its
    /// primary item
    pub playlist: bool,
    /// SOCKS5/HTTP proxy URL, passed straight through
    pub proxy: Option<String>,
    /// Socket timeout in seconds for the engine's network reads
    pub socket_timeout: Option<u32>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            playlist: false,
            proxy: None,
            socket_timeout: None,
        }
    }
}

impl DownloadOptions {
    pub fn with_format(mut self, format: String) -> Self {
        self.format = format;
        self
    }

    pub fn with_output_template(mut self, template: String) -> Self {
        self.output_template = template;
        self
    }

    pub fn with_playlist(mut self, enabled: bool) -> Self {
        self.playlist = enabled;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: u32) -> Self {
        self.socket_timeout = Some(seconds);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_select_audio_without_playlists() {
        let options = DownloadOptions::default();
        assert_eq!(options.format, "bestaudio[ext=m4a]/bestaudio/best");
        assert_eq!(options.output_template, "%(title)s.%(ext)s");
        assert!(!options.playlist);
        assert!(options.proxy.is_none());
        assert!(options.socket_timeout.is_none());
    }

    #[test]
    fn test_builder_chains() {
        let options = DownloadOptions::default()
            .with_format("bestaudio".to_string())
            .with_playlist(true)
            .with_proxy(Some("socks5://127.0.0.1:1080".to_string()))
            .with_socket_timeout(30);

        assert_eq!(options.format, "bestaudio");
        assert!(options.playlist);
        assert_eq!(options.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(options.socket_timeout, Some(30));
    }
}
