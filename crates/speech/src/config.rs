use std::path::PathBuf;
use std::time::Duration;

/// Configuration for [`HttpSpeechSynthesizer`](crate::HttpSpeechSynthesizer).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpeechConfig {
    pub(crate) base_url: String,
    pub(crate) output_dir: PathBuf,
    pub(crate) timeout: Duration,
}

impl SpeechConfig {
    /// The address a locally running engine listens on by default.
    pub const DEFAULT_BASE_URL: &'static str = "http://127.0.0.1:50021";

    /// Creates a configuration writing audio files to `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            output_dir: output_dir.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the engine's base URL.
    #[inline]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Sets the timeout of each engine request.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns where audio files are written.
    #[inline]
    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }
}
