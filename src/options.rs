//! Configuration for the streaming consumer.

use std::collections::HashMap;
use std::time::Duration;

/// A secret string type for sensitive data like bearer tokens.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Policy for frames whose payload carries an in-band `error` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorFramePolicy {
    /// Fail the stream with the server's message. Continuing to display
    /// text after a reported server error risks presenting an incomplete
    /// answer as complete, so this is the default.
    #[default]
    Stop,

    /// Log the message and keep streaming.
    Report,
}

/// What happens to already-streamed text when a stream fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureDisplay {
    /// Replace the accumulated text with a generic failure notice.
    #[default]
    Replace,

    /// Keep the partial text and append the failure notice after it.
    Annotate,
}

/// Consumer configuration.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use hackitech_assistant::options::{ErrorFramePolicy, StreamOptions};
///
/// let options = StreamOptions::new("https://api.hackitech.dev".to_string())
///     .with_timeout(Duration::from_secs(60))
///     .with_error_frames(ErrorFramePolicy::Report);
/// ```
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Base URL of the HackiTech API.
    pub base_url: String,

    /// Whole-request timeout applied to the HTTP client.
    pub timeout: Option<Duration>,

    /// Maximum time to wait between chunks before treating the stream as
    /// stalled. Disabled by default.
    pub idle_timeout: Option<Duration>,

    /// HTTP proxy URL.
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests.
    pub extra_headers: Option<HashMap<String, String>>,

    /// Prompts of this many characters or fewer never start a stream.
    pub min_prompt_len: usize,

    /// Handling of in-band `error` frames.
    pub error_frames: ErrorFramePolicy,

    /// Handling of already-streamed text on fatal errors.
    pub failure_display: FailureDisplay,
}

/// Prompts must be strictly longer than this many characters.
pub const DEFAULT_MIN_PROMPT_LEN: usize = 3;

const DEFAULT_API_BASE: &str = "https://api.hackitech.dev";

impl Default for StreamOptions {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE.to_string())
    }
}

impl StreamOptions {
    /// Create options targeting the given API base URL.
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            timeout: None,
            idle_timeout: None,
            proxy: None,
            extra_headers: None,
            min_prompt_len: DEFAULT_MIN_PROMPT_LEN,
            error_frames: ErrorFramePolicy::default(),
            failure_display: FailureDisplay::default(),
        }
    }

    /// Set the whole-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the per-chunk stall timeout.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Set the minimum prompt length gate.
    pub fn with_min_prompt_len(mut self, min_prompt_len: usize) -> Self {
        self.min_prompt_len = min_prompt_len;
        self
    }

    /// Set the in-band error frame policy.
    pub fn with_error_frames(mut self, policy: ErrorFramePolicy) -> Self {
        self.error_frames = policy;
        self
    }

    /// Set the on-failure display policy.
    pub fn with_failure_display(mut self, display: FailureDisplay) -> Self {
        self.failure_display = display;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_string_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(secret.expose_secret(), "hunter2");
    }

    #[test]
    fn defaults() {
        let options = StreamOptions::default();
        assert_eq!(options.min_prompt_len, DEFAULT_MIN_PROMPT_LEN);
        assert_eq!(options.error_frames, ErrorFramePolicy::Stop);
        assert_eq!(options.failure_display, FailureDisplay::Replace);
        assert!(options.idle_timeout.is_none());
    }

    #[test]
    fn builder_headers() {
        let options = StreamOptions::default()
            .with_header("X-Client".to_string(), "hackitech-web".to_string());
        assert_eq!(
            options.extra_headers.unwrap().get("X-Client").map(String::as_str),
            Some("hackitech-web")
        );
    }
}
