use std::time::Duration;

/// Base URL of the remote caption pipeline.
pub const API_BASE_URL: &str = "https://api.almostcrackd.ai";

/// Content types the upload stage accepts.
pub const SUPPORTED_CONTENT_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/heic",
];

/// Wait before each poll attempt.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Maximum number of poll attempts before a soft timeout.
pub const MAX_POLL_ATTEMPTS: u32 = 20;

/// Per-request timeout for pipeline calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout for reachability probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the console's flavor step-count check.
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns true if `content_type` is in [`SUPPORTED_CONTENT_TYPES`].
pub fn is_supported_content_type(content_type: &str) -> bool {
    SUPPORTED_CONTENT_TYPES.contains(&content_type)
}

/// Settings for a [`PipelineClient`](crate::PipelineClient).
///
/// [`PipelineConfig::default()`] yields the fixed production constants. The
/// builder exists for pointing the client at a staging host or for tests.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pipeline API base URL, without trailing slash.
    pub api_base_url: String,

    /// Wait before each poll attempt.
    pub poll_interval: Duration,

    /// Poll attempt budget.
    pub max_poll_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base_url: API_BASE_URL.to_string(),
            poll_interval: POLL_INTERVAL,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
        }
    }
}

impl PipelineConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Full URL for a pipeline endpoint path such as `/pipeline/generate-captions`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Override the pipeline base URL. Trailing slashes are dropped.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.max_poll_attempts = attempts;
        self
    }

    /// Build the final [`PipelineConfig`].
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
