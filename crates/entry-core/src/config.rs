//! Entry point configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default stream timeout handed to the framework (milliseconds).
pub const DEFAULT_STREAM_TIMEOUT_MS: u64 = 5_000;

/// Comment injected after the opening body tag.
pub const DEFAULT_COMMENT: &str = "<!-- Injected Comment -->";

/// Configuration for the render entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Time after which deferred data is rejected by the framework.
    #[serde(default = "default_stream_timeout_ms")]
    pub stream_timeout_ms: u64,

    /// Extra time after the stream timeout before the render is aborted,
    /// so rejected boundaries can still flush.
    #[serde(default = "default_abort_grace_ms")]
    pub abort_grace_ms: u64,

    /// How long an aborted render may keep flushing before it is cancelled.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Bytes the injector buffers while looking for `<body>`.
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,

    /// Comment inserted after the opening body tag.
    #[serde(default = "default_comment")]
    pub comment: String,

    /// Content type set on every rendered response.
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// User-agent fragments treated as crawlers in addition to the defaults.
    #[serde(default)]
    pub extra_crawler_patterns: Vec<String>,
}

fn default_stream_timeout_ms() -> u64 {
    DEFAULT_STREAM_TIMEOUT_MS
}

fn default_abort_grace_ms() -> u64 {
    1_000
}

fn default_drain_timeout_ms() -> u64 {
    1_000
}

fn default_max_buffer_bytes() -> usize {
    8192
}

fn default_comment() -> String {
    DEFAULT_COMMENT.to_string()
}

fn default_content_type() -> String {
    "text/html".to_string()
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            stream_timeout_ms: default_stream_timeout_ms(),
            abort_grace_ms: default_abort_grace_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            max_buffer_bytes: default_max_buffer_bytes(),
            comment: default_comment(),
            content_type: default_content_type(),
            extra_crawler_patterns: Vec::new(),
        }
    }
}

impl EntryConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stream timeout.
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the grace period between the stream timeout and the abort.
    pub fn with_abort_grace(mut self, grace: Duration) -> Self {
        self.abort_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Set how long an aborted render may keep flushing.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the injector buffer threshold.
    pub fn with_max_buffer(mut self, bytes: usize) -> Self {
        self.max_buffer_bytes = bytes;
        self
    }

    /// Set the injected comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Add a crawler user-agent pattern.
    pub fn with_crawler_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.extra_crawler_patterns.push(pattern.into());
        self
    }

    /// Stream timeout as a duration.
    pub fn stream_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }

    /// Delay after which the render is aborted.
    pub fn abort_delay(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms.saturating_add(self.abort_grace_ms))
    }

    /// Drain timeout as a duration.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
