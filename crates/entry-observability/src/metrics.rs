//! Per-render timing and outcome metrics.

use std::time::{Duration, Instant};

use entry_core::RequestId;
use serde::{Deserialize, Serialize};

/// Metrics for a single document render.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderMetrics {
    /// Request ID for correlation.
    pub request_id: String,
    /// Render mode name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Status the response was sent with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Time until the response was handed out (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_ready_us: Option<u64>,
    /// Time until the abort fired (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_abort_us: Option<u64>,
    /// Total render duration (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration_us: Option<u64>,
    /// Bytes forwarded to the response body.
    pub bytes_streamed: u64,
    /// Chunks forwarded to the response body.
    pub chunks_streamed: u64,
    /// Recoverable errors reported before the response was ready.
    pub errors_before_ready: u32,
    /// Errors reported after the response was ready.
    pub errors_after_ready: u32,
    /// Whether the render was aborted.
    pub aborted: bool,
    /// Whether the response body was dropped early.
    pub client_gone: bool,
}

impl RenderMetrics {
    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Collects [`RenderMetrics`] while a render runs.
#[derive(Debug)]
pub struct MetricsCollector {
    start: Instant,
    metrics: RenderMetrics,
}

impl MetricsCollector {
    /// Create a collector starting now.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            start: Instant::now(),
            metrics: RenderMetrics {
                request_id: request_id.to_string(),
                ..Default::default()
            },
        }
    }

    /// Set the render mode.
    pub fn set_mode(&mut self, mode: impl Into<String>) {
        self.metrics.mode = Some(mode.into());
    }

    /// Record that the response was handed out.
    pub fn record_ready(&mut self, status: u16) {
        self.metrics.status_code = Some(status);
        self.metrics.time_to_ready_us = Some(micros(self.start.elapsed()));
    }

    /// Record a chunk forwarded to the body.
    pub fn record_chunk(&mut self, bytes: usize) {
        self.metrics.chunks_streamed += 1;
        self.metrics.bytes_streamed += bytes as u64;
    }

    /// Record a render error.
    pub fn record_error(&mut self, after_ready: bool) {
        if after_ready {
            self.metrics.errors_after_ready += 1;
        } else {
            self.metrics.errors_before_ready += 1;
        }
    }

    /// Record the abort.
    pub fn record_abort(&mut self) {
        self.metrics.aborted = true;
        self.metrics.time_to_abort_us = Some(micros(self.start.elapsed()));
    }

    /// Record that the client dropped the body.
    pub fn record_client_gone(&mut self) {
        self.metrics.client_gone = true;
    }

    /// Current snapshot.
    pub fn metrics(&self) -> &RenderMetrics {
        &self.metrics
    }

    /// Finish collection and return the metrics.
    pub fn finish(mut self) -> RenderMetrics {
        self.metrics.total_duration_us = Some(micros(self.start.elapsed()));
        self.metrics
    }
}

fn micros(d: Duration) -> u64 {
    d.as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_render_outcome() {
        let mut collector = MetricsCollector::new(RequestId::from_string("m-1"));
        collector.set_mode("shell-ready");
        collector.record_error(false);
        collector.record_ready(500);
        collector.record_chunk(120);
        collector.record_chunk(30);
        collector.record_error(true);

        let metrics = collector.finish();
        assert_eq!(metrics.request_id, "m-1");
        assert_eq!(metrics.mode.as_deref(), Some("shell-ready"));
        assert_eq!(metrics.status_code, Some(500));
        assert_eq!(metrics.bytes_streamed, 150);
        assert_eq!(metrics.chunks_streamed, 2);
        assert_eq!(metrics.errors_before_ready, 1);
        assert_eq!(metrics.errors_after_ready, 1);
        assert!(metrics.time_to_ready_us.is_some());
        assert!(metrics.total_duration_us.is_some());
        assert!(!metrics.aborted);
    }

    #[test]
    fn test_abort_and_client_gone() {
        let mut collector = MetricsCollector::new(RequestId::from_string("m-2"));
        collector.record_abort();
        collector.record_client_gone();

        let metrics = collector.metrics();
        assert!(metrics.aborted);
        assert!(metrics.client_gone);
        assert!(metrics.time_to_abort_us.is_some());
    }

    #[test]
    fn test_json_skips_unset_fields() {
        let metrics = MetricsCollector::new(RequestId::from_string("m-3")).finish();
        let json: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();

        assert_eq!(json["request_id"], "m-3");
        assert!(json.get("status_code").is_none());
        assert!(json.get("mode").is_none());
        assert_eq!(json["bytes_streamed"], 0);
    }
}
