//! Render lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lifecycle phases for a document render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Request received, renderer started.
    Start,
    /// The renderer reported the shell as ready.
    ShellReady,
    /// The renderer reported all content as ready.
    AllReady,
    /// A response was produced with the given status.
    Responded(u16),
    /// No response was produced; the caller gets the error.
    Rejected(String),
    /// A render error inside the stream.
    StreamError {
        /// Whether the response had already been handed out.
        after_shell: bool,
        /// Error message.
        message: String,
    },
    /// The render was aborted by the timeout.
    Aborted,
    /// The response body was dropped before the render finished.
    ClientGone,
    /// The render finished and the body was closed.
    Completion,
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Time from start to a named mark.
    pub fn mark_offset(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).map(|t| t.duration_since(self.start))
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time until the response was handed out.
    pub fn time_to_ready(&self) -> Option<Duration> {
        self.mark_offset("ready")
    }

    /// Time until the abort fired.
    pub fn time_to_abort(&self) -> Option<Duration> {
        self.mark_offset("abort")
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer trait for lifecycle events.
pub trait LifecycleObserver: Send + Sync {
    /// Called when a lifecycle phase occurs.
    fn on_phase(&self, phase: LifecyclePhase, elapsed: Duration);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LifecycleObserver for NoopObserver {
    fn on_phase(&self, _phase: LifecyclePhase, _elapsed: Duration) {}
}
