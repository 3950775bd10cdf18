//! Renderer-facing output sink and abort signal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use entry_core::RenderError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Events emitted by a render towards the driver.
#[derive(Debug)]
pub enum RenderEvent {
    /// A chunk of HTML output.
    Chunk(Bytes),
    /// The shell is complete.
    ShellReady,
    /// All pending content has resolved.
    AllReady,
    /// A recoverable render error (e.g. a boundary fell back).
    Error(RenderError),
    /// The renderer returned successfully.
    Finished,
    /// The renderer returned an error.
    Failed(RenderError),
}

/// One-shot abort signal shared between the driver and the renderer.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
    requests: Arc<AtomicUsize>,
}

impl AbortSignal {
    /// Create a new, untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the abort. Returns `true` only for the call that fired it.
    pub fn abort(&self) -> bool {
        let previous = self.requests.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            self.token.cancel();
            true
        } else {
            false
        }
    }

    /// Whether the abort has fired.
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the abort fires.
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }

    /// How many times `abort` has been called.
    pub fn abort_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// State of the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SinkState {
    /// Shell still being rendered.
    Initial,
    /// Shell is complete, suspended content may still stream.
    ShellReady,
    /// Everything has resolved.
    AllReady,
}

/// Capacity of the event channel between a render and its driver.
pub const EVENT_CAPACITY: usize = 16;

/// Output handle given to a [`crate::Renderer`].
///
/// Writes made before the shell is ready are held by the driver and released
/// with the response. After that, writes wait while the client is not
/// keeping up. Readiness only moves forward: `all_ready` implies
/// `shell_ready`, and repeated calls are no-ops.
#[derive(Debug)]
pub struct RenderSink {
    events: mpsc::Sender<RenderEvent>,
    abort: AbortSignal,
    state: SinkState,
    bytes_written: usize,
}

impl RenderSink {
    /// Create a sink sending into the given channel.
    pub fn new(events: mpsc::Sender<RenderEvent>, abort: AbortSignal) -> Self {
        Self {
            events,
            abort,
            state: SinkState::Initial,
            bytes_written: 0,
        }
    }

    /// Write a chunk of output.
    pub async fn write(&mut self, bytes: impl Into<Bytes>) -> Result<(), RenderError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Ok(());
        }
        let len = bytes.len();
        self.send(RenderEvent::Chunk(bytes)).await?;
        self.bytes_written += len;
        Ok(())
    }

    /// Write a string chunk.
    pub async fn write_str(&mut self, html: &str) -> Result<(), RenderError> {
        self.write(Bytes::copy_from_slice(html.as_bytes())).await
    }

    /// Signal that the shell is complete.
    pub async fn shell_ready(&mut self) -> Result<(), RenderError> {
        if self.state >= SinkState::ShellReady {
            return Ok(());
        }
        self.send(RenderEvent::ShellReady).await?;
        self.state = SinkState::ShellReady;
        Ok(())
    }

    /// Signal that all content has resolved.
    pub async fn all_ready(&mut self) -> Result<(), RenderError> {
        if self.state == SinkState::AllReady {
            return Ok(());
        }
        self.shell_ready().await?;
        self.send(RenderEvent::AllReady).await?;
        self.state = SinkState::AllReady;
        Ok(())
    }

    /// Report a recoverable error. The render continues.
    pub async fn report_error(&self, error: RenderError) -> Result<(), RenderError> {
        self.send(RenderEvent::Error(error)).await
    }

    /// Whether the render has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Wait until the render is aborted.
    pub async fn aborted(&self) {
        self.abort.aborted().await
    }

    /// Clone of the abort signal.
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Whether `shell_ready` has been signalled.
    pub fn is_shell_ready(&self) -> bool {
        self.state >= SinkState::ShellReady
    }

    /// Total bytes written.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    async fn send(&self, event: RenderEvent) -> Result<(), RenderError> {
        self.events
            .send(event)
            .await
            .map_err(|_| RenderError::Stream("render output closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sink() -> (RenderSink, mpsc::Receiver<RenderEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        (RenderSink::new(tx, AbortSignal::new()), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<RenderEvent>) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_abort_fires_once() {
        let signal = AbortSignal::new();
        let shared = signal.clone();

        assert!(!signal.is_aborted());
        assert!(signal.abort());
        assert!(!shared.abort());
        assert!(shared.is_aborted());
        assert_eq!(signal.abort_requests(), 2);
    }

    #[tokio::test]
    async fn test_aborted_future_resolves() {
        let signal = AbortSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.aborted().await });

        signal.abort();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_write_counts_bytes_and_skips_empty() {
        let (mut sink, mut rx) = sink();
        sink.write_str("<html>").await.unwrap();
        sink.write(Bytes::new()).await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], RenderEvent::Chunk(b) if b == "<html>"));
        assert_eq!(sink.bytes_written(), 6);
    }

    #[tokio::test]
    async fn test_all_ready_implies_shell_ready() {
        let (mut sink, mut rx) = sink();
        sink.all_ready().await.unwrap();
        sink.all_ready().await.unwrap();
        sink.shell_ready().await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], RenderEvent::ShellReady));
        assert!(matches!(events[1], RenderEvent::AllReady));
        assert!(sink.is_shell_ready());
    }

    #[tokio::test]
    async fn test_report_error() {
        let (sink, mut rx) = sink();
        sink.report_error(RenderError::Stream("boundary".into()))
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert!(matches!(&events[0], RenderEvent::Error(RenderError::Stream(m)) if m == "boundary"));
    }

    #[tokio::test]
    async fn test_closed_output_is_an_error() {
        let (mut sink, rx) = sink();
        drop(rx);

        assert_eq!(
            sink.write_str("x").await,
            Err(RenderError::Stream("render output closed".to_string()))
        );
        assert!(sink.shell_ready().await.is_err());
        assert!(!sink.is_shell_ready());
    }

    #[tokio::test]
    async fn test_write_waits_when_channel_is_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut sink = RenderSink::new(tx, AbortSignal::new());
        sink.write_str("a").await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(10), sink.write_str("b")).await;
        assert!(blocked.is_err());

        assert!(matches!(rx.recv().await, Some(RenderEvent::Chunk(b)) if b == "a"));
        sink.write_str("c").await.unwrap();
        assert!(matches!(rx.recv().await, Some(RenderEvent::Chunk(b)) if b == "c"));
    }
}
