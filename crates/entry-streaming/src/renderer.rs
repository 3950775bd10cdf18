//! The streaming renderer interface.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use entry_core::{EntryContext, LoadContext, RenderError, RequestId};

use crate::sink::RenderSink;

/// When the response is handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Respond as soon as the shell is ready and stream the rest.
    #[default]
    ShellReady,
    /// Hold the response until all content has resolved.
    AllReady,
}

impl RenderMode {
    /// Crawlers and SPA-mode renders wait for everything; others stream.
    pub fn select(is_crawler: bool, is_spa_mode: bool) -> Self {
        if is_crawler || is_spa_mode {
            Self::AllReady
        } else {
            Self::ShellReady
        }
    }

    /// Whether the response waits for all content.
    pub fn waits_for_all(&self) -> bool {
        matches!(self, Self::AllReady)
    }

    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShellReady => "shell-ready",
            Self::AllReady => "all-ready",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a renderer gets to know about the request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Request identifier.
    pub request_id: RequestId,
    /// Request URL.
    pub url: String,
    /// Selected render mode.
    pub mode: RenderMode,
    /// Entry (router) context.
    pub entry: EntryContext,
    /// Application load context.
    pub load: LoadContext,
}

/// A streaming document renderer.
///
/// The renderer writes HTML into the sink and signals readiness. Returning
/// `Err` before `shell_ready` is a shell failure and rejects the request;
/// afterwards it is treated as an in-stream error. Renderers should watch
/// [`RenderSink::aborted`] and finish promptly, flushing fallbacks for
/// anything still pending.
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    /// Render the document for `request` into `sink`.
    async fn render(&self, request: RenderRequest, sink: &mut RenderSink)
        -> Result<(), RenderError>;
}

#[async_trait]
impl<R> Renderer for Arc<R>
where
    R: Renderer + ?Sized,
{
    async fn render(
        &self,
        request: RenderRequest,
        sink: &mut RenderSink,
    ) -> Result<(), RenderError> {
        (**self).render(request, sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{AbortSignal, RenderEvent, EVENT_CAPACITY};
    use tokio::sync::mpsc;

    #[test]
    fn test_mode_selection() {
        assert_eq!(RenderMode::select(false, false), RenderMode::ShellReady);
        assert_eq!(RenderMode::select(true, false), RenderMode::AllReady);
        assert_eq!(RenderMode::select(false, true), RenderMode::AllReady);
        assert_eq!(RenderMode::select(true, true), RenderMode::AllReady);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(RenderMode::ShellReady.to_string(), "shell-ready");
        assert_eq!(RenderMode::AllReady.to_string(), "all-ready");
        assert!(RenderMode::AllReady.waits_for_all());
        assert!(!RenderMode::default().waits_for_all());
    }

    struct Hello;

    #[async_trait]
    impl Renderer for Hello {
        async fn render(
            &self,
            request: RenderRequest,
            sink: &mut RenderSink,
        ) -> Result<(), RenderError> {
            sink.write_str(&format!("<body>{}</body>", request.url))
                .await?;
            sink.all_ready().await
        }
    }

    #[tokio::test]
    async fn test_arc_renderer_delegates() {
        let renderer: Arc<dyn Renderer> = Arc::new(Hello);
        let (tx, mut rx) = mpsc::channel(EVENT_CAPACITY);
        let mut sink = RenderSink::new(tx, AbortSignal::new());

        let request = RenderRequest {
            request_id: RequestId::from_string("r"),
            url: "/x".to_string(),
            mode: RenderMode::ShellReady,
            entry: EntryContext::default(),
            load: LoadContext::default(),
        };
        renderer.render(request, &mut sink).await.unwrap();

        assert!(matches!(rx.recv().await, Some(RenderEvent::Chunk(b)) if b == "<body>/x</body>"));
        assert!(matches!(rx.recv().await, Some(RenderEvent::ShellReady)));
        assert!(matches!(rx.recv().await, Some(RenderEvent::AllReady)));
    }
}
