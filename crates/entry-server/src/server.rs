//! Render dispatch for document requests.

use std::sync::Arc;
use std::time::Duration;

use entry_core::{
    CrawlerDetector, EntryConfig, EntryContext, LifecycleObserver, LifecyclePhase, LoadContext,
    NoopObserver, RenderError, RequestContext, REQUEST_ID_HEADER,
};
use entry_observability::{LogFormat, StructuredLogger};
use entry_streaming::{
    AbortSignal, BodyCommentInjector, RenderEvent, RenderMode, RenderRequest, RenderSink, Renderer,
    EVENT_CAPACITY,
};
use http::header::{HeaderName, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use tokio::sync::{mpsc, oneshot};

use crate::body::ResponseBody;
use crate::driver::{Deadlines, RenderDriver};

/// Streaming SSR entry point.
///
/// Each call to [`EntryServer::handle_request`] spawns the renderer and a
/// driver task on the current tokio runtime.
pub struct EntryServer<R> {
    renderer: Arc<R>,
    config: EntryConfig,
    detector: CrawlerDetector,
    observer: Arc<dyn LifecycleObserver>,
    log_format: LogFormat,
}

impl<R: Renderer> EntryServer<R> {
    /// Create an entry point with the default configuration.
    pub fn new(renderer: R) -> Self {
        Self::from_arc(Arc::new(renderer))
    }

    /// Create an entry point sharing an existing renderer.
    pub fn from_arc(renderer: Arc<R>) -> Self {
        Self {
            renderer,
            config: EntryConfig::default(),
            detector: CrawlerDetector::new(),
            observer: Arc::new(NoopObserver),
            log_format: LogFormat::Json,
        }
    }

    /// Replace the configuration. Extra crawler patterns are added to the
    /// default detector.
    pub fn with_config(mut self, config: EntryConfig) -> Self {
        self.detector = CrawlerDetector::new().with_patterns(config.extra_crawler_patterns.clone());
        self.config = config;
        self
    }

    /// Install a lifecycle observer.
    pub fn with_observer(mut self, observer: impl LifecycleObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Set the log output format.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &EntryConfig {
        &self.config
    }

    /// Stream timeout the framework should apply to deferred data.
    pub fn stream_timeout(&self) -> Duration {
        self.config.stream_timeout()
    }

    /// Mode a request would be rendered in.
    pub fn render_mode<B>(&self, request: &Request<B>, entry: &EntryContext) -> RenderMode {
        let user_agent = request
            .headers()
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok());
        RenderMode::select(self.detector.is_crawler_opt(user_agent), entry.is_spa_mode)
    }

    /// Render a document response.
    ///
    /// Resolves once the renderer signals the readiness the mode calls for.
    /// Fails if the shell cannot be produced or the render is aborted first;
    /// the caller is expected to turn that into an error response.
    pub async fn handle_request<B>(
        &self,
        request: &Request<B>,
        status: StatusCode,
        mut headers: HeaderMap,
        entry: EntryContext,
        load: LoadContext,
    ) -> Result<Response<ResponseBody>, RenderError> {
        let content_type = HeaderValue::from_str(&self.config.content_type)?;
        let ctx = RequestContext::from_request(request);
        let request_id = HeaderValue::from_str(ctx.request_id.as_str())?;
        let mode = RenderMode::select(
            self.detector.is_crawler_opt(ctx.user_agent.as_deref()),
            entry.is_spa_mode,
        );

        let logger = StructuredLogger::new(ctx.request_id.clone())
            .with_url(&ctx.url)
            .with_format(self.log_format);
        logger
            .debug_builder("Render started")
            .field("mode", mode.as_str())
            .field_bool("spa_mode", entry.is_spa_mode)
            .emit();
        self.observer.on_phase(LifecyclePhase::Start, ctx.timing.elapsed());

        let render_request = RenderRequest {
            request_id: ctx.request_id.clone(),
            url: ctx.url.clone(),
            mode,
            entry,
            load,
        };

        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let abort = AbortSignal::new();
        let task = spawn_render(self.renderer.clone(), render_request, events_tx, abort.clone());

        let driver = RenderDriver::new(
            mode,
            status,
            abort,
            task,
            Deadlines {
                abort_after: self.config.abort_delay(),
                drain_for: self.config.drain_timeout(),
            },
            logger,
            ctx.timing,
            self.observer.clone(),
        );
        let (reply_tx, reply_rx) = oneshot::channel();
        tokio::spawn(driver.run(events_rx, reply_tx));

        let ready = reply_rx.await.map_err(|_| RenderError::Incomplete)??;

        headers.insert(CONTENT_TYPE, content_type);
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), request_id);

        let injector = BodyCommentInjector::new(self.config.comment.clone())
            .with_max_buffer(self.config.max_buffer_bytes);
        let mut response = Response::new(ResponseBody::new(ready.body, injector));
        *response.status_mut() = ready.status;
        *response.headers_mut() = headers;

        Ok(response)
    }
}

fn spawn_render<R: Renderer>(
    renderer: Arc<R>,
    request: RenderRequest,
    events: mpsc::Sender<RenderEvent>,
    abort: AbortSignal,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut sink = RenderSink::new(events.clone(), abort);
        let outcome = match renderer.render(request, &mut sink).await {
            Ok(()) => RenderEvent::Finished,
            Err(err) => RenderEvent::Failed(err),
        };
        let _ = events.send(outcome).await;
    })
}
