//! Render driver: turns renderer events into a single response.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use entry_core::{LifecycleObserver, LifecyclePhase, RenderError, TimingContext};
use entry_observability::{MetricsCollector, StructuredLogger};
use entry_streaming::{AbortSignal, RenderEvent, RenderMode};
use http::StatusCode;
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tokio::sync::mpsc::{self, OwnedPermit};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Chunks the response body holds before the render has to wait for the
/// client.
pub(crate) const BODY_CAPACITY: usize = 16;

/// What the caller receives once the response can be built.
#[derive(Debug)]
pub(crate) struct Ready {
    pub status: StatusCode,
    pub body: mpsc::Receiver<Bytes>,
}

pub(crate) type Reply = oneshot::Sender<Result<Ready, RenderError>>;

/// Where the response currently stands.
enum Stage {
    /// Nothing handed out yet; output is held back.
    Pending { buffered: Vec<Bytes>, reply: Reply },
    /// Response handed out. Output goes to the body, or to the backlog while
    /// the client is behind.
    Streaming {
        body: mpsc::Sender<Bytes>,
        backlog: VecDeque<Bytes>,
    },
    /// Response rejected, finished or abandoned; output is dropped.
    Done,
}

impl Stage {
    fn body_sender(&self) -> Option<mpsc::Sender<Bytes>> {
        match self {
            Stage::Streaming { body, .. } => Some(body.clone()),
            _ => None,
        }
    }

    fn reply_mut(&mut self) -> Option<&mut Reply> {
        match self {
            Stage::Pending { reply, .. } => Some(reply),
            _ => None,
        }
    }

    fn is_pending(&self) -> bool {
        matches!(self, Stage::Pending { .. })
    }

    fn is_streaming(&self) -> bool {
        matches!(self, Stage::Streaming { .. })
    }

    fn has_backlog(&self) -> bool {
        matches!(self, Stage::Streaming { backlog, .. } if !backlog.is_empty())
    }
}

/// Timeouts the driver enforces.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadlines {
    pub abort_after: Duration,
    pub drain_for: Duration,
}

/// Drives one render from start to completion.
pub(crate) struct RenderDriver {
    mode: RenderMode,
    status: StatusCode,
    abort: AbortSignal,
    task: JoinHandle<()>,
    deadlines: Deadlines,
    drain_until: Option<Instant>,
    logger: StructuredLogger,
    metrics: MetricsCollector,
    timing: TimingContext,
    observer: Arc<dyn LifecycleObserver>,
    shell_seen: bool,
    outcome_seen: bool,
    errors_before_ready: u32,
}

impl RenderDriver {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        mode: RenderMode,
        status: StatusCode,
        abort: AbortSignal,
        task: JoinHandle<()>,
        deadlines: Deadlines,
        logger: StructuredLogger,
        timing: TimingContext,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Self {
        let mut metrics = MetricsCollector::new(logger.request_id().clone());
        metrics.set_mode(mode.as_str());

        Self {
            mode,
            status,
            abort,
            task,
            deadlines,
            drain_until: None,
            logger,
            metrics,
            timing,
            observer,
            shell_seen: false,
            outcome_seen: false,
            errors_before_ready: 0,
        }
    }

    /// Run until the renderer's event channel closes and the body is flushed.
    ///
    /// The abort timer belongs to the driver: it starts the drain deadline
    /// even when the signal was already fired elsewhere.
    pub(crate) async fn run(mut self, mut events: mpsc::Receiver<RenderEvent>, reply: Reply) {
        let abort_at = Instant::now() + self.deadlines.abort_after;
        let mut timer_fired = false;
        let mut stage = Stage::Pending {
            buffered: Vec::new(),
            reply,
        };

        loop {
            let backlogged = stage.has_backlog();
            let pending = stage.is_pending();
            let streaming = stage.is_streaming();
            let drain_at = self.drain_until;
            let body = stage.body_sender();
            let reply = stage.reply_mut();

            tokio::select! {
                biased;

                event = events.recv(), if !backlogged => match event {
                    Some(event) => self.on_event(event, &mut stage),
                    None => {
                        self.on_closed(&mut stage).await;
                        break;
                    }
                },

                permit = reserve(body.clone()), if backlogged => match permit {
                    Ok(permit) => self.deliver(permit, &mut stage),
                    Err(_) => self.on_client_gone(&mut stage),
                },

                _ = sleep_until(abort_at), if !timer_fired => {
                    timer_fired = true;
                    self.fire_abort();
                    self.start_drain();
                }

                _ = sleep_until(drain_at.unwrap_or(abort_at)), if drain_at.is_some() => {
                    self.drain_until = None;
                    self.logger
                        .warn_builder("Render ignored abort, cancelling")
                        .duration_ms("drain_ms", self.deadlines.drain_for)
                        .emit();
                    self.task.abort();
                }

                _ = body_closed(body), if streaming && !backlogged => {
                    self.on_client_gone(&mut stage);
                }

                _ = caller_gone(reply), if pending => {
                    self.logger.debug("Caller went away before the response was ready");
                    self.on_client_gone(&mut stage);
                }
            }
        }

        self.finish();
    }

    fn on_event(&mut self, event: RenderEvent, stage: &mut Stage) {
        match event {
            RenderEvent::Chunk(bytes) => self.on_chunk(bytes, stage),
            RenderEvent::ShellReady => {
                self.shell_seen = true;
                self.phase(LifecyclePhase::ShellReady);
                if self.mode == RenderMode::ShellReady {
                    self.resolve(stage);
                }
            }
            RenderEvent::AllReady => {
                self.shell_seen = true;
                self.phase(LifecyclePhase::AllReady);
                self.resolve(stage);
            }
            RenderEvent::Error(err) => self.on_render_error(err, stage),
            RenderEvent::Finished => {
                self.outcome_seen = true;
                if stage.is_pending() {
                    self.settle_pending(stage, true);
                }
            }
            RenderEvent::Failed(err) => {
                self.outcome_seen = true;
                if stage.is_pending() && !self.shell_seen {
                    self.reject(stage, err);
                } else {
                    self.on_render_error(err, stage);
                }
            }
        }
    }

    fn on_chunk(&mut self, bytes: Bytes, stage: &mut Stage) {
        let closed = match stage {
            Stage::Pending { buffered, .. } => {
                buffered.push(bytes);
                false
            }
            Stage::Streaming { backlog, .. } if !backlog.is_empty() => {
                backlog.push_back(bytes);
                false
            }
            Stage::Streaming { body, backlog } => {
                let len = bytes.len();
                match body.try_send(bytes) {
                    Ok(()) => {
                        self.metrics.record_chunk(len);
                        false
                    }
                    Err(TrySendError::Full(bytes)) => {
                        backlog.push_back(bytes);
                        false
                    }
                    Err(TrySendError::Closed(_)) => true,
                }
            }
            Stage::Done => false,
        };

        if closed {
            self.on_client_gone(stage);
        }
    }

    /// Send the oldest backlogged chunk through a reserved body slot.
    fn deliver(&mut self, permit: OwnedPermit<Bytes>, stage: &mut Stage) {
        let Stage::Streaming { backlog, .. } = stage else {
            return;
        };
        if let Some(bytes) = backlog.pop_front() {
            self.metrics.record_chunk(bytes.len());
            permit.send(bytes);
        }
    }

    /// Errors before the response exists only downgrade its status; the
    /// caller reports shell failures itself.
    fn on_render_error(&mut self, err: RenderError, stage: &Stage) {
        let after_shell = !stage.is_pending();
        self.metrics.record_error(after_shell);
        self.phase(LifecyclePhase::StreamError {
            after_shell,
            message: err.to_string(),
        });

        if after_shell {
            self.logger
                .error_builder("Stream render error")
                .field("error", err.to_string())
                .field("mode", self.mode.as_str())
                .emit();
        } else {
            self.errors_before_ready += 1;
        }
    }

    /// The renderer is done (or gone) before a readiness event resolved the
    /// response. A shell that was seen still gets a response. Otherwise an
    /// abort rejects, a normal completion resolves and anything else is an
    /// incomplete render.
    fn settle_pending(&mut self, stage: &mut Stage, completed: bool) {
        if self.shell_seen {
            self.resolve(stage);
        } else if self.abort.is_aborted() {
            self.reject(stage, RenderError::Aborted);
        } else if completed {
            self.resolve(stage);
        } else {
            self.reject(stage, RenderError::Incomplete);
        }
    }

    fn resolve(&mut self, stage: &mut Stage) {
        let Stage::Pending { buffered, reply } = std::mem::replace(stage, Stage::Done) else {
            return;
        };

        let status = if self.errors_before_ready > 0 {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            self.status
        };

        let (tx, rx) = mpsc::channel(BODY_CAPACITY);
        if reply.send(Ok(Ready { status, body: rx })).is_err() {
            self.logger.debug("Caller went away before the response was ready");
            self.on_client_gone(stage);
            return;
        }

        self.timing.mark("ready");
        self.metrics.record_ready(status.as_u16());
        self.phase(LifecyclePhase::Responded(status.as_u16()));
        self.logger
            .debug_builder("Response ready")
            .field("mode", self.mode.as_str())
            .field_u64("status", status.as_u16() as u64)
            .field_u64("buffered_chunks", buffered.len() as u64)
            .emit();

        *stage = Stage::Streaming {
            body: tx,
            backlog: VecDeque::new(),
        };
        for chunk in buffered {
            self.on_chunk(chunk, stage);
        }
    }

    fn reject(&mut self, stage: &mut Stage, err: RenderError) {
        let Stage::Pending { reply, .. } = std::mem::replace(stage, Stage::Done) else {
            return;
        };

        self.phase(LifecyclePhase::Rejected(err.to_string()));
        self.logger
            .debug_builder("Render rejected")
            .field("error", err.to_string())
            .emit();
        let _ = reply.send(Err(err));
    }

    /// The event channel closed. Without a reported outcome the render task
    /// either panicked or was cancelled.
    async fn on_closed(&mut self, stage: &mut Stage) {
        if !self.outcome_seen {
            if let Err(err) = (&mut self.task).await {
                if err.is_panic() {
                    let message = "renderer panicked".to_string();
                    let err = if self.shell_seen {
                        RenderError::Stream(message)
                    } else {
                        RenderError::Shell(message)
                    };
                    self.on_event(RenderEvent::Failed(err), stage);
                }
            }
        }

        if stage.is_pending() {
            self.settle_pending(stage, false);
        }
        *stage = Stage::Done;
    }

    fn on_client_gone(&mut self, stage: &mut Stage) {
        *stage = Stage::Done;
        if self.metrics.metrics().client_gone {
            return;
        }
        self.metrics.record_client_gone();
        self.phase(LifecyclePhase::ClientGone);
        self.logger.info("Response dropped, aborting render");
        self.fire_abort();
        self.start_drain();
    }

    fn fire_abort(&mut self) {
        if !self.abort.abort() {
            return;
        }
        self.timing.mark("abort");
        self.metrics.record_abort();
        self.phase(LifecyclePhase::Aborted);
        self.logger
            .warn_builder("Render aborted")
            .duration_ms("abort_after_ms", self.deadlines.abort_after)
            .field_bool("response_sent", self.timing.time_to_ready().is_some())
            .emit();
    }

    fn start_drain(&mut self) {
        if self.drain_until.is_none() {
            self.drain_until = Some(Instant::now() + self.deadlines.drain_for);
        }
    }

    fn finish(self) {
        self.phase(LifecyclePhase::Completion);
        let metrics = self.metrics.finish();
        self.logger
            .debug_builder("Render finished")
            .field("metrics", metrics.to_json())
            .emit();
    }

    fn phase(&self, phase: LifecyclePhase) {
        self.observer.on_phase(phase, self.timing.elapsed());
    }
}

async fn reserve(
    body: Option<mpsc::Sender<Bytes>>,
) -> Result<OwnedPermit<Bytes>, SendError<()>> {
    match body {
        Some(tx) => tx.reserve_owned().await,
        None => std::future::pending().await,
    }
}

async fn body_closed(body: Option<mpsc::Sender<Bytes>>) {
    match body {
        Some(tx) => tx.closed().await,
        None => std::future::pending().await,
    }
}

async fn caller_gone(reply: Option<&mut Reply>) {
    match reply {
        Some(reply) => reply.closed().await,
        None => std::future::pending().await,
    }
}
