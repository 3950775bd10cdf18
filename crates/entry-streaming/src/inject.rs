//! Comment injection after the opening body tag.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use entry_core::DEFAULT_COMMENT;
use futures::{Stream, StreamExt};

use crate::flush::{FlushController, DEFAULT_MAX_BUFFER};

/// The opening body tag, matched ASCII case-insensitively.
pub const BODY_TAG: &[u8] = b"<body>";

/// Scanning state of the injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectState {
    /// Buffering input while looking for the body tag.
    Scanning,
    /// The comment was written; everything else passes through.
    Injected,
    /// The buffer overflowed before the tag appeared; passes through.
    GaveUp,
}

/// Inserts a fixed comment after the first `<body>` of an HTML byte stream.
///
/// Input is buffered until the tag is found or the buffer grows past the
/// threshold. In the latter case the buffer is released unmodified and the
/// comment is never injected, even if the tag shows up later.
#[derive(Debug)]
pub struct BodyCommentInjector {
    comment: Bytes,
    buffer: BytesMut,
    flush: FlushController,
    state: InjectState,
}

impl BodyCommentInjector {
    /// Create an injector for the given comment.
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: Bytes::from(comment.into()),
            buffer: BytesMut::new(),
            flush: FlushController::new(DEFAULT_MAX_BUFFER),
            state: InjectState::Scanning,
        }
    }

    /// Set the buffer threshold.
    pub fn with_max_buffer(mut self, bytes: usize) -> Self {
        self.flush = FlushController::new(bytes);
        self
    }

    /// Feed a chunk; returns the chunks ready for output.
    pub fn push(&mut self, chunk: Bytes) -> Vec<Bytes> {
        if chunk.is_empty() {
            return Vec::new();
        }
        if self.state != InjectState::Scanning {
            return vec![chunk];
        }

        // A tag split across chunks starts at most len-1 bytes back.
        let search_from = self.buffer.len().saturating_sub(BODY_TAG.len() - 1);
        self.buffer.extend_from_slice(&chunk);
        self.flush.add_bytes(chunk.len());

        if let Some(pos) = find_body_tag(&self.buffer[search_from..]) {
            let end = search_from + pos + BODY_TAG.len();
            let mut head = self.buffer.split_to(end);
            head.extend_from_slice(&self.comment);
            let rest = self.buffer.split().freeze();

            self.state = InjectState::Injected;
            self.flush.reset();

            let mut out = vec![head.freeze()];
            if !rest.is_empty() {
                out.push(rest);
            }
            return out;
        }

        if self.flush.should_flush() {
            self.state = InjectState::GaveUp;
            self.flush.reset();
            return vec![self.buffer.split().freeze()];
        }

        Vec::new()
    }

    /// Release whatever is still buffered. Called once the input ends.
    pub fn finish(&mut self) -> Option<Bytes> {
        self.flush.reset();
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }

    /// Current state.
    pub fn state(&self) -> InjectState {
        self.state
    }

    /// Whether the comment has been written.
    pub fn injected(&self) -> bool {
        self.state == InjectState::Injected
    }

    /// Bytes currently held back.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for BodyCommentInjector {
    fn default() -> Self {
        Self::new(DEFAULT_COMMENT)
    }
}

fn find_body_tag(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(BODY_TAG.len())
        .position(|w| w.eq_ignore_ascii_case(BODY_TAG))
}

/// Stream adapter running a byte stream through a [`BodyCommentInjector`].
#[derive(Debug)]
pub struct InjectStream<S> {
    inner: Option<S>,
    injector: BodyCommentInjector,
    ready: VecDeque<Bytes>,
}

impl<S> InjectStream<S>
where
    S: Stream<Item = Bytes> + Unpin,
{
    /// Wrap a stream.
    pub fn new(inner: S, injector: BodyCommentInjector) -> Self {
        Self {
            inner: Some(inner),
            injector,
            ready: VecDeque::new(),
        }
    }

    /// Whether the comment has been written so far.
    pub fn injected(&self) -> bool {
        self.injector.injected()
    }

    /// Get mutable access to the wrapped stream, if it has not ended.
    pub fn inner_mut(&mut self) -> Option<&mut S> {
        self.inner.as_mut()
    }
}

impl<S> Stream for InjectStream<S>
where
    S: Stream<Item = Bytes> + Unpin,
{
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        let this = &mut *self;
        loop {
            if let Some(chunk) = this.ready.pop_front() {
                return Poll::Ready(Some(chunk));
            }

            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };

            match inner.poll_next_unpin(cx) {
                Poll::Ready(Some(chunk)) => this.ready.extend(this.injector.push(chunk)),
                Poll::Ready(None) => {
                    this.inner = None;
                    this.ready.extend(this.injector.finish());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extension for wrapping byte streams with comment injection.
pub trait InjectExt: Stream<Item = Bytes> + Unpin + Sized {
    /// Inject `comment` after the first `<body>` of this stream.
    fn inject_body_comment(self, comment: impl Into<String>) -> InjectStream<Self> {
        InjectStream::new(self, BodyCommentInjector::new(comment))
    }
}

impl<S> InjectExt for S where S: Stream<Item = Bytes> + Unpin {}
