//! Response body stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use entry_streaming::{BodyCommentInjector, InjectStream};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

/// Receiving half of the driver's body channel as a stream.
#[derive(Debug)]
pub struct BodyReceiver {
    rx: mpsc::Receiver<Bytes>,
}

impl BodyReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self { rx }
    }
}

impl Stream for BodyReceiver {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}

/// Body of a rendered response.
///
/// Yields the render output with the comment injected after `<body>`. The
/// stream ends when the render finishes or is cancelled. Dropping it aborts
/// the render.
#[derive(Debug)]
pub struct ResponseBody {
    inner: InjectStream<BodyReceiver>,
}

impl ResponseBody {
    pub(crate) fn new(rx: mpsc::Receiver<Bytes>, injector: BodyCommentInjector) -> Self {
        Self {
            inner: InjectStream::new(BodyReceiver::new(rx), injector),
        }
    }

    /// Whether the comment has been injected into what was read so far.
    pub fn injected(&self) -> bool {
        self.inner.injected()
    }

    /// Read the whole body into one buffer.
    pub async fn collect_bytes(mut self) -> Bytes {
        let mut out = Vec::new();
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk);
        }
        Bytes::from(out)
    }
}

impl Stream for ResponseBody {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.inner.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_body_injects_and_ends_with_channel() {
        let (tx, rx) = mpsc::channel(4);
        let body = ResponseBody::new(rx, BodyCommentInjector::new("<!-- c -->"));

        tx.send(Bytes::from_static(b"<html><body>")).await.unwrap();
        tx.send(Bytes::from_static(b"hi</body></html>")).await.unwrap();
        drop(tx);

        assert_eq!(
            body.collect_bytes().await,
            Bytes::from_static(b"<html><body><!-- c -->hi</body></html>")
        );
    }

    #[tokio::test]
    async fn test_dropping_body_closes_channel() {
        let (tx, rx) = mpsc::channel::<Bytes>(4);
        let body = ResponseBody::new(rx, BodyCommentInjector::default());

        drop(body);
        assert!(tx.is_closed());
    }
}
