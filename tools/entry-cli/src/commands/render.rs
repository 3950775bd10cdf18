//! Render a file through the entry point.

use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use bytes::Bytes;
use entry_core::{EntryContext, LoadContext, RenderError};
use entry_observability::LogFormat;
use entry_server::{EntryServer, ResponseBody};
use entry_streaming::{RenderRequest, RenderSink, Renderer};
use futures::StreamExt;
use http::{HeaderMap, Request, StatusCode};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::{split_chunks, RenderArgs};
use crate::context::Context;
use crate::output::{format_bytes, status_badge};

/// Renderer that plays a static document back in chunks.
///
/// The first chunk is the shell. Later chunks are written `delay` apart,
/// which makes the stream timeout observable on a slow document.
pub struct FileRenderer {
    chunks: Vec<Bytes>,
    delay: Duration,
}

impl FileRenderer {
    pub fn new(document: Bytes, chunk_size: usize, delay: Duration) -> Self {
        Self {
            chunks: split_chunks(document, chunk_size),
            delay,
        }
    }
}

#[async_trait]
impl Renderer for FileRenderer {
    async fn render(&self, _request: RenderRequest, sink: &mut RenderSink) -> Result<(), RenderError> {
        let mut chunks = self.chunks.iter().cloned();

        if let Some(shell) = chunks.next() {
            sink.write(shell).await?;
        }
        sink.shell_ready().await?;

        for chunk in chunks {
            if !self.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    _ = sink.aborted() => break,
                }
            }
            if sink.is_aborted() {
                break;
            }
            sink.write(chunk).await?;
        }

        if !sink.is_aborted() {
            sink.all_ready().await?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RenderSummary {
    url: String,
    mode: String,
    status: u16,
    bytes: u64,
    injected: bool,
    elapsed_ms: u64,
}

/// Run the render command.
pub async fn run(args: RenderArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.file);
    let document = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut builder = Request::builder().uri(&args.url);
    if let Some(ua) = &args.user_agent {
        builder = builder.header(http::header::USER_AGENT, ua);
    }
    let request = builder
        .body(())
        .with_context(|| format!("Invalid request URL: {}", args.url))?;
    let status = StatusCode::from_u16(args.status)
        .with_context(|| format!("Invalid status code: {}", args.status))?;

    let log_format = if ctx.output.is_json() {
        LogFormat::Json
    } else {
        LogFormat::Human
    };
    let renderer = FileRenderer::new(
        Bytes::from(document),
        args.chunk_size,
        Duration::from_millis(args.delay_ms),
    );
    let server = EntryServer::new(renderer)
        .with_config(ctx.config.entry.clone())
        .with_log_format(log_format);

    let entry = EntryContext::new().with_spa_mode(args.spa);
    let mode = server.render_mode(&request, &entry);
    ctx.output.debug(&format!(
        "Rendering {} in {} mode (abort after {} ms)",
        args.url,
        mode,
        ctx.config.entry.abort_delay().as_millis()
    ));

    let started = tokio::time::Instant::now();
    let response = server
        .handle_request(&request, status, HeaderMap::new(), entry, LoadContext::new())
        .await
        .context("Render failed")?;
    let status = response.status();

    if !ctx.output.is_json() {
        ctx.output.header("Response");
        ctx.output.kv("Status", &status_badge(status.as_u16()));
        ctx.output.kv("Mode", mode.as_str());
        for (name, value) in response.headers() {
            ctx.output
                .kv(name.as_str(), value.to_str().unwrap_or("<binary>"));
        }
    }

    let (bytes, injected) = write_body(response.into_body()).await?;

    let summary = RenderSummary {
        url: args.url,
        mode: mode.to_string(),
        status: status.as_u16(),
        bytes,
        injected,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    if ctx.output.is_json() {
        ctx.output.json(&summary);
    } else {
        ctx.output.success(&format!(
            "Rendered {} in {} ms",
            format_bytes(summary.bytes),
            summary.elapsed_ms
        ));
        if status.is_server_error() {
            ctx.output.warn("A render error occurred before the response was ready");
        }
    }

    Ok(())
}

async fn write_body(mut body: ResponseBody) -> Result<(u64, bool)> {
    let mut stdout = tokio::io::stdout();
    let mut bytes = 0u64;
    while let Some(chunk) = body.next().await {
        bytes += chunk.len() as u64;
        stdout
            .write_all(&chunk)
            .await
            .context("Failed to write output")?;
    }
    stdout.flush().await.context("Failed to flush output")?;
    Ok((bytes, body.injected()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use entry_core::EntryConfig;

    const PAGE: &str = "<html><head></head><body><main>hello</main></body></html>";

    fn request(user_agent: &str) -> Request<()> {
        Request::builder()
            .uri("/")
            .header(http::header::USER_AGENT, user_agent)
            .body(())
            .unwrap()
    }

    async fn render(server: &EntryServer<FileRenderer>, user_agent: &str) -> (StatusCode, String) {
        let response = server
            .handle_request(
                &request(user_agent),
                StatusCode::OK,
                HeaderMap::new(),
                EntryContext::new(),
                LoadContext::new(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect_bytes().await;
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_file_renderer_streams_document() {
        let server = EntryServer::new(FileRenderer::new(
            Bytes::from_static(PAGE.as_bytes()),
            8,
            Duration::ZERO,
        ));

        let (status, body) = render(&server, "Mozilla/5.0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            "<html><head></head><body><!-- Injected Comment --><main>hello</main></body></html>"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_document_is_cut_off_at_abort() {
        let config = EntryConfig::new()
            .with_stream_timeout(Duration::from_millis(100))
            .with_abort_grace(Duration::ZERO);
        let server = EntryServer::new(FileRenderer::new(
            Bytes::from_static(PAGE.as_bytes()),
            25,
            Duration::from_millis(60),
        ))
        .with_config(config);

        let (_, body) = render(&server, "Mozilla/5.0").await;
        assert!(body.starts_with("<html><head></head><body><!-- Injected Comment -->"));
        assert!(!body.ends_with("</html>"));
    }
}
