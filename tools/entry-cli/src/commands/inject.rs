//! Run the body comment injector over a file.

use anyhow::{Context as _, Result};
use bytes::Bytes;
use entry_streaming::{BodyCommentInjector, InjectStream};
use futures::{stream, StreamExt};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::{split_chunks, InjectArgs};
use crate::context::Context;
use crate::output::format_bytes;

#[derive(Debug, Serialize)]
struct InjectSummary {
    file: String,
    chunks_in: usize,
    bytes_in: u64,
    bytes_out: u64,
    injected: bool,
}

/// Run the inject command.
pub async fn run(args: InjectArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.file);
    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let comment = args
        .comment
        .unwrap_or_else(|| ctx.config.entry.comment.clone());
    let injector =
        BodyCommentInjector::new(comment).with_max_buffer(ctx.config.entry.max_buffer_bytes);

    let chunks = split_chunks(Bytes::from(data), args.chunk_size);
    let chunks_in = chunks.len();
    let bytes_in: u64 = chunks.iter().map(|c| c.len() as u64).sum();
    ctx.output
        .debug(&format!("Feeding {} chunk(s) of up to {} bytes", chunks_in, args.chunk_size));

    let mut out = InjectStream::new(stream::iter(chunks), injector);
    let mut stdout = tokio::io::stdout();
    let mut bytes_out = 0u64;
    while let Some(chunk) = out.next().await {
        bytes_out += chunk.len() as u64;
        stdout
            .write_all(&chunk)
            .await
            .context("Failed to write output")?;
    }
    stdout.flush().await.context("Failed to flush output")?;

    let summary = InjectSummary {
        file: args.file,
        chunks_in,
        bytes_in,
        bytes_out,
        injected: out.injected(),
    };

    if ctx.output.is_json() {
        ctx.output.json(&summary);
    } else if summary.injected {
        ctx.output.success(&format!(
            "Injected comment ({} -> {})",
            format_bytes(summary.bytes_in),
            format_bytes(summary.bytes_out)
        ));
    } else {
        ctx.output.warn(&format!(
            "No <body> tag within the first {} bytes, output unchanged",
            ctx.config.entry.max_buffer_bytes
        ));
    }

    Ok(())
}
