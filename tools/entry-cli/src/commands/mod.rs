//! CLI command implementations.

pub mod inject;
pub mod render;

use bytes::Bytes;
use clap::Args;

/// Arguments for the inject command.
#[derive(Args)]
pub struct InjectArgs {
    /// HTML file to transform.
    pub file: String,

    /// Size of the chunks the file is fed in.
    #[arg(long, default_value_t = 1024)]
    pub chunk_size: usize,

    /// Comment to inject (overrides config).
    #[arg(long)]
    pub comment: Option<String>,
}

/// Arguments for the render command.
#[derive(Args)]
pub struct RenderArgs {
    /// HTML file served as the rendered document.
    pub file: String,

    /// Request URL (path and query).
    #[arg(long, default_value = "/")]
    pub url: String,

    /// User agent of the simulated request.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Render as a non-interactive SPA shell.
    #[arg(long)]
    pub spa: bool,

    /// Delay between chunks after the shell (milliseconds).
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,

    /// Size of the chunks the renderer writes.
    #[arg(long, default_value_t = 1024)]
    pub chunk_size: usize,

    /// Response status passed to the entry point.
    #[arg(long, default_value_t = 200)]
    pub status: u16,
}

/// Split `data` into chunks of at most `size` bytes. A size of zero keeps
/// the data whole.
pub(crate) fn split_chunks(data: Bytes, size: usize) -> Vec<Bytes> {
    if size == 0 || data.len() <= size {
        return if data.is_empty() { Vec::new() } else { vec![data] };
    }
    (0..data.len())
        .step_by(size)
        .map(|start| data.slice(start..(start + size).min(data.len())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_chunks() {
        let chunks = split_chunks(Bytes::from_static(b"abcdefg"), 3);
        assert_eq!(chunks, vec!["abc", "def", "g"]);

        assert_eq!(split_chunks(Bytes::from_static(b"abc"), 0), vec!["abc"]);
        assert!(split_chunks(Bytes::new(), 4).is_empty());
    }
}
