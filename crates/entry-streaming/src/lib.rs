//! Stream transforms and the renderer seam for the SSR entry point.
//!
//! This crate provides:
//! - `BodyCommentInjector` / `InjectStream` - Comment injection after `<body>`
//! - `FlushController` - Buffer threshold accounting
//! - `Renderer` - The streaming renderer interface
//! - `RenderSink` - Renderer-facing output and readiness signalling
//! - `AbortSignal` - One-shot render abort

mod flush;
mod inject;
mod renderer;
mod sink;

pub use flush::*;
pub use inject::*;
pub use renderer::*;
pub use sink::*;
