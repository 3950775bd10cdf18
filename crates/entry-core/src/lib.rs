//! Core abstractions for the streaming SSR entry point.
//!
//! This crate provides the fundamental types:
//! - `EntryConfig` - Timeouts, injector threshold and response defaults
//! - `RequestContext` - Per-request identity and timing
//! - `EntryContext` / `LoadContext` - Framework-supplied render contexts
//! - `CrawlerDetector` - User-agent crawler classification
//! - `LifecyclePhase` - Render lifecycle tracking
//! - `RenderError` - Shell and in-stream failures

mod config;
mod context;
mod crawler;
mod error;
mod lifecycle;

pub use config::*;
pub use context::*;
pub use crawler::*;
pub use error::*;
pub use lifecycle::*;
