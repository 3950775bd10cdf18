//! Common imports for embedding the entry point.

pub use crate::{EntryServer, ResponseBody};
pub use entry_core::{
    EntryConfig, EntryContext, LifecycleObserver, LifecyclePhase, LoadContext, RenderError,
};
pub use entry_streaming::{RenderMode, RenderRequest, RenderSink, Renderer};
pub use http::{HeaderMap, Request, Response, StatusCode};
