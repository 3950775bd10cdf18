//! Observability for the SSR entry point.
//!
//! This crate provides:
//! - `StructuredLogger` - Request-scoped structured logging over `tracing`
//! - `MetricsCollector` - Per-render timing and outcome metrics

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;

// Re-export RequestId and TimingContext from entry-core for convenience
pub use entry_core::{RequestId, TimingContext};
