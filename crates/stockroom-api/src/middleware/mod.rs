//! # HTTP Middleware
//!
//! Cross-cutting layers wrapped around the authenticated routes:
//!
//! - [`tracing_layer`]: one span per request.
//! - [`metrics`]: Prometheus counters and latency histograms.
//! - [`rate_limit`]: fixed-window budget per authenticated caller.

pub mod metrics;
pub mod rate_limit;
pub mod tracing_layer;
