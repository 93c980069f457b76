//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! circuit registry, workflow runtime, controller retries
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout log stream
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Resource keys and instance ids are logged as fields, not interpolated
//! - Workflow code logs only outside replay so a resume does not repeat history
//! - Metrics are cheap and recorded unconditionally

pub mod logging;
pub mod metrics;
