//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatch + http produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID and session ID flow through log fields
//! - Metrics are cheap no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
