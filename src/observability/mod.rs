//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Job id flows through every log line of a run
//! - Secrets never appear in fields
//! - Operator-facing progress goes to the event stream, not the log

pub mod logging;
pub mod metrics;
