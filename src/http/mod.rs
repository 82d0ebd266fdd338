//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/jobs
//!     → jobs.rs::submit_job (validate, store parameters, return job id)
//!
//! GET /api/jobs/{job_id}/stream
//!     → jobs.rs::stream_job (load parameters, spawn runner task)
//!     → SSE body fed from the job's event channel, keepalive comments
//! ```

pub mod jobs;
pub mod server;

pub use server::{AppState, HttpServer, ServerError};
