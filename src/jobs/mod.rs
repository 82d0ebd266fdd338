//! Job subsystem.
//!
//! # Data Flow
//! ```text
//! POST submission
//!     → types.rs (validate, clamp, defaults → JobParameters)
//!     → store.rs (blob handoff keyed by job id)
//!     → runner.rs (query → renew × N → done, via rpc + events)
//!     → timefmt.rs (expiry display, days left)
//!
//! Never attached:
//!     → sweeper.rs (drops entries older than jobs.pending_ttl_secs)
//! ```
//!
//! # Design Decisions
//! - Parameters are read-only for the duration of a run
//! - Stored parameters are consumed at most once and deleted on every exit path
//! - One task per job; nothing is shared between jobs except the store

pub mod runner;
pub mod store;
pub mod sweeper;
pub mod timefmt;
pub mod types;

pub use runner::{JobOutcome, JobRunner};
pub use store::{FileJobStore, JobStore, MemoryJobStore, StoreError};
pub use sweeper::StaleJobSweeper;
pub use types::{
    generate_job_id, AdvancedOverrides, InstanceSnapshot, JobParameters, JobSubmission, Mode,
    SubmissionError,
};
