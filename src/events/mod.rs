//! Job event stream subsystem.
//!
//! # Data Flow
//! ```text
//! JobRunner
//!     → emitter.rs (bounded channel, one per job, ordered)
//!     → http stream handler (SSE frames + keepalive comments)
//!     → observer
//!     → sse.rs (client-side frame decoding)
//!     → types.rs (RunEvent)
//! ```
//!
//! # Design Decisions
//! - Exactly one observer per job; the channel has a single receiver
//! - Observer disconnect closes the channel; the runner polls for it
//! - Keepalives are transport comments, never RunEvents

pub mod emitter;
pub mod sse;
pub mod types;

pub use emitter::EventEmitter;
pub use sse::{SseDecoder, SseFrame};
pub use types::{Done, Fatal, Hello, LogLine, LogStyle, Order, RunEvent, StatusReport, Tick};
