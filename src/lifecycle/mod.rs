//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Build server → Bind
//!
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → broadcast → server stops accepting → open streams drain
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
