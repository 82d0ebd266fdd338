//! Vendor RPC subsystem.
//!
//! # Data Flow
//! ```text
//! action + business params + per-job credentials
//!     → signer.rs (protocol fields, canonical query, HMAC-SHA1)
//!     → client.rs (form POST with deadlines, envelope mapping)
//!     → types.rs (ResponseEnvelope / RpcError)
//! ```
//!
//! # Security Constraints
//! - Credentials arrive with each job and are never stored here
//! - Never log the access key secret
//! - Nonce and timestamp are generated once per call

pub mod client;
pub mod signer;
pub mod types;

pub use client::RpcClient;
pub use signer::RequestSigner;
pub use types::{
    Credentials, ResponseEnvelope, RpcCall, RpcError, RpcResult, ACTION_QUERY_INSTANCES,
    ACTION_RENEW_INSTANCE,
};
