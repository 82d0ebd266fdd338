//! ESA instance renewal service library.
//!
//! Accepts renewal jobs over HTTP, drives signed calls against the vendor
//! RPC API and streams progress to one observer per job as server-sent
//! events.

pub mod client;
pub mod config;
pub mod events;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod observability;
pub mod rpc;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
