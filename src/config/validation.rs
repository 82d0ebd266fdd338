//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{ServiceConfig, StoreBackend};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match url::Url::parse(&config.vendor.endpoint) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "vendor.endpoint",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("vendor.endpoint", e.to_string())),
    }

    if config.vendor.api_version.trim().is_empty() {
        errors.push(ValidationError::new("vendor.api_version", "must not be empty"));
    }
    if config.vendor.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("vendor.connect_timeout_secs", "must be > 0"));
    }
    if config.vendor.request_timeout_secs < config.vendor.connect_timeout_secs {
        errors.push(ValidationError::new(
            "vendor.request_timeout_secs",
            "must not be shorter than the connect timeout",
        ));
    }

    if config.stream.keepalive_secs == 0 {
        errors.push(ValidationError::new("stream.keepalive_secs", "must be > 0"));
    }
    if config.stream.channel_capacity == 0 {
        errors.push(ValidationError::new("stream.channel_capacity", "must be > 0"));
    }
    if config.jobs.tick_interval_ms == 0 {
        errors.push(ValidationError::new("jobs.tick_interval_ms", "must be > 0"));
    }
    if config.jobs.pending_ttl_secs == 0 {
        errors.push(ValidationError::new("jobs.pending_ttl_secs", "must be > 0"));
    }
    if config.jobs.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("jobs.sweep_interval_secs", "must be > 0"));
    }

    if config.store.backend == StoreBackend::File && config.store.dir.trim().is_empty() {
        errors.push(ValidationError::new(
            "store.dir",
            "required when the file backend is selected",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
