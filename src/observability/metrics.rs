//! Metrics collection and exposition.
//!
//! # Metrics
//! - `renew_jobs_started_total` (counter): jobs attached to a stream, by mode
//! - `renew_jobs_finished_total` (counter): jobs ended, by outcome
//! - `renew_rpc_calls_total` (counter): vendor calls, by action and outcome
//! - `renew_rpc_call_duration_seconds` (histogram): vendor call latency
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_job_started(mode: &str) {
    metrics::counter!("renew_jobs_started_total", "mode" => mode.to_string()).increment(1);
}

pub fn record_job_finished(outcome: &str) {
    metrics::counter!("renew_jobs_finished_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_rpc_call(action: &str, outcome: &str, start: Instant) {
    metrics::counter!(
        "renew_rpc_calls_total",
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("renew_rpc_call_duration_seconds", "action" => action.to_string())
        .record(start.elapsed().as_secs_f64());
}
