//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, header timeout)
//! - Build the shared RPC client, job store and runner
//! - Bind server to listener and stop on shutdown
//! - Sweep never-attached jobs from the store while serving

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use dashmap::DashSet;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ServiceConfig, StreamConfig};
use crate::http::jobs::{health, stream_job, submit_job};
use crate::jobs::{store, JobRunner, JobStore, StaleJobSweeper, StoreError};
use crate::rpc::{RpcClient, RpcError};

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("vendor client: {0}")]
    Rpc(#[from] RpcError),

    #[error("job store: {0}")]
    Store(#[from] StoreError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub runner: JobRunner,
    pub store: Arc<dyn JobStore>,
    /// Jobs that currently have an observer.
    pub attached: Arc<DashSet<String>>,
    pub stream: StreamConfig,
}

/// HTTP server for the renewal service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    store: Arc<dyn JobStore>,
}

impl HttpServer {
    /// Create a new HTTP server with the store selected by configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, ServerError> {
        let store = store::from_config(&config.store)?;
        Self::with_store(config, store)
    }

    /// Create a new HTTP server around an existing job store.
    pub fn with_store(config: ServiceConfig, store: Arc<dyn JobStore>) -> Result<Self, ServerError> {
        let rpc = RpcClient::new(&config.vendor)?;
        let runner = JobRunner::new(rpc, store.clone())
            .with_tick_interval(Duration::from_millis(config.jobs.tick_interval_ms));

        let state = AppState {
            runner,
            store: store.clone(),
            attached: Arc::new(DashSet::new()),
            stream: config.stream.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            store,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        Router::new()
            .route("/api/jobs", post(submit_job))
            .route("/api/jobs/{job_id}/stream", get(stream_job))
            .route("/healthz", get(health))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            vendor = %self.config.vendor.endpoint,
            "HTTP server starting"
        );

        let sweeper = StaleJobSweeper::new(
            self.store.clone(),
            Duration::from_secs(self.config.jobs.pending_ttl_secs),
            Duration::from_secs(self.config.jobs.sweep_interval_secs),
        );
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
