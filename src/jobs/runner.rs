//! Job execution: query, optional repeated renewal, countdown between tries.
//!
//! # States
//! ```text
//! Querying → Deciding ─ check ─→ Finished
//!                     └ renew ─→ Renewing(i) → Waiting → Renewing(i+1) … → Finished
//! any query/protocol failure      → Aborted   (fatal event)
//! observer gone at a poll point   → Abandoned (no further events)
//! ```
//!
//! A failed renewal attempt is logged and the loop moves on to the next one;
//! failed queries end the job.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::events::{
    Done, EventEmitter, Fatal, Hello, LogStyle, Order, RunEvent, StatusReport, Tick,
};
use crate::jobs::store::JobStore;
use crate::jobs::timefmt::{days_left, to_display_time};
use crate::jobs::types::{
    InstanceSnapshot, JobParameters, Mode, DEFAULT_PRODUCT_CODE, DEFAULT_SUBSCRIPTION_TYPE,
};
use crate::observability::metrics;
use crate::rpc::{RpcClient, RpcError, ACTION_QUERY_INSTANCES, ACTION_RENEW_INSTANCE};

const QUERY_PAGE_SIZE: &str = "20";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// All steps completed; `done` was emitted.
    Finished,
    /// An unrecoverable error; `fatal` was emitted.
    Aborted,
    /// The observer disconnected; nothing further was emitted.
    Abandoned,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Finished => "finished",
            JobOutcome::Aborted => "aborted",
            JobOutcome::Abandoned => "abandoned",
        }
    }
}

/// Why a run stopped before finishing.
#[derive(Debug)]
enum Interrupt {
    Fatal(String),
    Disconnected,
}

impl From<RpcError> for Interrupt {
    fn from(e: RpcError) -> Self {
        Interrupt::Fatal(e.to_string())
    }
}

/// Deletes a job's stored parameters when dropped, whatever the exit path.
struct ParameterCleanup<'a> {
    store: &'a dyn JobStore,
    job_id: &'a str,
}

impl Drop for ParameterCleanup<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.delete(self.job_id) {
            tracing::error!(job_id = %self.job_id, error = %e, "Failed to delete job parameters");
        }
    }
}

/// Drives one job at a time per call; share it freely between tasks.
#[derive(Clone)]
pub struct JobRunner {
    rpc: RpcClient,
    store: Arc<dyn JobStore>,
    tick: Duration,
}

impl JobRunner {
    pub fn new(rpc: RpcClient, store: Arc<dyn JobStore>) -> Self {
        Self {
            rpc,
            store,
            tick: Duration::from_secs(1),
        }
    }

    /// Wall-clock length of one countdown tick.
    pub fn with_tick_interval(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Run a job to its end, emitting events to `emitter`.
    ///
    /// The job's stored parameters are gone by the time the terminal event
    /// is emitted, and on every other exit path.
    pub async fn run(&self, job_id: &str, params: JobParameters, emitter: EventEmitter) -> JobOutcome {
        let cleanup = ParameterCleanup {
            store: self.store.as_ref(),
            job_id,
        };

        metrics::record_job_started(params.mode.as_str());
        tracing::info!(
            job_id = %job_id,
            mode = %params.mode,
            instance_id = %params.instance_id,
            access_key = %params.credentials.masked_key_id(),
            loop_count = params.loop_count,
            delay_secs = params.delay_secs,
            "Job started"
        );

        let result = self.execute(job_id, &params, &emitter).await;
        drop(cleanup);

        let outcome = match result {
            Ok(()) => {
                emitter.emit(RunEvent::Done(Done { ok: true })).await;
                JobOutcome::Finished
            }
            Err(Interrupt::Fatal(message)) => {
                tracing::warn!(job_id = %job_id, error = %message, "Job aborted");
                emitter.emit(RunEvent::Fatal(Fatal { message })).await;
                JobOutcome::Aborted
            }
            Err(Interrupt::Disconnected) => JobOutcome::Abandoned,
        };

        metrics::record_job_finished(outcome.as_str());
        tracing::info!(job_id = %job_id, outcome = outcome.as_str(), "Job ended");
        outcome
    }

    async fn execute(
        &self,
        job_id: &str,
        params: &JobParameters,
        emitter: &EventEmitter,
    ) -> Result<(), Interrupt> {
        emitter
            .emit(RunEvent::Hello(Hello {
                job_id: job_id.to_string(),
                mode: params.mode,
            }))
            .await;

        emitter
            .log(format!("{} (querying instance)...", ACTION_QUERY_INSTANCES), LogStyle::Bold)
            .await;
        let query = query_params(params);
        let mut snapshot = self.query(params, &query).await?;

        match &snapshot {
            Some(snap) => {
                let days = days_left(snap.end_time.as_deref());
                let mut summary = format!("Region: {}", snap.region.as_deref().unwrap_or("-"));
                if let Some(days) = days {
                    summary.push_str(&format!(" | Days left: {}", days));
                }
                emitter.log(summary, LogStyle::Normal).await;
                emitter
                    .log(format!("Expires: {}", display_or_dash(snap)), LogStyle::Normal)
                    .await;
                emitter.emit(RunEvent::Status(status_report(snap))).await;
            }
            None => {
                emitter
                    .log("Instance not found, check the region or instance id", LogStyle::Error)
                    .await;
                emitter.emit(RunEvent::Status(StatusReport::not_found())).await;
            }
        }

        if params.mode == Mode::Check {
            emitter.log("Query complete", LogStyle::Success).await;
            return Ok(());
        }

        for attempt in 1..=params.loop_count {
            ensure_observer(emitter)?;
            emitter.log("————————————", LogStyle::Mute).await;
            emitter
                .log(
                    format!(
                        "Renewal attempt {}/{} ({} month(s))...",
                        attempt, params.loop_count, params.renew_period
                    ),
                    LogStyle::Bold,
                )
                .await;

            let renew = renew_params(params, snapshot.as_ref());
            match self
                .rpc
                .call(ACTION_RENEW_INSTANCE, &renew, &params.credentials)
                .await
            {
                Ok(envelope) => match envelope.order_id() {
                    Some(order_id) => {
                        tracing::info!(job_id = %job_id, attempt, order_id = %order_id, "Renewal order placed");
                        emitter
                            .log(format!("Success! Order id: {}", order_id), LogStyle::Success)
                            .await;
                        emitter.emit(RunEvent::Order(Order { order_id })).await;

                        if let Some(refreshed) = self.query(params, &query).await? {
                            emitter
                                .log(
                                    format!("Expiry after renewal: {}", display_or_dash(&refreshed)),
                                    LogStyle::Bold,
                                )
                                .await;
                            emitter.emit(RunEvent::Status(status_report(&refreshed))).await;
                            snapshot = Some(refreshed);
                        }
                    }
                    None => {
                        tracing::warn!(job_id = %job_id, attempt, "Renewal returned no order id");
                        emitter.log("Renewal failed", LogStyle::Error).await;
                        emitter
                            .log(format!("API response: {}", envelope), LogStyle::Normal)
                            .await;
                    }
                },
                Err(e) => {
                    tracing::warn!(job_id = %job_id, attempt, error = %e, "Renewal call failed");
                    emitter
                        .log(format!("Renewal failed: {}", e), LogStyle::Error)
                        .await;
                }
            }

            if attempt < params.loop_count {
                self.wait(params.delay_secs, emitter).await?;
            }
        }

        emitter.log("Task finished", LogStyle::Success).await;
        Ok(())
    }

    async fn query(
        &self,
        params: &JobParameters,
        query: &BTreeMap<String, String>,
    ) -> Result<Option<InstanceSnapshot>, Interrupt> {
        let envelope = self
            .rpc
            .call(ACTION_QUERY_INSTANCES, query, &params.credentials)
            .await?;
        Ok(envelope.instance_list().first().map(InstanceSnapshot::from_value))
    }

    /// Count down `secs`, one tick event per second, polling the observer.
    async fn wait(&self, secs: u32, emitter: &EventEmitter) -> Result<(), Interrupt> {
        emitter
            .log(format!("Waiting {} seconds...", secs), LogStyle::Mute)
            .await;
        for left in (1..=secs).rev() {
            ensure_observer(emitter)?;
            emitter.emit(RunEvent::Tick(Tick { left })).await;
            tokio::time::sleep(self.tick).await;
        }
        Ok(())
    }
}

fn ensure_observer(emitter: &EventEmitter) -> Result<(), Interrupt> {
    if emitter.is_observer_connected() {
        Ok(())
    } else {
        tracing::info!("Observer disconnected, abandoning job");
        Err(Interrupt::Disconnected)
    }
}

fn display_or_dash(snap: &InstanceSnapshot) -> String {
    to_display_time(snap.end_time.as_deref()).unwrap_or_else(|| "-".to_string())
}

fn status_report(snap: &InstanceSnapshot) -> StatusReport {
    StatusReport {
        found: true,
        end_utc: snap.end_time.clone(),
        end_shanghai: to_display_time(snap.end_time.as_deref()),
        days_left: days_left(snap.end_time.as_deref()),
        status: snap.status.clone(),
        renew_status: snap.renew_status.clone(),
    }
}

/// Business parameters of the instance query.
pub(crate) fn query_params(params: &JobParameters) -> BTreeMap<String, String> {
    let mut query = BTreeMap::new();
    query.insert("PageNum".to_string(), "1".to_string());
    query.insert("PageSize".to_string(), QUERY_PAGE_SIZE.to_string());
    query.insert("InstanceIDs".to_string(), params.instance_id.clone());
    if !params.advanced.region.is_empty() {
        query.insert("Region".to_string(), params.advanced.region.clone());
    }
    if params.advanced.product_code != DEFAULT_PRODUCT_CODE {
        query.insert("ProductCode".to_string(), params.advanced.product_code.clone());
    }
    query
}

/// Business parameters of one renewal attempt.
///
/// Region and subscription type prefer the job's overrides, then the latest
/// snapshot; subscription type finally defaults to `Subscription`.
pub(crate) fn renew_params(
    params: &JobParameters,
    snapshot: Option<&InstanceSnapshot>,
) -> BTreeMap<String, String> {
    let mut renew = BTreeMap::new();
    renew.insert("InstanceId".to_string(), params.instance_id.clone());
    renew.insert("ProductCode".to_string(), params.advanced.product_code.clone());
    renew.insert("ProductType".to_string(), params.advanced.product_type.clone());
    renew.insert("RenewPeriod".to_string(), params.renew_period.to_string());
    renew.insert(
        "ClientToken".to_string(),
        format!("esa_{}", Uuid::new_v4().simple()),
    );

    let region = Some(params.advanced.region.as_str())
        .filter(|r| !r.is_empty())
        .or_else(|| snapshot.and_then(|s| s.region.as_deref()))
        .unwrap_or_default();
    if !region.is_empty() {
        renew.insert("Region".to_string(), region.to_string());
    }

    let subscription = Some(params.advanced.subscription_type.as_str())
        .filter(|s| !s.is_empty())
        .or_else(|| snapshot.and_then(|s| s.subscription_type.as_deref()))
        .unwrap_or(DEFAULT_SUBSCRIPTION_TYPE);
    renew.insert("SubscriptionType".to_string(), subscription.to_string());

    renew
}
