//! Job submission and event stream handlers.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::stream::{self, StreamExt};
use serde_json::json;

use crate::events::{EventEmitter, RunEvent};
use crate::http::server::AppState;
use crate::jobs::{generate_job_id, JobSubmission};

/// `POST /api/jobs`
pub async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<JobSubmission>, JsonRejection>,
) -> Response {
    let submission = match body {
        Ok(Json(s)) => s,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected malformed submission");
            return bad_request(format!("invalid request body: {}", rejection.body_text()));
        }
    };

    let params = match submission.into_parameters() {
        Ok(p) => p,
        Err(e) => return bad_request(e.to_string()),
    };

    let job_id = generate_job_id();
    if let Err(e) = state.store.put_parameters(&job_id, &params) {
        tracing::error!(job_id = %job_id, error = %e, "Failed to store job parameters");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"ok": false, "error": "failed to store job"})),
        )
            .into_response();
    }

    tracing::info!(
        job_id = %job_id,
        mode = %params.mode,
        instance_id = %params.instance_id,
        loop_count = params.loop_count,
        delay_secs = params.delay_secs,
        "Job submitted"
    );

    Json(json!({"ok": true, "jobId": job_id})).into_response()
}

fn bad_request(error: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"ok": false, "error": error})),
    )
        .into_response()
}

/// `GET /api/jobs/{job_id}/stream`
///
/// Attaching starts the job; its events stream back until `done` or `fatal`.
pub async fn stream_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    // Claim before reading. The runner releases the claim only after the
    // parameters are deleted.
    if !state.attached.insert(job_id.clone()) {
        tracing::warn!(job_id = %job_id, "Second observer rejected");
        return (StatusCode::CONFLICT, "job already has an observer").into_response();
    }

    let params = match state.store.get_parameters(&job_id) {
        Ok(Some(p)) => p,
        Ok(None) => {
            state.attached.remove(&job_id);
            return (StatusCode::NOT_FOUND, "job not found").into_response();
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Unreadable job parameters, discarding");
            if let Err(e) = state.store.delete(&job_id) {
                tracing::error!(job_id = %job_id, error = %e, "Failed to delete job parameters");
            }
            state.attached.remove(&job_id);
            return (StatusCode::INTERNAL_SERVER_ERROR, "job unreadable").into_response();
        }
    };

    let (emitter, rx) = EventEmitter::channel(state.stream.channel_capacity);
    let runner = state.runner.clone();
    let attached = state.attached.clone();
    let id = job_id.clone();
    tokio::spawn(async move {
        runner.run(&id, params, emitter).await;
        attached.remove(&id);
    });

    tracing::info!(job_id = %job_id, "Observer attached");

    let connected = stream::once(async { Ok::<_, Infallible>(Event::default().comment("connected")) });
    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|event| (Ok::<_, Infallible>(to_sse(&event)), rx))
    });

    let sse = Sse::new(connected.chain(events)).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(state.stream.keepalive_secs)),
    );

    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        sse,
    )
        .into_response()
}

fn to_sse(event: &RunEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.payload().to_string())
}

/// `GET /healthz`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
