//! Client for the job service: submit a job, then follow its event stream.

use std::ops::ControlFlow;

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::events::{RunEvent, SseDecoder};
use crate::jobs::JobSubmission;

/// Errors returned by [`JobClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service refused the request.
    #[error("service returned {status}: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("undecodable event '{event}': {source}")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    ok: bool,
    job_id: Option<String>,
    error: Option<String>,
}

/// HTTP client for one renewal service.
#[derive(Debug, Clone)]
pub struct JobClient {
    client: Client,
    base_url: String,
}

impl JobClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Submit a job and return its id.
    pub async fn submit(&self, submission: &JobSubmission) -> Result<String, ClientError> {
        let resp = self
            .client
            .post(format!("{}/api/jobs", self.base_url))
            .json(submission)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        let parsed: Option<SubmitResponse> = serde_json::from_str(&text).ok();

        match parsed {
            Some(SubmitResponse { ok: true, job_id: Some(id), .. }) if status.is_success() => Ok(id),
            Some(SubmitResponse { error: Some(message), .. }) => {
                Err(ClientError::Rejected { status, message })
            }
            _ => Err(ClientError::Rejected {
                status,
                message: text,
            }),
        }
    }

    /// Attach to a job's stream and hand each event to `on_event`.
    ///
    /// Returns the terminal event, or `None` if the stream ended without one
    /// or `on_event` broke off early. Breaking off drops the connection,
    /// which the service treats as the observer leaving.
    pub async fn follow<F>(&self, job_id: &str, mut on_event: F) -> Result<Option<RunEvent>, ClientError>
    where
        F: FnMut(&RunEvent) -> ControlFlow<()>,
    {
        let resp = self
            .client
            .get(format!("{}/api/jobs/{}/stream", self.base_url, job_id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Rejected { status, message });
        }

        let mut decoder = SseDecoder::new();
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            for frame in decoder.push(&chunk?) {
                let event = RunEvent::from_wire(&frame.event, &frame.data).map_err(|source| {
                    ClientError::Decode {
                        event: frame.event.clone(),
                        source,
                    }
                })?;

                if on_event(&event).is_break() {
                    return Ok(None);
                }
                if event.is_terminal() {
                    return Ok(Some(event));
                }
            }
        }
        Ok(None)
    }
}
