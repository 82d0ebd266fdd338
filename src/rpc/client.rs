//! Vendor RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Sign each call with the job's credentials
//! - POST the signed parameter set as a form body
//! - Enforce connect and total deadlines
//! - Map the JSON envelope to success or a typed failure
//!
//! The client never retries; retry policy belongs to the job runner.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use crate::config::VendorConfig;
use crate::observability::metrics;
use crate::rpc::signer::RequestSigner;
use crate::rpc::types::{Credentials, ResponseEnvelope, RpcCall, RpcError, RpcResult};

const BODY_PREVIEW_CHARS: usize = 300;

/// HTTP client for the vendor RPC endpoint.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: url::Url,
    api_version: String,
}

impl RpcClient {
    /// Create a new client from vendor configuration.
    pub fn new(config: &VendorConfig) -> RpcResult<Self> {
        let endpoint: url::Url = config.endpoint.parse().map_err(|e| {
            RpcError::Transport(format!("Invalid endpoint '{}': {}", config.endpoint, e))
        })?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            api_version: config.api_version.clone(),
        })
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    /// Sign and send one call.
    pub async fn call(
        &self,
        action: &str,
        business: &BTreeMap<String, String>,
        credentials: &Credentials,
    ) -> RpcResult<ResponseEnvelope> {
        let signer = RequestSigner::new(credentials.clone(), self.api_version.clone());
        let call = signer.prepare(action, business);
        self.send(&call).await
    }

    /// Send an already signed call.
    pub async fn send(&self, call: &RpcCall) -> RpcResult<ResponseEnvelope> {
        let start = Instant::now();
        let result = self.send_inner(call).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_rpc_call(&call.action, outcome, start);

        match &result {
            Ok(_) => tracing::debug!(
                action = %call.action,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "RPC call succeeded"
            ),
            Err(e) => tracing::warn!(action = %call.action, error = %e, "RPC call failed"),
        }

        result
    }

    async fn send_inner(&self, call: &RpcCall) -> RpcResult<ResponseEnvelope> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(call.form_fields())
            .finish();

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        parse_envelope(status.as_u16(), &text)
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Interpret a response body.
pub(crate) fn parse_envelope(status: u16, text: &str) -> RpcResult<ResponseEnvelope> {
    let body: Value = match serde_json::from_str(text) {
        Ok(v @ Value::Object(_)) => v,
        _ => {
            return Err(RpcError::Protocol {
                status,
                body: text.chars().take(BODY_PREVIEW_CHARS).collect(),
            })
        }
    };

    let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);

    let reported_failure = body.get("Success").and_then(Value::as_bool) == Some(false);
    let http_failure = !(200..300).contains(&status) && body.get("Code").is_some();

    if reported_failure || http_failure {
        return Err(RpcError::Remote {
            code: field("Code").unwrap_or_else(|| "Error".to_string()),
            message: field("Message").unwrap_or_default(),
        });
    }

    Ok(ResponseEnvelope::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vendor(endpoint: &str) -> VendorConfig {
        VendorConfig {
            endpoint: endpoint.to_string(),
            ..VendorConfig::default()
        }
    }

    #[test]
    fn test_parse_success_envelope() {
        let env = parse_envelope(200, r#"{"Success":true,"Data":{"OrderId":"1"}}"#).unwrap();
        assert_eq!(env.order_id().as_deref(), Some("1"));
    }

    #[test]
    fn test_missing_success_flag_is_success() {
        assert!(parse_envelope(200, r#"{"RequestId":"r"}"#).is_ok());
    }

    #[test]
    fn test_parse_reported_failure() {
        let err = parse_envelope(
            200,
            r#"{"Success":false,"Code":"InstanceNotFound","Message":"no such instance"}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "InstanceNotFound: no such instance");
    }

    #[test]
    fn test_parse_http_error_with_code() {
        let err = parse_envelope(
            404,
            r#"{"Code":"InvalidAccessKeyId.NotFound","Message":"Specified access key is not found."}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RpcError::Remote { ref code, .. } if code == "InvalidAccessKeyId.NotFound"));
    }

    #[test]
    fn test_parse_non_json_body_is_truncated() {
        let html = format!("<html>{}</html>", "x".repeat(1000));
        match parse_envelope(502, &html).unwrap_err() {
            RpcError::Protocol { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.chars().count(), 300);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(parse_envelope(200, "[1,2]"), Err(RpcError::Protocol { .. })));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(RpcClient::new(&vendor("not a url")).is_err());
    }

    #[tokio::test]
    async fn test_call_posts_signed_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("Action=RenewInstance"))
            .and(body_string_contains("AccessKeyId=ak-id"))
            .and(body_string_contains("Signature="))
            .and(body_string_contains("SignatureMethod=HMAC-SHA1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Success": true,
                "Data": {"OrderId": "20240501"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RpcClient::new(&vendor(&server.uri())).unwrap();
        let mut biz = BTreeMap::new();
        biz.insert("InstanceId".to_string(), "esa-1".to_string());

        let env = client
            .call("RenewInstance", &biz, &Credentials::new("ak-id", "secret"))
            .await
            .unwrap();
        assert_eq!(env.order_id().as_deref(), Some("20240501"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) is closed on test hosts.
        let client = RpcClient::new(&vendor("http://127.0.0.1:9")).unwrap();
        let err = client
            .call("QueryAvailableInstances", &BTreeMap::new(), &Credentials::new("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
