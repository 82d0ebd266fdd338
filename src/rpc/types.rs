//! Vendor RPC types and error definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Action that lists instances visible to the credentials.
pub const ACTION_QUERY_INSTANCES: &str = "QueryAvailableInstances";

/// Action that places a renewal order.
pub const ACTION_RENEW_INSTANCE: &str = "RenewInstance";

/// Access key pair supplied with each job.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    /// Access key id with everything but the last four characters hidden.
    pub fn masked_key_id(&self) -> String {
        let chars: Vec<char> = self.access_key_id.chars().collect();
        let visible = chars.len().min(4);
        let tail: String = chars[chars.len() - visible..].iter().collect();
        format!("****{}", tail)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.masked_key_id())
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

/// One fully prepared RPC call.
///
/// Nonce and timestamp are fixed when the call is built so the values that
/// were signed are exactly the values that get transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcCall {
    pub action: String,
    pub nonce: String,
    pub timestamp: String,
    /// Protocol and business fields, sorted by key.
    pub params: BTreeMap<String, String>,
    pub signature: String,
}

impl RpcCall {
    /// Parameter set as transmitted: every signed field plus `Signature`.
    pub fn form_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(std::iter::once(("Signature", self.signature.as_str())))
    }
}

/// Errors that can occur while talking to the vendor API.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The endpoint could not be reached or the call timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with something that is not a JSON envelope.
    #[error("HTTP {status} non-JSON: {body}")]
    Protocol { status: u16, body: String },

    /// The vendor reported the call as failed.
    #[error("{code}: {message}")]
    Remote { code: String, message: String },
}

impl RpcError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::Transport(_) => "transport",
            RpcError::Protocol { .. } => "protocol",
            RpcError::Remote { .. } => "remote",
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RpcError::Transport(format!("request timed out: {}", e))
        } else {
            RpcError::Transport(e.to_string())
        }
    }
}

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Parsed JSON body of a successful call.
///
/// The vendor does not guarantee a schema, so the document stays loosely
/// typed and accessors decode the known fields defensively.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope(Value);

impl ResponseEnvelope {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    pub fn body(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    /// `Data` object, if present.
    pub fn data(&self) -> Option<&Value> {
        self.0.get("Data")
    }

    /// Entries of `Data.InstanceList`; empty when absent or not an array.
    pub fn instance_list(&self) -> &[Value] {
        self.data()
            .and_then(|d| d.get("InstanceList"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `Data.OrderId` as text; numbers are accepted, empty strings are not.
    pub fn order_id(&self) -> Option<String> {
        match self.data()?.get("OrderId")? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::new("LTAI5tAbCdEfGh", "very-secret");
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("very-secret"));
        assert!(!dbg.contains("LTAI5tAbCd"));
        assert!(dbg.contains("****EfGh"));
    }

    #[test]
    fn test_masked_short_key() {
        assert_eq!(Credentials::new("ab", "s").masked_key_id(), "****ab");
    }

    #[test]
    fn test_order_id_accepts_number_and_string() {
        let env = ResponseEnvelope::new(json!({"Data": {"OrderId": 2233445566u64}}));
        assert_eq!(env.order_id().as_deref(), Some("2233445566"));

        let env = ResponseEnvelope::new(json!({"Data": {"OrderId": "A1"}}));
        assert_eq!(env.order_id().as_deref(), Some("A1"));

        let env = ResponseEnvelope::new(json!({"Data": {"OrderId": ""}}));
        assert_eq!(env.order_id(), None);

        let env = ResponseEnvelope::new(json!({"Success": true}));
        assert_eq!(env.order_id(), None);
    }

    #[test]
    fn test_instance_list_tolerates_missing_data() {
        assert!(ResponseEnvelope::new(json!({})).instance_list().is_empty());
        assert!(ResponseEnvelope::new(json!({"Data": {"InstanceList": "x"}}))
            .instance_list()
            .is_empty());
        let env = ResponseEnvelope::new(json!({"Data": {"InstanceList": [{"Region": "cn"}]}}));
        assert_eq!(env.instance_list().len(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = RpcError::Remote {
            code: "InvalidAccessKeyId.NotFound".into(),
            message: "Specified access key is not found.".into(),
        };
        assert_eq!(
            err.to_string(),
            "InvalidAccessKeyId.NotFound: Specified access key is not found."
        );
        assert_eq!(err.kind(), "remote");
    }
}
