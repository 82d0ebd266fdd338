//! Request signing for the vendor RPC protocol (signature version 1.0).
//!
//! ```text
//! business params + protocol fields
//!     → sort by key
//!     → percent-encode keys and values, join "k=v" with '&'
//!     → "POST&%2F&" + percent-encode(canonical query)
//!     → base64(HMAC-SHA1(secret + "&", string-to-sign))
//! ```

use std::collections::BTreeMap;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;

use crate::rpc::types::{Credentials, RpcCall};

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const SIGNATURE_VERSION: &str = "1.0";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Percent-encode one key or value the way the vendor canonicalises it.
///
/// RFC 3986 unreserved characters pass through; space becomes `%20`,
/// `*` becomes `%2A` and `~` stays literal.
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value)
        .replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// Sorted, encoded `k=v&k=v` form of a parameter set.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// String the HMAC is computed over.
pub fn string_to_sign(method: &str, canonical: &str) -> String {
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode("/"),
        percent_encode(canonical)
    )
}

/// Signature over an already complete parameter set.
pub fn sign(params: &BTreeMap<String, String>, secret: &str, method: &str) -> String {
    let payload = string_to_sign(method, &canonical_query(params));
    let key = format!("{}&", secret);

    // HMAC accepts keys of any length.
    let mut mac = <HmacSha1 as Mac>::new_from_slice(key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Single-use nonce: 8 random bytes, hex encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Builds signed calls for one set of credentials.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    api_version: String,
    method: &'static str,
}

impl RequestSigner {
    pub fn new(credentials: Credentials, api_version: impl Into<String>) -> Self {
        Self {
            credentials,
            api_version: api_version.into(),
            method: "POST",
        }
    }

    /// Prepare a call with a fresh nonce and the current time.
    pub fn prepare(&self, action: &str, business: &BTreeMap<String, String>) -> RpcCall {
        self.prepare_with(action, business, generate_nonce(), Utc::now())
    }

    /// Prepare a call with caller-supplied nonce and timestamp.
    pub fn prepare_with(
        &self,
        action: &str,
        business: &BTreeMap<String, String>,
        nonce: String,
        at: DateTime<Utc>,
    ) -> RpcCall {
        let timestamp = at.format(TIMESTAMP_FORMAT).to_string();

        let mut params = BTreeMap::new();
        params.insert("Format".to_string(), "JSON".to_string());
        params.insert("Version".to_string(), self.api_version.clone());
        params.insert(
            "AccessKeyId".to_string(),
            self.credentials.access_key_id.clone(),
        );
        params.insert("SignatureMethod".to_string(), SIGNATURE_METHOD.to_string());
        params.insert("SignatureVersion".to_string(), SIGNATURE_VERSION.to_string());
        params.insert("SignatureNonce".to_string(), nonce.clone());
        params.insert("Timestamp".to_string(), timestamp.clone());
        params.insert("Action".to_string(), action.to_string());
        // Business fields win over protocol fields on collision.
        params.extend(business.iter().map(|(k, v)| (k.clone(), v.clone())));

        let signature = sign(&params, &self.credentials.access_key_secret, self.method);

        RpcCall {
            action: action.to_string(),
            nonce,
            timestamp,
            params,
            signature,
        }
    }
}
