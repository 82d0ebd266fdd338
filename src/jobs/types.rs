//! Job data model and submission validation.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::rpc::Credentials;

pub const DEFAULT_PRODUCT_CODE: &str = "dcdn";
pub const DEFAULT_PRODUCT_TYPE: &str = "dcdn_dcdnserviceplan_public_cn";
pub const DEFAULT_SUBSCRIPTION_TYPE: &str = "Subscription";

pub const MIN_LOOP: u32 = 1;
pub const MAX_LOOP: u32 = 10;
pub const MIN_DELAY_SECS: u32 = 5;
pub const MAX_DELAY_SECS: u32 = 600;

const DEFAULT_LOOP: i64 = 1;
const DEFAULT_DELAY_SECS: i64 = 60;
const DEFAULT_RENEW_PERIOD: i64 = 1;

/// What a job does after the initial query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Report instance status only.
    Check,
    /// Place one or more renewal orders.
    #[default]
    Renew,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Check => "check",
            Mode::Renew => "renew",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product and placement overrides for advanced users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvancedOverrides {
    pub product_code: String,
    pub product_type: String,
    pub region: String,
    pub subscription_type: String,
}

impl Default for AdvancedOverrides {
    fn default() -> Self {
        Self {
            product_code: DEFAULT_PRODUCT_CODE.to_string(),
            product_type: DEFAULT_PRODUCT_TYPE.to_string(),
            region: String::new(),
            subscription_type: String::new(),
        }
    }
}

/// Errors that reject a submission before any job exists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// Credentials or instance id missing.
    #[error("AK/SK/InstanceId must not be empty")]
    MissingRequired,

    #[error("unknown mode '{0}', expected 'check' or 'renew'")]
    UnknownMode(String),
}

/// Raw submission as posted by a client.
///
/// Numeric fields are signed and unbounded here; they are clamped when the
/// submission is turned into [`JobParameters`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobSubmission {
    pub mode: Option<String>,
    pub ak: String,
    pub sk: String,
    pub instance_id: String,
    pub renew_period: Option<i64>,
    #[serde(rename = "loop")]
    pub loop_count: Option<i64>,
    pub rate_limit: Option<i64>,
    pub advanced: Option<Value>,
}

/// Validated, immutable parameters of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobParameters {
    pub mode: Mode,
    pub credentials: Credentials,
    pub instance_id: String,
    /// Renewal length in months.
    pub renew_period: u32,
    /// Number of renewal attempts, within [`MIN_LOOP`]..=[`MAX_LOOP`].
    pub loop_count: u32,
    /// Pause between attempts, within [`MIN_DELAY_SECS`]..=[`MAX_DELAY_SECS`].
    pub delay_secs: u32,
    pub advanced: AdvancedOverrides,
    /// Submission time, unix seconds.
    pub created_at: u64,
}

pub fn clamp_loop(value: i64) -> u32 {
    value.clamp(MIN_LOOP as i64, MAX_LOOP as i64) as u32
}

pub fn clamp_delay(value: i64) -> u32 {
    value.clamp(MIN_DELAY_SECS as i64, MAX_DELAY_SECS as i64) as u32
}

fn advanced_field(advanced: Option<&Value>, key: &str) -> String {
    advanced
        .and_then(|a| a.get(key))
        .map(|v| match v {
            Value::String(s) => s.trim().to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

impl JobSubmission {
    /// Validate and normalise a submission.
    pub fn into_parameters(self) -> Result<JobParameters, SubmissionError> {
        let mode = match self.mode.as_deref().map(str::trim) {
            None | Some("") | Some("renew") => Mode::Renew,
            Some("check") => Mode::Check,
            Some(other) => return Err(SubmissionError::UnknownMode(other.to_string())),
        };

        let ak = self.ak.trim();
        let sk = self.sk.trim();
        let instance_id = self.instance_id.trim();
        if ak.is_empty() || sk.is_empty() || instance_id.is_empty() {
            return Err(SubmissionError::MissingRequired);
        }

        let advanced = self.advanced.as_ref().filter(|v| v.is_object());
        let mut overrides = AdvancedOverrides {
            product_code: advanced_field(advanced, "productCode"),
            product_type: advanced_field(advanced, "productType"),
            region: advanced_field(advanced, "region"),
            subscription_type: advanced_field(advanced, "subscriptionType"),
        };
        if overrides.product_code.is_empty() {
            overrides.product_code = DEFAULT_PRODUCT_CODE.to_string();
        }
        if overrides.product_type.is_empty() {
            overrides.product_type = DEFAULT_PRODUCT_TYPE.to_string();
        }

        let renew_period = self
            .renew_period
            .unwrap_or(DEFAULT_RENEW_PERIOD)
            .clamp(1, u32::MAX as i64) as u32;

        Ok(JobParameters {
            mode,
            credentials: Credentials::new(ak, sk),
            instance_id: instance_id.to_string(),
            renew_period,
            loop_count: clamp_loop(self.loop_count.unwrap_or(DEFAULT_LOOP)),
            delay_secs: clamp_delay(self.rate_limit.unwrap_or(DEFAULT_DELAY_SECS)),
            advanced: overrides,
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        })
    }
}

/// Opaque job identifier: 16 hex characters.
pub fn generate_job_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Instance state as reported by one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceSnapshot {
    pub region: Option<String>,
    /// End of the paid term, UTC, as reported by the vendor.
    pub end_time: Option<String>,
    pub status: Option<String>,
    pub renew_status: Option<String>,
    pub subscription_type: Option<String>,
}

impl InstanceSnapshot {
    /// Decode one `InstanceList` entry, ignoring fields of unexpected type.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            region: text("Region"),
            end_time: text("EndTime"),
            status: text("Status"),
            renew_status: text("RenewStatus"),
            subscription_type: text("SubscriptionType"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission() -> JobSubmission {
        JobSubmission {
            ak: " ak ".into(),
            sk: "sk".into(),
            instance_id: "esa-site-1".into(),
            ..JobSubmission::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let p = submission().into_parameters().unwrap();
        assert_eq!(p.mode, Mode::Renew);
        assert_eq!(p.credentials.access_key_id, "ak");
        assert_eq!(p.renew_period, 1);
        assert_eq!(p.loop_count, 1);
        assert_eq!(p.delay_secs, 60);
        assert_eq!(p.advanced, AdvancedOverrides::default());
        assert!(p.created_at > 0);
    }

    #[test]
    fn test_loop_and_delay_are_clamped() {
        let mut s = submission();
        s.loop_count = Some(99);
        s.rate_limit = Some(1);
        let p = s.into_parameters().unwrap();
        assert_eq!(p.loop_count, 10);
        assert_eq!(p.delay_secs, 5);

        let mut s = submission();
        s.loop_count = Some(-3);
        s.rate_limit = Some(100_000);
        let p = s.into_parameters().unwrap();
        assert_eq!(p.loop_count, 1);
        assert_eq!(p.delay_secs, 600);
    }

    #[test]
    fn test_missing_fields_rejected() {
        for s in [
            JobSubmission { ak: String::new(), ..submission() },
            JobSubmission { sk: "  ".into(), ..submission() },
            JobSubmission { instance_id: String::new(), ..submission() },
        ] {
            assert_eq!(s.into_parameters(), Err(SubmissionError::MissingRequired));
        }
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let s = JobSubmission { mode: Some("delete".into()), ..submission() };
        assert_eq!(
            s.into_parameters(),
            Err(SubmissionError::UnknownMode("delete".into()))
        );
    }

    #[test]
    fn test_advanced_overrides_trimmed_and_defaulted() {
        let s = JobSubmission {
            mode: Some("check".into()),
            advanced: Some(json!({
                "productCode": "  ",
                "productType": "esa_plan",
                "region": " cn-hangzhou ",
                "subscriptionType": null
            })),
            ..submission()
        };
        let p = s.into_parameters().unwrap();
        assert_eq!(p.mode, Mode::Check);
        assert_eq!(p.advanced.product_code, "dcdn");
        assert_eq!(p.advanced.product_type, "esa_plan");
        assert_eq!(p.advanced.region, "cn-hangzhou");
        assert_eq!(p.advanced.subscription_type, "");
    }

    #[test]
    fn test_submission_json_shape() {
        let s: JobSubmission = serde_json::from_value(json!({
            "mode": "renew",
            "ak": "a",
            "sk": "b",
            "instanceId": "i",
            "renewPeriod": 3,
            "loop": 2,
            "rateLimit": 30
        }))
        .unwrap();
        let p = s.into_parameters().unwrap();
        assert_eq!((p.renew_period, p.loop_count, p.delay_secs), (3, 2, 30));
    }

    #[test]
    fn test_snapshot_decodes_defensively() {
        let snap = InstanceSnapshot::from_value(&json!({
            "Region": "cn",
            "EndTime": "2025-01-01T16:00:00Z",
            "Status": 5,
            "RenewStatus": "",
        }));
        assert_eq!(snap.region.as_deref(), Some("cn"));
        assert_eq!(snap.status, None);
        assert_eq!(snap.renew_status, None);
        assert_eq!(snap.subscription_type, None);
    }

    #[test]
    fn test_job_ids_are_hex() {
        let id = generate_job_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
