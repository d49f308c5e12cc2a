use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Header carrying the hex HMAC of the raw callback body.
pub const CALLBACK_SIGNATURE_HEADER: &str = "X-Callback-Signature";
/// Header naming the callback event.
pub const CALLBACK_EVENT_HEADER: &str = "X-Callback-Event";
/// The only event this bridge handles.
pub const PAYMENT_STATUS_EVENT: &str = "payment_status";

/// The fields of a `payment_status` callback this bridge acts on.
///
/// Everything else the gateway sends (amounts, fees, notes) is ignored, and a
/// field of an unexpected type reads as absent instead of failing the parse.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TripayCallbackPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub merchant_ref: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_unix_seconds")]
    pub paid_at: Option<i64>,
}

impl TripayCallbackPayload {
    /// `paid_at` is unix seconds on the wire.
    pub fn paid_at_utc(&self) -> Option<DateTime<Utc>> {
        self.paid_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// number, numeric string or null
fn lenient_unix_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
