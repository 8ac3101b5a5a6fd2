//! Expiry checks and decoding of cached session entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::Session;

/// Sentinel the auth client writes when there is no session.
pub const EMPTY_SESSION: &str = "{}";

/// Check if an expiry is missing or not in the future.
pub fn is_expired_at(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        None => true,
        Some(ts) => ts <= now,
    }
}

/// Interpret a JSON timestamp: RFC 3339 text or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        _ => None,
    }
}

/// Serde adapter: unparsable timestamps become `None` instead of failing
/// the whole session.
pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp))
}

/// Decode a raw durable-store entry into a usable session.
///
/// Returns `None` for a missing entry, the empty sentinel, corrupt JSON, or
/// a session whose expiry is missing, unparsable or not after `now`.
pub fn decode_cached(raw: Option<&str>, now: DateTime<Utc>) -> Option<Session> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty() && *s != EMPTY_SESSION)?;

    let session: Session = match serde_json::from_str(raw) {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Discarding unreadable cached session");
            return None;
        }
    };

    if is_expired_at(session.expires_at(), now) {
        debug!(
            user_id = %session.user.id,
            expires_at = ?session.expires_at(),
            "Cached session expired or has no expiry"
        );
        return None;
    }

    Some(session)
}
