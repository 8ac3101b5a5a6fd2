//! Persistent cookie jar for the auth server's session cookies.
//!
//! Stored as JSON in the durable store:
//!
//! ```json
//! {"tickoff.session_token": {"value": "abc", "expires": "2030-01-01T00:00:00Z"}}
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One persisted cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub value: String,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|ts| ts <= now)
    }
}

/// Longest lifetime a cookie is kept for, whatever the server asks.
const MAX_COOKIE_AGE_DAYS: i64 = 400;

/// A `Set-Cookie` header reduced to what the jar needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub expires: Option<DateTime<Utc>>,
}

impl SetCookie {
    /// Whether this header deletes the cookie rather than setting it.
    pub fn is_removal(&self, now: DateTime<Utc>) -> bool {
        self.value.is_empty() || self.expires.is_some_and(|ts| ts <= now)
    }
}

/// Parse a `Set-Cookie` header value.
///
/// `Max-Age` takes precedence over `Expires`; unknown attributes are ignored.
/// Lifetimes are capped at 400 days.
pub fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<SetCookie> {
    let mut parts = header.split(';').map(str::trim);

    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let mut max_age = None;
    let mut expires = None;
    for attr in parts {
        let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
        let val = val.trim();
        if key.eq_ignore_ascii_case("max-age") {
            max_age = val.parse::<i64>().ok();
        } else if key.eq_ignore_ascii_case("expires") {
            expires = DateTime::parse_from_rfc2822(val)
                .ok()
                .map(|ts| ts.with_timezone(&Utc));
        }
    }

    let latest = now + Duration::days(MAX_COOKIE_AGE_DAYS);
    let expires = match max_age {
        Some(secs) if secs <= 0 => Some(now),
        Some(secs) => Some(
            Duration::try_seconds(secs)
                .and_then(|age| now.checked_add_signed(age))
                .map_or(latest, |ts| ts.min(latest)),
        ),
        None => expires.map(|ts| ts.min(latest)),
    };

    Some(SetCookie {
        name: name.to_string(),
        value: value.to_string(),
        expires,
    })
}

/// Check a cookie name against the server's cookie prefix, ignoring the
/// `__Secure-` / `__Host-` name prefixes browsers reserve.
pub fn matches_prefix(name: &str, prefix: &str) -> bool {
    let bare = name
        .strip_prefix("__Secure-")
        .or_else(|| name.strip_prefix("__Host-"))
        .unwrap_or(name);
    bare.starts_with(prefix)
}

/// Cookies persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: BTreeMap<String, StoredCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored jar. A missing or corrupt entry yields an empty jar.
    pub fn from_stored(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
            return Self::new();
        };
        match serde_json::from_str(raw) {
            Ok(jar) => jar,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cookie jar");
                Self::new()
            }
        }
    }

    /// Encode for the durable store.
    pub fn to_stored(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Get a cookie value by name, ignoring expiry.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|c| c.value.as_str())
    }

    /// Apply `Set-Cookie` headers whose names carry `prefix`.
    ///
    /// Returns true if the jar changed.
    pub fn apply<'a>(
        &mut self,
        headers: impl IntoIterator<Item = &'a str>,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let mut changed = false;
        for header in headers {
            let Some(cookie) = parse_set_cookie(header, now) else {
                continue;
            };
            if !matches_prefix(&cookie.name, prefix) {
                continue;
            }

            if cookie.is_removal(now) {
                changed |= self.cookies.remove(&cookie.name).is_some();
            } else {
                let stored = StoredCookie {
                    value: cookie.value,
                    expires: cookie.expires,
                };
                if self.cookies.get(&cookie.name) != Some(&stored) {
                    self.cookies.insert(cookie.name, stored);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Drop expired cookies. Returns true if any were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.cookies.len();
        self.cookies.retain(|_, c| !c.is_expired_at(now));
        self.cookies.len() != before
    }

    /// Render live cookies as a `Cookie` request header value.
    pub fn header_value(&self, now: DateTime<Utc>) -> String {
        self.cookies
            .iter()
            .filter(|(_, c)| !c.is_expired_at(now))
            .map(|(name, c)| format!("{}={}", name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
