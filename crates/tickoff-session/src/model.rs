//! Session data model shared by the cache, the stores and the auth client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::expiry;

/// An authenticated user's current login state.
///
/// Mirrors the JSON shape the auth server returns from its session endpoint:
///
/// ```json
/// {"user": {"id": "u1", "email": "a@b.c"}, "session": {"expiresAt": "2030-01-01T00:00:00Z"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Identity of the signed-in user.
    pub user: User,

    /// Validity window and server-side session attributes.
    pub session: SessionMeta,
}

impl Session {
    /// Create a session for a user that expires at the given instant.
    pub fn new(user: User, expires_at: DateTime<Utc>) -> Self {
        Self {
            user,
            session: SessionMeta {
                expires_at: Some(expires_at),
                extra: Map::new(),
            },
        }
    }

    /// When this session stops being valid, if known.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.session.expires_at
    }

    /// Check whether the session is still valid at `now`.
    ///
    /// A session without a usable expiry is never valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !expiry::is_expired_at(self.session.expires_at, now)
    }
}

/// Identity attributes. Opaque beyond equality and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Attributes the server sends that the client does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Best label for display: name, then email, then id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Server-side session attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    /// Absolute expiry. `None` when missing or unparsable.
    #[serde(
        default,
        deserialize_with = "expiry::deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    /// Session id, token and timestamps, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
