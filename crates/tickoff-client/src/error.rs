//! Client error types.

use thiserror::Error;
use tickoff_session::FetchError;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Auth server returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error code from server.
        code: String,
        /// Error message from server.
        message: String,
    },

    /// Persisting cookies or session data failed.
    #[error("Storage error: {0}")]
    Store(#[from] tickoff_session::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if the server rejected the credentials or session.
    pub fn is_auth_error(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status(), Some(429))
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(status) if status >= 500)
    }
}

impl From<Error> for FetchError {
    fn from(e: Error) -> Self {
        match e.status() {
            Some(status) => FetchError::with_status(status, e.to_string()),
            None => FetchError::transport(e.to_string()),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error body returned by the auth server. Both fields are optional there.
#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> Error {
        Error::Api {
            status,
            code: "X".to_string(),
            message: "nope".to_string(),
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(api(401).is_auth_error());
        assert!(api(403).is_auth_error());
        assert!(!api(404).is_auth_error());
        assert!(api(429).is_rate_limited());
        assert!(api(502).is_server_error());
        assert!(!Error::Config("x".into()).is_server_error());
    }

    #[test]
    fn test_into_fetch_error() {
        let fetch: FetchError = api(403).into();
        assert_eq!(fetch.status, Some(403));
        assert!(fetch.is_rejection());

        let fetch: FetchError = Error::Config("bad".into()).into();
        assert_eq!(fetch.status, None);
        assert!(!fetch.is_rejection());
    }
}
