//! Error types for session cache operations.

/// Error type for durable store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing the backing storage failed.
    #[error("Store I/O error for key '{key}': {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },

    /// The key cannot be mapped onto the backing storage.
    #[error("Invalid store key: {0}")]
    InvalidKey(String),
}

/// Result type for session cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`SessionSource`](crate::SessionSource).
///
/// Only the HTTP status matters to the cache: 401 and 403 mean the server
/// explicitly rejected the session, everything else is transient.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Session fetch failed ({}): {message}", status_label(.status))]
pub struct FetchError {
    /// HTTP status of the failed check, if the server answered at all.
    pub status: Option<u16>,

    /// Human-readable detail for logs.
    pub message: String,
}

impl FetchError {
    /// Create an error carrying an HTTP status.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create an error for a failure that never reached the server.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Check if the server explicitly rejected the session (401/403).
    pub fn is_rejection(&self) -> bool {
        matches!(self.status, Some(401) | Some(403))
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "no status".to_string(),
    }
}
