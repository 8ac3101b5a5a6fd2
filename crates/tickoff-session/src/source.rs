//! The remote, authoritative side of session validation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::Session;

/// Network operation that confirms whether the current session is valid.
///
/// Implementations own their timeout policy; the cache waits for as long as
/// the call takes.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Ask the server for the current session.
    async fn fetch_session(&self) -> Result<Session, FetchError>;
}

/// Shared source handle.
pub type SharedSource = Arc<dyn SessionSource>;
