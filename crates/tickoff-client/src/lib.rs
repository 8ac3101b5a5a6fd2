//! HTTP client for the tickoff auth server.
//!
//! This crate talks to the auth server's email/password endpoints, persists
//! the session cookies it hands out, and implements
//! [`tickoff_session::SessionSource`] so a [`tickoff_session::SessionCache`]
//! can revalidate through it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tickoff_client::{AuthClient, Result};
//! use tickoff_session::{MemoryStore, SessionCache, SessionConfig, SharedStore};
//!
//! # async fn example() -> Result<()> {
//! let store: SharedStore = Arc::new(MemoryStore::new());
//! let client = AuthClient::builder()
//!     .base_url("http://localhost:3000")
//!     .store(store.clone())
//!     .build()?;
//!
//! let cache = SessionCache::new(SessionConfig::default(), store, Arc::new(client.clone()));
//! let _subscription = cache.attach(client.signal());
//! cache.bootstrap();
//!
//! client.sign_in_email("ada@example.com", "secret").await?;
//! cache.on_auth_success().await;
//! println!("{}", cache.snapshot().status());
//! # Ok(())
//! # }
//! ```
//!
//! # Cookies
//!
//! Only cookies whose names carry the configured prefix are kept. They are
//! stored under `<storage prefix>_cookie` and sent back on every request,
//! including requests to other servers built with
//! [`AuthClient::authenticated`].

mod client;
pub mod cookies;
mod error;
mod types;

pub use client::{AuthClient, ClientBuilder};
pub use tickoff_session::DEFAULT_COOKIE_PREFIX;
pub use cookies::CookieJar;
pub use error::{Error, Result};
pub use types::{AuthResponse, SignInEmailRequest, SignOutResponse, SignUpEmailRequest};
