//! Client-side session lifecycle for tickoff.
//!
//! This crate keeps a single, observable answer to "is the user signed in,
//! and as whom":
//! - Bootstrap from a durable store without waiting on the network
//! - Stale-while-revalidate reconciliation with the auth server
//! - Resync on out-of-band storage changes (sign-out elsewhere, new cookies)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tickoff_session::{FileStore, SessionCache, SessionConfig, SessionSignal};
//!
//! let store = Arc::new(FileStore::new(data_dir));
//! let cache = SessionCache::new(SessionConfig::default(), store, source);
//! let _sub = cache.attach(&signal);
//! cache.bootstrap();
//!
//! let mut state = cache.subscribe();
//! while state.changed().await.is_ok() {
//!     println!("{}", state.borrow().status());
//! }
//! ```

mod cache;
mod config;
mod error;
pub mod expiry;
mod model;
mod signal;
mod source;
mod store;

pub use cache::{AuthStatus, SessionCache, SessionState};
pub use config::{DEFAULT_COOKIE_PREFIX, DEFAULT_STORAGE_PREFIX, SessionConfig};
pub use error::{Error, FetchError, Result};
pub use model::{Session, SessionMeta, User};
pub use signal::{SessionSignal, SignalSubscription};
pub use source::{SessionSource, SharedSource};
pub use store::{DurableStore, FileStore, MemoryStore, SharedStore};
