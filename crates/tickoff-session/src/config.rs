//! Configuration for the session cache.

/// Default namespace for durable store keys.
pub const DEFAULT_STORAGE_PREFIX: &str = "tickoff";

/// Default prefix of the auth server's cookie names.
pub const DEFAULT_COOKIE_PREFIX: &str = "tickoff";

/// Suffix of the key holding the serialized session.
const SESSION_DATA_SUFFIX: &str = "session_data";

/// Suffix of the key holding the cookie jar.
const COOKIE_SUFFIX: &str = "cookie";

/// Configuration for the session cache and the stores it reads.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Prefix for durable store keys, so session entries do not collide
    /// with other stored values.
    pub storage_prefix: String,

    /// Whether `bootstrap` revalidates a usable cached session in the
    /// background. When false, only a cache miss triggers a refresh.
    pub revalidate_on_bootstrap: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            revalidate_on_bootstrap: true,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage key prefix.
    pub fn with_storage_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_prefix = prefix.into();
        self
    }

    /// Enable or disable background revalidation of a cached session.
    pub fn with_revalidate_on_bootstrap(mut self, enabled: bool) -> Self {
        self.revalidate_on_bootstrap = enabled;
        self
    }

    /// Key of the cached session entry, e.g. `tickoff_session_data`.
    pub fn session_key(&self) -> String {
        format!("{}_{}", self.storage_prefix, SESSION_DATA_SUFFIX)
    }

    /// Key of the persisted cookie jar, e.g. `tickoff_cookie`.
    pub fn cookie_key(&self) -> String {
        format!("{}_{}", self.storage_prefix, COOKIE_SUFFIX)
    }
}
