//! Auth server client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, ORIGIN, SET_COOKIE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tickoff_session::expiry::EMPTY_SESSION;
use tickoff_session::{
    DEFAULT_COOKIE_PREFIX, DurableStore, FetchError, MemoryStore, Session, SessionConfig,
    SessionSignal, SessionSource, SharedStore,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::cookies::CookieJar;
use crate::error::{Error, ErrorResponse, Result};
use crate::types::{AuthResponse, SignInEmailRequest, SignOutResponse, SignUpEmailRequest};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default path of the auth handler on the server.
const DEFAULT_BASE_PATH: &str = "api/auth";

/// Header native clients use to announce their origin.
const EXPO_ORIGIN: HeaderName = HeaderName::from_static("expo-origin");

/// Client for the auth server.
///
/// Every response's cookies are persisted into the durable store, and every
/// change to the stored cookies or session is announced on the
/// [`SessionSignal`] so attached caches can resync.
///
/// # Example
///
/// ```no_run
/// use tickoff_client::AuthClient;
///
/// # async fn example() -> tickoff_client::Result<()> {
/// let client = AuthClient::builder()
///     .base_url("http://localhost:3000")
///     .build()?;
///
/// client.sign_in_email("ada@example.com", "secret").await?;
/// let session = client.get_session().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    base_path: String,
    timeout: Duration,
    cookie_prefix: String,
    session_config: SessionConfig,
    store: SharedStore,
    signal: SessionSignal,
    /// Serializes read-modify-write cycles on the stored cookie jar.
    jar_lock: Mutex<()>,
}

impl AuthClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the auth server base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Change notification fired when stored auth state changes.
    pub fn signal(&self) -> &SessionSignal {
        &self.inner.signal
    }

    /// Durable store holding cookies and session data.
    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    /// Storage keys in use.
    pub fn session_config(&self) -> &SessionConfig {
        &self.inner.session_config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auth endpoints
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign in with email and password.
    pub async fn sign_in_email(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<AuthResponse> {
        let request = SignInEmailRequest::new(email, password);
        let response: AuthResponse = self.post("sign-in/email", &request).await?;
        info!(user_id = ?response.user.as_ref().map(|u| &u.id), "Signed in");
        Ok(response)
    }

    /// Create an account and sign in.
    pub async fn sign_up_email(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<AuthResponse> {
        let request = SignUpEmailRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        };
        let response: AuthResponse = self.post("sign-up/email", &request).await?;
        info!(user_id = ?response.user.as_ref().map(|u| &u.id), "Signed up");
        Ok(response)
    }

    /// Sign out.
    ///
    /// Local credentials are cleared even when the server call fails; the
    /// server's error is still returned.
    pub async fn sign_out(&self) -> Result<()> {
        let result = self
            .post::<SignOutResponse, _>("sign-out", &serde_json::json!({}))
            .await;
        if let Err(e) = &result {
            warn!(error = %e, "Server sign-out failed, clearing local session anyway");
        }

        let cookie_key = self.inner.session_config.cookie_key();
        let session_key = self.inner.session_config.session_key();
        {
            let _guard = self.inner.jar_lock.lock();
            self.inner.store.remove(&cookie_key)?;
        }
        self.inner.store.set(&session_key, EMPTY_SESSION)?;
        self.inner.signal.notify();
        info!("Signed out");

        result.map(|_| ())
    }

    /// Ask the server for the current session.
    ///
    /// The result is written to the durable store: the session JSON, or the
    /// empty sentinel when the server reports no session.
    pub async fn get_session(&self) -> Result<Option<Session>> {
        let url = self.url("get-session")?;
        let response = self.send(self.inner.http.get(url)).await?;
        let session: Option<Session> = self.handle_response(response).await?;

        let stored = match &session {
            Some(session) => serde_json::to_string(session)?,
            None => EMPTY_SESSION.to_string(),
        };
        self.inner
            .store
            .set(&self.inner.session_config.session_key(), &stored)?;

        debug!(signed_in = session.is_some(), "Fetched session");
        Ok(session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authenticated requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Stored cookies rendered as a `Cookie` header value. Empty when there
    /// are none.
    pub fn cookie_header(&self) -> String {
        let raw = self.inner.store.get(&self.inner.session_config.cookie_key());
        CookieJar::from_stored(raw.as_deref()).header_value(Utc::now())
    }

    /// Headers that authenticate a request to the API server.
    pub fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let cookies = self.cookie_header();
        if cookies.is_empty() {
            return headers;
        }
        match HeaderValue::from_str(&cookies) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Stored cookies are not a valid header value"),
        }
        headers
    }

    /// Start a request to any server that trusts the auth cookies, such as
    /// the API server.
    pub fn authenticated(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner
            .http
            .request(method, url)
            .headers(self.auth_headers())
            .timeout(self.inner.timeout)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an auth endpoint.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        let base_path = self.inner.base_path.trim_matches('/');
        let joined = if base_path.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", base_path, path)
        };
        self.inner.base_url.join(&joined).map_err(Error::from)
    }

    /// Make a POST request.
    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let response = self.send(self.inner.http.post(url).json(body)).await?;
        self.handle_response(response).await
    }

    /// Attach cookies, send, and absorb any cookies the server sets.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .headers(self.auth_headers())
            .timeout(self.inner.timeout)
            .send()
            .await?;

        if self.absorb_cookies(response.headers())? {
            debug!("Auth cookies updated");
            self.inner.signal.notify();
        }

        Ok(response)
    }

    /// Persist `Set-Cookie` headers. Returns true if the stored jar changed.
    fn absorb_cookies(&self, headers: &HeaderMap) -> Result<bool> {
        let set_cookies: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if set_cookies.is_empty() {
            return Ok(false);
        }

        let key = self.inner.session_config.cookie_key();
        let _guard = self.inner.jar_lock.lock();

        let mut jar = CookieJar::from_stored(self.inner.store.get(&key).as_deref());
        let now = Utc::now();
        let mut changed = jar.apply(set_cookies, &self.inner.cookie_prefix, now);
        changed |= jar.prune_expired(now);

        if changed {
            if jar.is_empty() {
                self.inner.store.remove(&key)?;
            } else {
                self.inner.store.set(&key, &jar.to_stored()?)?;
            }
        }
        Ok(changed)
    }

    /// Handle a response, extracting the body or error.
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: Response) -> Error {
        let status = response.status().as_u16();
        let body = response.json::<ErrorResponse>().await.unwrap_or_default();

        Error::Api {
            status,
            code: body.code.unwrap_or_else(|| "unknown".to_string()),
            message: body.message.unwrap_or_else(|| format!("HTTP {}", status)),
        }
    }
}

#[async_trait]
impl SessionSource for AuthClient {
    async fn fetch_session(&self) -> std::result::Result<Session, FetchError> {
        match self.get_session().await {
            Ok(Some(session)) => Ok(session),
            // The server answered but has no session for us. Without a 401
            // this is not treated as a rejection.
            Ok(None) => Err(FetchError::transport("server reported no active session")),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("cookie_prefix", &self.inner.cookie_prefix)
            .finish_non_exhaustive()
    }
}

/// Builder for creating an [`AuthClient`].
pub struct ClientBuilder {
    base_url: Option<String>,
    base_path: String,
    cookie_prefix: String,
    session_config: SessionConfig,
    store: Option<SharedStore>,
    signal: Option<SessionSignal>,
    origin: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            base_path: DEFAULT_BASE_PATH.to_string(),
            cookie_prefix: DEFAULT_COOKIE_PREFIX.to_string(),
            session_config: SessionConfig::default(),
            store: None,
            signal: None,
            origin: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the auth server URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the path of the auth handler (default `api/auth`).
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    /// Set the cookie prefix the server uses.
    pub fn cookie_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cookie_prefix = prefix.into();
        self
    }

    /// Set the storage keys (shared with the session cache).
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Set the durable store. Defaults to an in-memory store.
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an existing change signal.
    pub fn signal(mut self, signal: SessionSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Origin to announce, for servers that check trusted origins.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<AuthClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        if self.cookie_prefix.is_empty() {
            return Err(Error::Config("cookie_prefix must not be empty".to_string()));
        }

        // Build default headers
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(origin) = &self.origin {
            let value = HeaderValue::from_str(origin)
                .map_err(|_| Error::Config("Invalid origin".to_string()))?;
            headers.insert(ORIGIN, value.clone());
            headers.insert(EXPO_ORIGIN, value);
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("tickoff-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as SharedStore);

        Ok(AuthClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                base_path: self.base_path,
                timeout: self.timeout,
                cookie_prefix: self.cookie_prefix,
                session_config: self.session_config,
                store,
                signal: self.signal.unwrap_or_default(),
                jar_lock: Mutex::new(()),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
