//! Session cache with stale-while-revalidate refresh.

use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::FetchError;
use crate::expiry;
use crate::model::{Session, User};
use crate::signal::{SessionSignal, SignalSubscription};
use crate::source::SharedSource;
use crate::store::SharedStore;

/// Observable session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Current best-known session.
    pub data: Option<Session>,

    /// True while an authoritative refresh is in flight or not yet attempted.
    pub is_pending: bool,
}

impl SessionState {
    /// How UI code should read this state.
    pub fn status(&self) -> AuthStatus {
        match (&self.data, self.is_pending) {
            (Some(_), _) => AuthStatus::SignedIn,
            (None, true) => AuthStatus::Unknown,
            (None, false) => AuthStatus::SignedOut,
        }
    }

    /// The signed-in user, if any.
    pub fn user(&self) -> Option<&User> {
        self.data.as_ref().map(|s| &s.user)
    }
}

/// Interpretation of a [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// A session is known. Treat as signed in even while revalidating.
    SignedIn,
    /// No session and a check is in flight.
    Unknown,
    /// No session and nothing in flight.
    SignedOut,
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthStatus::SignedIn => write!(f, "signed in"),
            AuthStatus::Unknown => write!(f, "checking"),
            AuthStatus::SignedOut => write!(f, "signed out"),
        }
    }
}

/// Whether a refresh is visible through `is_pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshMode {
    /// Raises `is_pending` while in flight.
    Foreground,
    /// Silent revalidation of an already usable session.
    Background,
}

/// Bookkeeping for overlapping refreshes.
#[derive(Debug, Default)]
struct RefreshControl {
    /// Sequence number handed to the most recently started refresh.
    started: u64,

    /// Sequence number of the newest refresh whose result was applied.
    applied: u64,

    /// Foreground refreshes still in flight.
    foreground: usize,
}

struct CacheInner {
    config: SessionConfig,
    store: SharedStore,
    source: SharedSource,
    state: watch::Sender<SessionState>,
    control: Mutex<RefreshControl>,
}

/// Single source of truth for "is the user signed in, and as whom".
///
/// The cache:
/// - seeds itself from the durable store without waiting on the network
/// - reconciles with the [`SessionSource`](crate::SessionSource) in the background
/// - follows out-of-band storage changes through a [`SessionSignal`]
///
/// Only the cache mutates its state; observers read it through
/// [`snapshot`](Self::snapshot) or [`subscribe`](Self::subscribe).
/// Clones share the same state.
///
/// When refreshes overlap, each takes a sequence number as it starts and a
/// result is dropped if a newer refresh has already been applied.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<CacheInner>,
}

impl SessionCache {
    /// Create a cache. Nothing is read until [`bootstrap`](Self::bootstrap).
    pub fn new(config: SessionConfig, store: SharedStore, source: SharedSource) -> Self {
        let (state, _) = watch::channel(SessionState {
            data: None,
            is_pending: true,
        });

        Self {
            inner: Arc::new(CacheInner {
                config,
                store,
                source,
                state,
                control: Mutex::new(RefreshControl::default()),
            }),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Live view of the state for observers.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Seed the state from the durable store and start reconciling.
    ///
    /// With a usable cached session the state is immediately signed in and
    /// not pending, and a background revalidation is started. Otherwise the
    /// state is cleared, marked pending, and a foreground refresh starts.
    ///
    /// Returns the spawned refresh, if any. Must be called inside a tokio
    /// runtime.
    pub fn bootstrap(&self) -> Option<JoinHandle<()>> {
        let key = self.inner.config.session_key();
        let raw = self.inner.store.get(&key);

        match expiry::decode_cached(raw.as_deref(), Utc::now()) {
            Some(session) => {
                info!(
                    user_id = %session.user.id,
                    expires_at = ?session.expires_at(),
                    "Restored cached session"
                );
                {
                    let control = self.inner.control.lock();
                    let is_pending = control.foreground > 0;
                    self.inner.state.send_replace(SessionState {
                        data: Some(session),
                        is_pending,
                    });
                }

                if self.inner.config.revalidate_on_bootstrap {
                    Some(self.spawn_refresh(RefreshMode::Background))
                } else {
                    None
                }
            }
            None => {
                debug!(key = %key, "No usable cached session, refreshing");
                self.inner.state.send_replace(SessionState {
                    data: None,
                    is_pending: true,
                });
                Some(self.spawn_refresh(RefreshMode::Foreground))
            }
        }
    }

    /// Reconcile with the server.
    ///
    /// Success replaces the session. A 401/403 clears it. Any other failure
    /// keeps whatever was known before. `is_pending` is raised until this
    /// and every other foreground refresh have settled.
    ///
    /// The fetch runs as its own task, so dropping this future does not
    /// leave the state pending. A fetch that panics or is aborted settles
    /// as a transient failure.
    pub async fn refresh(&self) {
        let handle = self.spawn_refresh(RefreshMode::Foreground);
        if let Err(e) = handle.await {
            warn!(error = %e, "Session refresh task failed");
        }
    }

    /// Call after a sign-in or sign-up flow completes.
    pub async fn on_auth_success(&self) {
        debug!("Authentication succeeded, refreshing session");
        self.refresh().await;
    }

    /// Re-read the durable store without touching the network.
    ///
    /// Sets the session to `None` when the store no longer holds a usable
    /// entry. Leaves `is_pending` alone.
    ///
    /// The read and the update happen under the refresh lock. A source
    /// persists its result before returning it, so a resync can never put
    /// an older store entry on top of a settled refresh.
    pub fn resync_from_store(&self) {
        let _control = self.inner.control.lock();

        let key = self.inner.config.session_key();
        let raw = self.inner.store.get(&key);
        let data = expiry::decode_cached(raw.as_deref(), Utc::now());

        let changed = self.inner.state.send_if_modified(|state| {
            if state.data == data {
                false
            } else {
                state.data = data;
                true
            }
        });

        if changed {
            debug!(
                signed_in = self.inner.state.borrow().data.is_some(),
                "Session resynced from store"
            );
        } else {
            trace!("Store change did not affect session");
        }
    }

    /// Follow a change signal, resyncing from the store on every
    /// notification. Dropping the returned guard unsubscribes.
    ///
    /// The listener holds only a weak reference, so it does not keep the
    /// cache alive.
    pub fn attach(&self, signal: &SessionSignal) -> SignalSubscription {
        let mut rx = signal.subscribe();
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(()) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        trace!(skipped, "Session signal lagged");
                    }
                    Err(RecvError::Closed) => break,
                }

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                SessionCache { inner }.resync_from_store();
            }
            debug!("Session signal listener stopped");
        });

        SignalSubscription::new(task)
    }

    /// Register a refresh and spawn its fetch.
    ///
    /// Registration happens before returning, so a foreground refresh is
    /// visible as pending immediately.
    fn spawn_refresh(&self, mode: RefreshMode) -> JoinHandle<()> {
        let seq = self.begin(mode);
        let cache = self.clone();

        let guard = SettleGuard {
            cache: Some(self.clone()),
            seq,
            mode,
        };

        tokio::spawn(async move {
            trace!(seq, ?mode, "Fetching session");
            let result = cache.inner.source.fetch_session().await;
            guard.settle(result);
        })
    }

    fn begin(&self, mode: RefreshMode) -> u64 {
        let mut control = self.inner.control.lock();
        control.started += 1;
        let seq = control.started;

        if mode == RefreshMode::Foreground {
            control.foreground += 1;
            self.inner.state.send_if_modified(|state| {
                let was_pending = state.is_pending;
                state.is_pending = true;
                !was_pending
            });
        }

        seq
    }

    fn settle(&self, seq: u64, mode: RefreshMode, result: Result<Session, FetchError>) {
        let mut control = self.inner.control.lock();
        if mode == RefreshMode::Foreground {
            control.foreground = control.foreground.saturating_sub(1);
        }
        let is_pending = control.foreground > 0;

        let current = seq > control.applied;
        if current {
            control.applied = seq;
        } else {
            debug!(
                seq,
                applied = control.applied,
                "Discarding stale session refresh result"
            );
        }

        self.inner.state.send_if_modified(|state| {
            let mut next = state.clone();
            next.is_pending = is_pending;

            if current {
                match result {
                    Ok(session) => {
                        debug!(user_id = %session.user.id, "Session confirmed by server");
                        next.data = Some(session);
                    }
                    Err(e) if e.is_rejection() => {
                        info!(status = ?e.status, "Session rejected by server");
                        next.data = None;
                    }
                    Err(e) => {
                        warn!(error = %e, "Session refresh failed, keeping previous state");
                    }
                }
            }

            if next == *state {
                false
            } else {
                *state = next;
                true
            }
        });
    }
}

/// Settles a refresh exactly once, even if its task panics or is dropped
/// before the fetch completes.
struct SettleGuard {
    cache: Option<SessionCache>,
    seq: u64,
    mode: RefreshMode,
}

impl SettleGuard {
    fn settle(mut self, result: Result<Session, FetchError>) {
        if let Some(cache) = self.cache.take() {
            cache.settle(self.seq, self.mode, result);
        }
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.take() {
            warn!(seq = self.seq, "Session refresh ended without a result");
            cache.settle(
                self.seq,
                self.mode,
                Err(FetchError::transport("refresh task aborted")),
            );
        }
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("config", &self.inner.config)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SessionSource;
    use crate::store::{DurableStore, MemoryStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    type Reply = Result<Session, FetchError>;

    enum Scripted {
        Now(Reply),
        Later(oneshot::Receiver<Reply>),
    }

    /// Source that answers from a script, optionally waiting for the test
    /// to release each reply.
    #[derive(Default)]
    struct ScriptedSource {
        replies: Mutex<VecDeque<Scripted>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn replying(replies: Vec<Reply>) -> Arc<Self> {
            let source = Self::default();
            source
                .replies
                .lock()
                .extend(replies.into_iter().map(Scripted::Now));
            Arc::new(source)
        }

        fn gated() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Queue a reply the test resolves later.
        fn hold(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().push_back(Scripted::Later(rx));
            tx
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn wait_for_calls(&self, n: usize) {
            for _ in 0..1000 {
                if self.calls() >= n {
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
            panic!("source was called {} times, expected {}", self.calls(), n);
        }
    }

    #[async_trait]
    impl SessionSource for ScriptedSource {
        async fn fetch_session(&self) -> Result<Session, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.replies.lock().pop_front();
            match next {
                Some(Scripted::Now(reply)) => reply,
                Some(Scripted::Later(rx)) => rx
                    .await
                    .unwrap_or_else(|_| Err(FetchError::transport("reply dropped"))),
                None => Err(FetchError::transport("no scripted reply")),
            }
        }
    }

    fn session(id: &str, expires_in: Duration) -> Session {
        Session::new(User::new(id), Utc::now() + expires_in)
    }

    fn cached(session: &Session) -> String {
        serde_json::to_string(session).unwrap()
    }

    fn store_with(session: &Session) -> Arc<MemoryStore> {
        let key = SessionConfig::default().session_key();
        Arc::new(MemoryStore::with_entry(key, cached(session)))
    }

    fn cache_with(store: Arc<MemoryStore>, source: Arc<ScriptedSource>) -> SessionCache {
        SessionCache::new(SessionConfig::default(), store, source)
    }

    fn user_id(cache: &SessionCache) -> Option<String> {
        cache.snapshot().user().map(|u| u.id.clone())
    }

    #[tokio::test]
    async fn test_initial_state_is_unknown() {
        let cache = cache_with(Arc::new(MemoryStore::new()), ScriptedSource::gated());
        let state = cache.snapshot();
        assert!(state.data.is_none());
        assert!(state.is_pending);
        assert_eq!(state.status(), AuthStatus::Unknown);
    }

    #[tokio::test]
    async fn test_expired_cache_loads_as_absent() {
        let source = ScriptedSource::gated();
        let reply = source.hold();
        let store = store_with(&session("u1", Duration::hours(-1)));
        let cache = cache_with(store, source.clone());

        let handle = cache.bootstrap().unwrap();

        // Before the network call resolves
        let state = cache.snapshot();
        assert!(state.data.is_none());
        assert!(state.is_pending);

        reply
            .send(Err(FetchError::with_status(401, "unauthorized")))
            .unwrap();
        handle.await.unwrap();
        assert_eq!(cache.snapshot().status(), AuthStatus::SignedOut);
    }

    #[tokio::test]
    async fn test_valid_cache_is_served_while_revalidating() {
        let source = ScriptedSource::gated();
        let reply = source.hold();
        let store = store_with(&session("u1", Duration::hours(1)));
        let cache = cache_with(store, source.clone());

        let handle = cache.bootstrap().unwrap();

        let state = cache.snapshot();
        assert_eq!(user_id(&cache).as_deref(), Some("u1"));
        assert!(!state.is_pending);

        // Background revalidation is in flight but not visible
        source.wait_for_calls(1).await;
        assert!(!cache.snapshot().is_pending);

        reply
            .send(Err(FetchError::with_status(500, "internal error")))
            .unwrap();
        handle.await.unwrap();

        let state = cache.snapshot();
        assert_eq!(user_id(&cache).as_deref(), Some("u1"));
        assert!(!state.is_pending);
    }

    #[tokio::test]
    async fn test_missing_cache_then_success() {
        let source = ScriptedSource::replying(vec![Ok(session("u2", Duration::hours(1)))]);
        let cache = cache_with(Arc::new(MemoryStore::new()), source.clone());

        cache.bootstrap().unwrap().await.unwrap();

        let state = cache.snapshot();
        assert_eq!(user_id(&cache).as_deref(), Some("u2"));
        assert!(!state.is_pending);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_a_miss() {
        let key = SessionConfig::default().session_key();
        let store = Arc::new(MemoryStore::with_entry(key, "{not json"));
        let source = ScriptedSource::gated();
        let _reply = source.hold();
        let cache = cache_with(store, source.clone());

        let _handle = cache.bootstrap();
        assert_eq!(cache.snapshot().status(), AuthStatus::Unknown);
        source.wait_for_calls(1).await;
    }

    #[tokio::test]
    async fn test_rejection_clears_session() {
        for status in [401, 403] {
            let source = ScriptedSource::replying(vec![Err(FetchError::with_status(
                status, "rejected",
            ))]);
            let store = store_with(&session("u1", Duration::hours(1)));
            let cache = SessionCache::new(
                SessionConfig::default().with_revalidate_on_bootstrap(false),
                store,
                source,
            );
            assert!(cache.bootstrap().is_none());
            assert_eq!(user_id(&cache).as_deref(), Some("u1"));

            cache.refresh().await;

            let state = cache.snapshot();
            assert!(state.data.is_none(), "status {status} should clear");
            assert!(!state.is_pending);
            assert_eq!(state.status(), AuthStatus::SignedOut);
        }
    }

    #[tokio::test]
    async fn test_transient_failures_keep_session() {
        let source = ScriptedSource::replying(vec![
            Err(FetchError::with_status(500, "internal error")),
            Err(FetchError::with_status(404, "not found")),
            Err(FetchError::transport("connection refused")),
        ]);
        let store = store_with(&session("u1", Duration::hours(1)));
        let cache = SessionCache::new(
            SessionConfig::default().with_revalidate_on_bootstrap(false),
            store,
            source.clone(),
        );
        cache.bootstrap();

        for _ in 0..3 {
            cache.refresh().await;
            let state = cache.snapshot();
            assert_eq!(user_id(&cache).as_deref(), Some("u1"));
            assert!(!state.is_pending);
        }
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_success_overwrites_previous_session() {
        let source = ScriptedSource::replying(vec![Ok(session("u2", Duration::hours(1)))]);
        let store = store_with(&session("u1", Duration::hours(1)));
        let cache = SessionCache::new(
            SessionConfig::default().with_revalidate_on_bootstrap(false),
            store,
            source,
        );
        cache.bootstrap();

        cache.refresh().await;
        assert_eq!(user_id(&cache).as_deref(), Some("u2"));
    }

    #[tokio::test]
    async fn test_foreground_refresh_is_pending_while_in_flight() {
        let source = ScriptedSource::gated();
        let reply = source.hold();
        let store = store_with(&session("u1", Duration::hours(1)));
        let cache = SessionCache::new(
            SessionConfig::default().with_revalidate_on_bootstrap(false),
            store,
            source.clone(),
        );
        cache.bootstrap();

        let task = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh().await })
        };
        source.wait_for_calls(1).await;

        let state = cache.snapshot();
        assert!(state.is_pending);
        assert_eq!(state.status(), AuthStatus::SignedIn);

        reply.send(Ok(session("u1", Duration::hours(2)))).unwrap();
        task.await.unwrap();
        assert!(!cache.snapshot().is_pending);
    }

    #[tokio::test]
    async fn test_stale_refresh_result_is_discarded() {
        let source = ScriptedSource::gated();
        let first = source.hold();
        let second = source.hold();
        let cache = cache_with(Arc::new(MemoryStore::new()), source.clone());

        let older = cache.spawn_refresh(RefreshMode::Foreground);
        source.wait_for_calls(1).await;
        let newer = cache.spawn_refresh(RefreshMode::Foreground);
        source.wait_for_calls(2).await;

        second.send(Ok(session("new", Duration::hours(1)))).unwrap();
        newer.await.unwrap();
        assert_eq!(user_id(&cache).as_deref(), Some("new"));
        // The older refresh is still in flight
        assert!(cache.snapshot().is_pending);

        first.send(Ok(session("old", Duration::hours(1)))).unwrap();
        older.await.unwrap();

        let state = cache.snapshot();
        assert_eq!(user_id(&cache).as_deref(), Some("new"));
        assert!(!state.is_pending);
    }

    #[tokio::test]
    async fn test_older_result_applies_when_settled_first() {
        let source = ScriptedSource::gated();
        let first = source.hold();
        let second = source.hold();
        let cache = cache_with(Arc::new(MemoryStore::new()), source.clone());

        let older = cache.spawn_refresh(RefreshMode::Foreground);
        source.wait_for_calls(1).await;
        let newer = cache.spawn_refresh(RefreshMode::Foreground);
        source.wait_for_calls(2).await;

        first.send(Ok(session("old", Duration::hours(1)))).unwrap();
        older.await.unwrap();
        assert_eq!(user_id(&cache).as_deref(), Some("old"));

        second
            .send(Err(FetchError::with_status(401, "signed out elsewhere")))
            .unwrap();
        newer.await.unwrap();
        assert!(cache.snapshot().data.is_none());
    }

    #[tokio::test]
    async fn test_on_auth_success_refreshes() {
        let source = ScriptedSource::replying(vec![Ok(session("u3", Duration::hours(1)))]);
        let cache = cache_with(Arc::new(MemoryStore::new()), source.clone());

        cache.on_auth_success().await;

        assert_eq!(source.calls(), 1);
        assert_eq!(user_id(&cache).as_deref(), Some("u3"));
        assert!(!cache.snapshot().is_pending);
    }

    #[tokio::test]
    async fn test_signal_resyncs_from_store_without_network() {
        let store = store_with(&session("u1", Duration::hours(1)));
        let source = ScriptedSource::gated();
        let cache = SessionCache::new(
            SessionConfig::default().with_revalidate_on_bootstrap(false),
            store.clone(),
            source.clone(),
        );
        let signal = SessionSignal::new();
        let _sub = cache.attach(&signal);
        cache.bootstrap();
        assert_eq!(user_id(&cache).as_deref(), Some("u1"));

        let mut rx = cache.subscribe();
        rx.borrow_and_update();

        store.remove(&cache.config().session_key()).unwrap();
        signal.notify();

        tokio::time::timeout(std::time::Duration::from_secs(1), rx.changed())
            .await
            .expect("state change")
            .unwrap();

        let state = cache.snapshot();
        assert!(state.data.is_none());
        assert!(!state.is_pending);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_signal_picks_up_new_session() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), ScriptedSource::gated());
        let signal = SessionSignal::new();
        let _sub = cache.attach(&signal);

        let mut rx = cache.subscribe();
        store
            .set(
                &cache.config().session_key(),
                &cached(&session("u4", Duration::hours(1))),
            )
            .unwrap();
        signal.notify();

        tokio::time::timeout(std::time::Duration::from_secs(1), rx.changed())
            .await
            .expect("state change")
            .unwrap();
        assert_eq!(user_id(&cache).as_deref(), Some("u4"));
    }

    #[tokio::test]
    async fn test_resync_ignores_expired_entries() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), ScriptedSource::gated());

        store
            .set(
                &cache.config().session_key(),
                &cached(&session("u5", Duration::minutes(-1))),
            )
            .unwrap();
        cache.resync_from_store();
        assert!(cache.snapshot().data.is_none());
    }

    #[tokio::test]
    async fn test_listener_does_not_outlive_cache() {
        let signal = SessionSignal::new();
        let sub = {
            let cache = cache_with(Arc::new(MemoryStore::new()), ScriptedSource::gated());
            cache.attach(&signal)
        };

        signal.notify();
        for _ in 0..100 {
            if !sub.is_active() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert!(!sub.is_active());
    }

    struct PanickingSource;

    #[async_trait]
    impl SessionSource for PanickingSource {
        async fn fetch_session(&self) -> Result<Session, FetchError> {
            panic!("session source crashed");
        }
    }

    #[tokio::test]
    async fn test_panicking_refresh_still_settles() {
        let store = store_with(&session("u1", Duration::hours(1)));
        let cache = SessionCache::new(SessionConfig::default(), store, Arc::new(PanickingSource));
        cache.resync_from_store();

        cache.refresh().await;

        let state = cache.snapshot();
        assert!(!state.is_pending);
        assert_eq!(user_id(&cache).as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_aborted_refresh_still_settles() {
        let source = ScriptedSource::gated();
        let _reply = source.hold();
        let cache = cache_with(Arc::new(MemoryStore::new()), source.clone());

        let handle = cache.bootstrap().unwrap();
        assert!(cache.snapshot().is_pending);

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        assert_eq!(cache.snapshot().status(), AuthStatus::SignedOut);
    }

    /// Source that behaves like the auth client: it announces new cookies
    /// before writing the session it is about to return.
    struct PersistingSource {
        store: Arc<MemoryStore>,
        signal: SessionSignal,
        session: Session,
    }

    #[async_trait]
    impl SessionSource for PersistingSource {
        async fn fetch_session(&self) -> Result<Session, FetchError> {
            self.signal.notify();
            tokio::task::yield_now().await;
            self.store
                .set(&SessionConfig::default().session_key(), &cached(&self.session))
                .unwrap();
            Ok(self.session.clone())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_resync_never_overwrites_newer_refresh() {
        for _ in 0..20 {
            let key = SessionConfig::default().session_key();
            let store = Arc::new(MemoryStore::with_entry(key, "{}"));
            let signal = SessionSignal::new();
            let source = Arc::new(PersistingSource {
                store: store.clone(),
                signal: signal.clone(),
                session: session("u1", Duration::hours(1)),
            });
            let cache = SessionCache::new(SessionConfig::default(), store, source);
            let _subscription = cache.attach(&signal);

            cache.on_auth_success().await;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;

            assert_eq!(user_id(&cache).as_deref(), Some("u1"));
        }
    }
}
