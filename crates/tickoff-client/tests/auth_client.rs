//! Auth client tests against a mock auth server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tickoff_client::{AuthClient, CookieJar, Error};
use tickoff_session::{
    AuthStatus, DurableStore, MemoryStore, SessionCache, SessionConfig, SessionSource,
    SharedStore,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_COOKIE: &str = "tickoff.session_token=tok123; Path=/; Max-Age=3600; HttpOnly";

fn session_body() -> serde_json::Value {
    json!({
        "user": {"id": "u1", "name": "Ada", "email": "ada@example.com"},
        "session": {"id": "s1", "expiresAt": "2099-01-01T00:00:00Z"}
    })
}

fn client_for(server: &MockServer) -> (AuthClient, SharedStore) {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let client = AuthClient::builder()
        .base_url(server.uri())
        .store(store.clone())
        .build()
        .unwrap();
    (client, store)
}

async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/sign-in/email"))
        .and(body_json(json!({"email": "ada@example.com", "password": "pw"})))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", TOKEN_COOKIE)
                .append_header("set-cookie", "analytics=1; Path=/")
                .set_body_json(json!({"token": "tok123", "user": {"id": "u1"}})),
        )
        .mount(server)
        .await;
}

async fn wait_for_status(cache: &SessionCache, expected: AuthStatus) {
    let mut rx = cache.subscribe();
    tokio::time::timeout(
        Duration::from_secs(2),
        rx.wait_for(|state| state.status() == expected),
    )
    .await
    .expect("timed out waiting for status")
    .expect("cache dropped");
}

#[tokio::test]
async fn test_sign_in_persists_prefixed_cookies_and_notifies() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    let (client, store) = client_for(&server);
    let mut rx = client.signal().subscribe();

    let response = client.sign_in_email("ada@example.com", "pw").await.unwrap();
    assert_eq!(response.user.unwrap().id, "u1");

    let jar = CookieJar::from_stored(store.get("tickoff_cookie").as_deref());
    assert_eq!(jar.get("tickoff.session_token"), Some("tok123"));
    assert!(jar.get("analytics").is_none());
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn test_stored_cookie_sent_on_next_request() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/auth/get-session"))
        .and(header("cookie", "tickoff.session_token=tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _store) = client_for(&server);

    client.sign_in_email("ada@example.com", "pw").await.unwrap();
    let session = client.get_session().await.unwrap().unwrap();
    assert_eq!(session.user.id, "u1");
}

#[tokio::test]
async fn test_get_session_writes_session_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/get-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
        .mount(&server)
        .await;
    let (client, store) = client_for(&server);

    client.get_session().await.unwrap();

    let raw = store.get("tickoff_session_data").unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["user"]["id"], "u1");
    assert_eq!(stored["session"]["expiresAt"], "2099-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_null_session_writes_empty_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/get-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::Value::Null))
        .mount(&server)
        .await;
    let (client, store) = client_for(&server);
    store.set("tickoff_session_data", "stale").unwrap();

    assert!(client.get_session().await.unwrap().is_none());
    assert_eq!(store.get("tickoff_session_data").as_deref(), Some("{}"));

    let err = client.fetch_session().await.unwrap_err();
    assert_eq!(err.status, None);
    assert!(!err.is_rejection());
}

#[tokio::test]
async fn test_unauthorized_is_a_rejection_and_leaves_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/get-session"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"code": "UNAUTHORIZED", "message": "no session"})),
        )
        .mount(&server)
        .await;
    let (client, store) = client_for(&server);
    store.set("tickoff_session_data", "kept").unwrap();

    let err = client.get_session().await.unwrap_err();
    match &err {
        Error::Api {
            status,
            code,
            message,
        } => {
            assert_eq!(*status, 401);
            assert_eq!(code, "UNAUTHORIZED");
            assert_eq!(message, "no session");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.get("tickoff_session_data").as_deref(), Some("kept"));

    let fetch = client.fetch_session().await.unwrap_err();
    assert_eq!(fetch.status, Some(401));
    assert!(fetch.is_rejection());
}

#[tokio::test]
async fn test_sign_out_clears_locally_even_when_server_fails() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/sign-out"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let (client, store) = client_for(&server);

    client.sign_in_email("ada@example.com", "pw").await.unwrap();
    let mut rx = client.signal().subscribe();

    let err = client.sign_out().await.unwrap_err();
    assert!(err.is_server_error());
    assert!(store.get("tickoff_cookie").is_none());
    assert_eq!(store.get("tickoff_session_data").as_deref(), Some("{}"));
    assert!(rx.try_recv().is_ok());
    assert_eq!(client.cookie_header(), "");
}

#[tokio::test]
async fn test_cache_follows_sign_in_and_sign_out() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/auth/get-session"))
        .and(header("cookie", "tickoff.session_token=tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/sign-out"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "tickoff.session_token=; Max-Age=0")
                .set_body_json(json!({"success": true})),
        )
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);
    let cache = SessionCache::new(
        SessionConfig::default().with_revalidate_on_bootstrap(false),
        store.clone(),
        Arc::new(client.clone()),
    );
    let _subscription = cache.attach(client.signal());

    client.sign_in_email("ada@example.com", "pw").await.unwrap();
    cache.on_auth_success().await;
    let state = cache.snapshot();
    assert_eq!(state.status(), AuthStatus::SignedIn);
    assert_eq!(state.user().unwrap().id, "u1");

    client.sign_out().await.unwrap();
    wait_for_status(&cache, AuthStatus::SignedOut).await;
    assert!(!cache.snapshot().is_pending);
}

#[tokio::test]
async fn test_authenticated_requests_carry_cookies() {
    let auth = MockServer::start().await;
    mount_sign_in(&auth).await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .and(header("cookie", "tickoff.session_token=tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&api)
        .await;
    let (client, _store) = client_for(&auth);

    client.sign_in_email("ada@example.com", "pw").await.unwrap();
    let url = url::Url::parse(&format!("{}/tasks", api.uri())).unwrap();
    let response = client
        .authenticated(reqwest::Method::GET, url)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}
