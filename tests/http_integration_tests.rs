//! End-to-end tests over real sockets: stub Clerk and stub storefront backend
//! served by axum on ephemeral ports, driven through the production
//! `ClerkClient`, `HttpUpstreamLogin` and router.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};

use skinadmin::config::AppConfig;
use skinadmin::identity::{
    AdminAuth, ClerkClient, ClerkSessionSource, GuardState, History, IdentityProvider, Navigator, RolePolicy, ROOT_PATH,
};
use skinadmin::server::upstream::{HttpUpstreamLogin, UpstreamLogin};
use skinadmin::server::AppState;

const SECRET: &str = "sk_test_stub";
const SIGNING_PEM: &str = include_str!("fixtures/clerk_signing.pem");
const FOREIGN_PEM: &str = include_str!("fixtures/foreign_signing.pem");
const JWKS: &str = include_str!("fixtures/clerk_jwks.json");
const KID: &str = "ins_test_key";

type Revoked = Arc<Mutex<Vec<String>>>;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("stub server error: {e:?}");
        }
    });
    format!("http://{}", addr)
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {SECRET}");
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(expected.as_str())
}

async fn stub_session(headers: HeaderMap, Path(sid): Path<String>) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"errors": []})));
    }
    match sid.as_str() {
        "sess_live" => (StatusCode::OK, Json(json!({"id": sid, "status": "active", "user_id": "user_1"}))),
        "sess_ended" => (StatusCode::OK, Json(json!({"id": sid, "status": "ended", "user_id": "user_1"}))),
        _ => (StatusCode::NOT_FOUND, Json(json!({"errors": [{"code": "resource_not_found"}]}))),
    }
}

async fn stub_user(headers: HeaderMap, Path(id): Path<String>) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    (StatusCode::OK, Json(json!({
        "id": id,
        "primary_email_address_id": "idn_1",
        "email_addresses": [{"id": "idn_1", "email_address": "store-admin@skins.test"}],
        "first_name": "Sam",
        "last_name": "Lee",
        "image_url": "https://img.clerk.test/user_1",
        "public_metadata": {},
        "created_at": 1700000000000i64,
        "updated_at": 1700000005000i64
    })))
}

async fn stub_users(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    (StatusCode::OK, Json(json!([{"id": "user_1", "limit": q.get("limit")}, {"id": "user_2"}])))
}

async fn stub_jwks(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    let keys: Value = serde_json::from_str(JWKS).expect("jwks fixture");
    (StatusCode::OK, Json(keys))
}

async fn stub_revoke(State(revoked): State<Revoked>, Path(sid): Path<String>) -> impl IntoResponse {
    revoked.lock().push(sid.clone());
    Json(json!({"id": sid, "status": "revoked"}))
}

async fn spawn_clerk() -> (String, Revoked) {
    let revoked: Revoked = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/v1/sessions/{sid}", get(stub_session))
        .route("/v1/sessions/{sid}/revoke", post(stub_revoke))
        .route("/v1/jwks", get(stub_jwks))
        .route("/v1/users", get(stub_users))
        .route("/v1/users/{id}", get(stub_user))
        .with_state(revoked.clone());
    (spawn(app).await, revoked)
}

async fn stub_login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["email"] == "ops@skins.test" && body["password"] == "hunter2" {
        (StatusCode::OK, Json(json!({"token": "backend_tok", "user": {"email": "ops@skins.test"}})))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"message": "invalid credentials"})))
    }
}

async fn spawn_backend() -> String {
    spawn(Router::new().route("/auth/login", post(stub_login))).await
}

fn signed_token(pem: &str, kid: &str, claims: &Value) -> String {
    let header = Header { kid: Some(kid.to_string()), ..Header::new(Algorithm::RS256) };
    encode(&header, claims, &EncodingKey::from_rsa_pem(pem.as_bytes()).expect("signing key")).expect("sign")
}

fn session_token(sub: &str, sid: &str) -> String {
    let now = Utc::now().timestamp();
    signed_token(SIGNING_PEM, KID, &json!({"sub": sub, "sid": sid, "iat": now, "nbf": now - 5, "exp": now + 600}))
}

fn unsigned_token(sub: &str, sid: &str) -> String {
    let enc = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let exp = Utc::now().timestamp() + 600;
    format!(
        "{}.{}.AAAA",
        enc.encode(br#"{"alg":"none"}"#),
        enc.encode(json!({"sub": sub, "sid": sid, "exp": exp}).to_string())
    )
}

fn bearer(token: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert("authorization", format!("Bearer {token}").parse().unwrap());
    h
}

#[tokio::test]
async fn clerk_verifies_only_active_sessions() {
    let (clerk_url, _) = spawn_clerk().await;
    let clerk = ClerkClient::new(&clerk_url, Some(SECRET.into()));

    let live = clerk.verify_request(&bearer(&session_token("user_1", "sess_live"))).await.unwrap();
    assert_eq!(live.as_deref(), Some("user_1"));

    let ended = clerk.verify_request(&bearer(&session_token("user_1", "sess_ended"))).await.unwrap();
    assert!(ended.is_none());

    let unknown = clerk.verify_request(&bearer(&session_token("user_1", "sess_gone"))).await.unwrap();
    assert!(unknown.is_none());

    let wrong_user = clerk.verify_request(&bearer(&session_token("user_2", "sess_live"))).await.unwrap();
    assert!(wrong_user.is_none());

    assert!(clerk.verify_request(&HeaderMap::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn clerk_rejects_tokens_it_did_not_sign() {
    let (clerk_url, _) = spawn_clerk().await;
    let clerk = ClerkClient::new(&clerk_url, Some(SECRET.into()));
    let now = Utc::now().timestamp();

    let unsigned = unsigned_token("user_1", "sess_live");
    assert!(clerk.verify_request(&bearer(&unsigned)).await.unwrap().is_none());

    let foreign = signed_token(FOREIGN_PEM, KID, &json!({"sub": "user_1", "sid": "sess_live", "exp": now + 600}));
    assert!(clerk.verify_request(&bearer(&foreign)).await.unwrap().is_none());

    let expired = signed_token(SIGNING_PEM, KID, &json!({"sub": "user_1", "sid": "sess_live", "exp": now - 3600}));
    assert!(clerk.verify_request(&bearer(&expired)).await.unwrap().is_none());

    let unknown_kid = signed_token(SIGNING_PEM, "ins_rotated", &json!({"sub": "user_1", "sid": "sess_live", "exp": now + 600}));
    assert!(clerk.verify_request(&bearer(&unknown_kid)).await.unwrap().is_none());
}

#[tokio::test]
async fn clerk_rejected_secret_is_an_error() {
    let (clerk_url, _) = spawn_clerk().await;
    let clerk = ClerkClient::new(&clerk_url, Some("sk_wrong".into()));
    assert!(clerk.verify_request(&bearer(&session_token("user_1", "sess_live"))).await.is_err());
    assert!(clerk.list_users(100).await.is_err());
}

#[tokio::test]
async fn upstream_login_reports_status_and_body() {
    let backend = spawn_backend().await;
    let login = HttpUpstreamLogin::new(Some(backend));

    let ok = login.login("ops@skins.test", "hunter2").await.unwrap();
    assert!(ok.is_success());
    assert_eq!(ok.body["token"], "backend_tok");

    let bad = login.login("ops@skins.test", "nope").await.unwrap();
    assert_eq!(bad.status, 401);
    assert!(!bad.is_success());
}

#[tokio::test]
async fn upstream_connection_failure_is_an_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let login = HttpUpstreamLogin::new(Some(format!("http://{addr}")));
    assert!(login.login("a", "b").await.is_err());
}

async fn stub_login_plaintext() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "text/plain")], "welcome back")
}

async fn spawn_plaintext_backend() -> String {
    spawn(Router::new().route("/auth/login", post(stub_login_plaintext))).await
}

#[tokio::test]
async fn upstream_non_json_success_is_an_error() {
    let login = HttpUpstreamLogin::new(Some(spawn_plaintext_backend().await));
    assert!(login.login("ops@skins.test", "hunter2").await.is_err());
}

async fn spawn_admin(cfg: AppConfig) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::from_config(cfg);
    tokio::spawn(async move {
        let _ = skinadmin::server::serve(listener, state).await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn admin_server_end_to_end() {
    let (clerk_url, _) = spawn_clerk().await;
    let backend = spawn_backend().await;
    let cfg = AppConfig {
        admin_email: Some("ops@skins.test".into()),
        admin_password: Some("hunter2".into()),
        api_url: Some(backend),
        clerk_secret_key: Some(SECRET.into()),
        clerk_api_url: clerk_url,
        ..AppConfig::default()
    };
    let base = spawn_admin(cfg).await;
    let http = reqwest::Client::new();
    let token = session_token("user_1", "sess_live");

    let resp = http.post(format!("{base}/admin-auth")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v, json!({"success": true, "token": "backend_tok", "user": {"email": "ops@skins.test"}}));

    let resp = http.post(format!("{base}/admin-auth"))
        .header("cookie", format!("__session={token}"))
        .send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = http.get(format!("{base}/admin-auth")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 405);

    let resp = http.post(format!("{base}/admin-auth")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = http.get(format!("{base}/clerk-users")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let users: Value = resp.json().await.unwrap();
    assert_eq!(users[0]["limit"], "100");
    assert_eq!(users.as_array().map(|a| a.len()), Some(2));

    let resp = http.post(format!("{base}/clerk-users")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 405);
}

#[tokio::test]
async fn admin_server_reports_backend_rejection() {
    let (clerk_url, _) = spawn_clerk().await;
    let backend = spawn_backend().await;
    let cfg = AppConfig {
        admin_email: Some("ops@skins.test".into()),
        admin_password: Some("stale-password".into()),
        api_url: Some(backend),
        clerk_secret_key: Some(SECRET.into()),
        clerk_api_url: clerk_url,
        ..AppConfig::default()
    };
    let base = spawn_admin(cfg).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/admin-auth"))
        .bearer_auth(session_token("user_1", "sess_live"))
        .send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v, json!({"error": "Failed to authenticate with backend"}));
}

fn wired(clerk_url: String, backend: String) -> AppConfig {
    AppConfig {
        admin_email: Some("ops@skins.test".into()),
        admin_password: Some("hunter2".into()),
        api_url: Some(backend),
        clerk_secret_key: Some(SECRET.into()),
        clerk_api_url: clerk_url,
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn admin_server_rejects_unverifiable_tokens() {
    let (clerk_url, _) = spawn_clerk().await;
    let base = spawn_admin(wired(clerk_url, spawn_backend().await)).await;
    let http = reqwest::Client::new();
    let now = Utc::now().timestamp();

    let tokens = [
        unsigned_token("user_1", "sess_live"),
        signed_token(FOREIGN_PEM, KID, &json!({"sub": "user_1", "sid": "sess_live", "exp": now + 600})),
        signed_token(SIGNING_PEM, KID, &json!({"sub": "user_1", "sid": "sess_live", "exp": now - 3600})),
    ];
    for token in tokens {
        let resp = http.post(format!("{base}/admin-auth")).bearer_auth(&token).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 401);
        let v: Value = resp.json().await.unwrap();
        assert_eq!(v, json!({"error": "Unauthorized"}));
    }
}

#[tokio::test]
async fn admin_server_malformed_backend_body_is_500() {
    let (clerk_url, _) = spawn_clerk().await;
    let base = spawn_admin(wired(clerk_url, spawn_plaintext_backend().await)).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/admin-auth"))
        .bearer_auth(session_token("user_1", "sess_live"))
        .send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v, json!({"error": "Internal server error"}));
}

#[tokio::test]
async fn clerk_users_without_secret_is_500() {
    let base = spawn_admin(AppConfig::default()).await;
    let resp = reqwest::Client::new().get(format!("{base}/clerk-users")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v, json!({"error": "Failed to fetch users from Clerk"}));
}

#[tokio::test]
async fn admin_auth_session_flow_against_clerk() {
    let (clerk_url, revoked) = spawn_clerk().await;
    let clerk = ClerkClient::new(&clerk_url, Some(SECRET.into()));
    let source = ClerkSessionSource::new(clerk, Some(session_token("user_1", "sess_live")));
    let mut auth = AdminAuth::new(source, History::new("/dashboard"), RolePolicy::default());

    assert!(auth.loading());
    auth.refresh().await.unwrap();
    assert_eq!(auth.guard_state(), GuardState::Authenticated);
    let user = auth.user().expect("user view");
    assert_eq!(user.email.as_deref(), Some("store-admin@skins.test"));
    assert_eq!(user.name.as_deref(), Some("Sam Lee"));
    // substring rule: "store-admin@" contains "admin"
    assert!(auth.is_admin());

    auth.logout().await.unwrap();
    assert_eq!(*revoked.lock(), vec!["sess_live".to_string()]);
    assert_eq!(auth.navigator().current_path(), ROOT_PATH);
    assert!(auth.user().is_none());
}

#[tokio::test]
async fn anonymous_browser_is_sent_home() {
    let (clerk_url, _) = spawn_clerk().await;
    let source = ClerkSessionSource::new(ClerkClient::new(&clerk_url, Some(SECRET.into())), None);
    let mut auth = AdminAuth::new(source, History::new("/dashboard/products"), RolePolicy::default());
    auth.refresh().await.unwrap();
    assert_eq!(auth.guard_state(), GuardState::Unauthenticated);
    assert_eq!(auth.navigator().current_path(), ROOT_PATH);
    assert_eq!(auth.navigator().entries().len(), 1);
}
