//!
//! skinadmin HTTP server
//! ----------------------
//! Axum-based admin API for the storefront.
//!
//! Responsibilities:
//! - `POST /admin-auth`: exchange the operator credentials for a backend token
//!   on behalf of any caller holding a valid identity-provider session.
//! - `GET /clerk-users`: raw user directory from the identity provider.
//!
//! Every failure is mapped to `AppError` at the handler boundary so callers
//! always receive `{error}` JSON with a matching status.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{ClerkClient, IdentityProvider};

pub mod upstream;

use upstream::{HttpUpstreamLogin, UpstreamLogin};

pub const USER_LIST_LIMIT: u32 = 100;

const INTERNAL_ERROR: &str = "Internal server error";
const CREDENTIALS_MISSING: &str = "Admin credentials not configured";
const BACKEND_REJECTED: &str = "Failed to authenticate with backend";
const USERS_FAILED: &str = "Failed to fetch users from Clerk";

/// Shared server state injected into all handlers. Built once at startup
/// and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub identity: Arc<dyn IdentityProvider>,
    pub upstream: Arc<dyn UpstreamLogin>,
}

impl AppState {
    pub fn new(config: AppConfig, identity: Arc<dyn IdentityProvider>, upstream: Arc<dyn UpstreamLogin>) -> Self {
        Self { config: Arc::new(config), identity, upstream }
    }

    /// Production wiring: Clerk for identity, HTTP for the upstream login API.
    pub fn from_config(config: AppConfig) -> Self {
        let identity = Arc::new(ClerkClient::from_config(&config));
        let upstream = Arc::new(HttpUpstreamLogin::from_config(&config));
        Self::new(config, identity, upstream)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "skinadmin ok" }))
        .route("/admin-auth", any(admin_auth))
        .route("/clerk-users", any(clerk_users))
        .with_state(state)
}

fn log_startup_config(cfg: &AppConfig) {
    // presence only; never log credential values
    info!(
        target: "startup",
        "skinadmin starting: http_port={}, api_url={:?}, clerk_api_url={}, admin_email_set={}, admin_password_set={}, clerk_secret_set={}, role_email_substring={}",
        cfg.http_port,
        cfg.api_url,
        cfg.clerk_api_url,
        cfg.admin_email.is_some(),
        cfg.admin_password.is_some(),
        cfg.clerk_secret_key.is_some(),
        cfg.role_policy.match_email_substring,
    );
    if cfg.operator_credentials().is_none() {
        warn!(target: "startup", "ADMIN_EMAIL/ADMIN_PASSWORD not set; /admin-auth will answer 500");
    }
    if cfg.clerk_secret_key.is_none() {
        warn!(target: "startup", "CLERK_SECRET_KEY not set; identity calls will fail");
    }
}

pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn run_with_config(config: AppConfig) -> anyhow::Result<()> {
    log_startup_config(&config);
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let state = AppState::from_config(config);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(AppConfig::from_env()).await
}

fn respond(res: AppResult<Value>) -> Response {
    match res {
        Ok(v) => (StatusCode::OK, Json(v)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn admin_auth(State(state): State<AppState>, method: Method, headers: HeaderMap) -> Response {
    respond(exchange_operator_token(&state, &method, &headers).await)
}

async fn exchange_operator_token(state: &AppState, method: &Method, headers: &HeaderMap) -> AppResult<Value> {
    if method != Method::POST {
        return Err(AppError::method_not_allowed());
    }
    let user_id = match state.identity.verify_request(headers).await {
        Ok(Some(uid)) => uid,
        Ok(None) => return Err(AppError::unauthorized()),
        Err(e) => {
            error!(target: "admin_auth", "session verification failed: {e:#}");
            return Err(AppError::unexpected(INTERNAL_ERROR));
        }
    };
    let Some((email, password)) = state.config.operator_credentials() else {
        error!(target: "admin_auth", "operator credentials missing");
        return Err(AppError::config_missing(CREDENTIALS_MISSING));
    };
    let reply = match state.upstream.login(email, password).await {
        Ok(r) => r,
        Err(e) => {
            if let Some(app) = e.downcast_ref::<AppError>() {
                error!(target: "admin_auth", "upstream login unavailable: {}", app);
                return Err(app.clone());
            }
            error!(target: "admin_auth", "upstream login failed: {e:#}");
            return Err(AppError::unexpected(INTERNAL_ERROR));
        }
    };
    if !reply.is_success() {
        warn!(target: "admin_auth", status = reply.status, user_id = %user_id, "backend rejected operator credentials");
        return Err(AppError::upstream_rejected(BACKEND_REJECTED));
    }
    info!(target: "admin_auth", user_id = %user_id, "backend token issued");
    let token = reply.body.get("token").cloned().unwrap_or(Value::Null);
    let user = reply.body.get("user").cloned().unwrap_or(Value::Null);
    Ok(json!({"success": true, "token": token, "user": user}))
}

pub async fn clerk_users(State(state): State<AppState>, method: Method) -> Response {
    respond(fetch_user_directory(&state, &method).await)
}

async fn fetch_user_directory(state: &AppState, method: &Method) -> AppResult<Value> {
    if method != Method::GET {
        return Err(AppError::method_not_allowed());
    }
    state.identity.list_users(USER_LIST_LIMIT).await.map_err(|e| {
        error!(target: "clerk_users", "user listing failed: {e:#}");
        AppError::unexpected(USERS_FAILED)
    })
}
