use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;

use super::principal::SessionUser;

/// Provider state observed at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// False until the provider has resolved whether a session exists.
    pub loaded: bool,
    pub user: Option<SessionUser>,
}

/// Client-side view of the identity provider.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn current_user(&self) -> Result<SessionSnapshot>;
    async fn sign_out(&self) -> Result<()>;
}

/// Server-side view of the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the caller's user id from request credentials. `Ok(None)`
    /// means no valid session; `Err` means verification itself failed.
    async fn verify_request(&self, headers: &HeaderMap) -> Result<Option<String>>;
    /// Raw user-list payload, at most `limit` records.
    async fn list_users(&self, limit: u32) -> Result<serde_json::Value>;
}

pub const SESSION_COOKIE: &str = "__session";

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie")?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some((k, v)) = p.split_once('=') {
            if k == name { return Some(v.to_string()); }
        }
    }
    None
}

/// Session token from `Authorization: Bearer` or the session cookie, header first.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    bearer.or_else(|| parse_cookie(headers, SESSION_COOKIE).filter(|s| !s.is_empty()))
}
