//! Clerk backend API client.
//!
//! Session tokens are Clerk session JWTs signed with RS256. A token counts
//! only when its signature verifies against the instance key (`CLERK_JWT_KEY`
//! or the instance JWKS), its `exp`/`nbf` window holds, and Clerk still
//! reports the session in `sid` as active for the same `sub`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::AppConfig;

use super::principal::SessionUser;
use super::provider::{session_token_from_headers, IdentityProvider, SessionSnapshot, SessionSource};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,
    pub sid: String,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: Option<String>,
    kty: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

fn session_validation() -> Validation {
    let mut v = Validation::new(Algorithm::RS256);
    v.validate_nbf = true;
    v.validate_aud = false;
    v.set_required_spec_claims(&["exp", "sub"]);
    v
}

#[derive(Debug, Deserialize)]
struct ClerkSession {
    status: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ClerkEmail {
    id: String,
    email_address: String,
}

#[derive(Debug, Default, Deserialize)]
struct ClerkMetadata {
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClerkUser {
    id: String,
    #[serde(default)]
    primary_email_address_id: Option<String>,
    #[serde(default)]
    email_addresses: Vec<ClerkEmail>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    public_metadata: Option<ClerkMetadata>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    updated_at: Option<i64>,
}

impl From<ClerkUser> for SessionUser {
    fn from(u: ClerkUser) -> Self {
        let email = u
            .email_addresses
            .iter()
            .find(|e| Some(&e.id) == u.primary_email_address_id.as_ref())
            .or_else(|| u.email_addresses.first())
            .map(|e| e.email_address.clone());
        let name = match (u.first_name.as_deref(), u.last_name.as_deref()) {
            (Some(f), Some(l)) => Some(format!("{f} {l}")),
            (Some(f), None) => Some(f.to_string()),
            (None, Some(l)) => Some(l.to_string()),
            (None, None) => u.username.clone(),
        };
        SessionUser {
            id: u.id,
            email,
            name,
            first_name: u.first_name,
            last_name: u.last_name,
            role: u.public_metadata.and_then(|m| m.role),
            image_url: u.image_url,
            created_at: u.created_at.and_then(DateTime::<Utc>::from_timestamp_millis),
            updated_at: u.updated_at.and_then(DateTime::<Utc>::from_timestamp_millis),
        }
    }
}

#[derive(Clone)]
pub struct ClerkClient {
    base: String,
    secret_key: Option<String>,
    /// PEM public key; when unset the JWKS endpoint is consulted per token.
    jwt_key: Option<String>,
    client: reqwest::Client,
}

impl ClerkClient {
    pub fn new(base: &str, secret_key: Option<String>) -> Self {
        Self { base: base.trim_end_matches('/').to_string(), secret_key, jwt_key: None, client: reqwest::Client::new() }
    }

    pub fn with_jwt_key(mut self, pem: Option<String>) -> Self {
        self.jwt_key = pem;
        self
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(&cfg.clerk_api_url, cfg.clerk_secret_key.clone()).with_jwt_key(cfg.clerk_jwt_key.clone())
    }

    fn secret(&self) -> Result<&str> {
        self.secret_key.as_deref().ok_or_else(|| anyhow!("CLERK_SECRET_KEY not configured"))
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base, path);
        let resp = self.client.get(&url).bearer_auth(self.secret()?).send().await
            .with_context(|| format!("GET {url}"))?;
        Ok(resp)
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<Option<DecodingKey>> {
        if let Some(pem) = self.jwt_key.as_deref() {
            return DecodingKey::from_rsa_pem(pem.as_bytes()).map(Some).context("invalid CLERK_JWT_KEY");
        }
        let resp = self.get("/v1/jwks").await?;
        if !resp.status().is_success() {
            return Err(anyhow!("jwks fetch failed: HTTP {}", resp.status()));
        }
        let jwks: Jwks = resp.json().await.context("malformed jwks payload")?;
        let Some(jwk) = jwks.keys.iter().filter(|k| k.kty == "RSA").find(|k| kid.is_none() || k.kid.as_deref() == kid) else {
            return Ok(None);
        };
        DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map(Some).context("malformed jwks key")
    }

    /// Claims of a correctly signed, unexpired session token. `Ok(None)` for
    /// any token that fails verification; `Err` only when no key could be loaded.
    pub async fn verify_token(&self, token: &str) -> Result<Option<SessionClaims>> {
        let header = match decode_header(token) {
            Ok(h) => h,
            Err(e) => {
                debug!(target: "identity", "unparseable session token: {e}");
                return Ok(None);
            }
        };
        if header.alg != Algorithm::RS256 {
            debug!(target: "identity", alg = ?header.alg, "unexpected session token algorithm");
            return Ok(None);
        }
        let Some(key) = self.decoding_key(header.kid.as_deref()).await? else {
            debug!(target: "identity", kid = ?header.kid, "no signing key for session token");
            return Ok(None);
        };
        match decode::<SessionClaims>(token, &key, &session_validation()) {
            Ok(data) => Ok(Some(data.claims)),
            Err(e) => {
                debug!(target: "identity", "session token rejected: {e}");
                Ok(None)
            }
        }
    }

    /// Verified claims whose session Clerk still reports active.
    pub async fn authenticate(&self, token: &str) -> Result<Option<SessionClaims>> {
        let Some(claims) = self.verify_token(token).await? else { return Ok(None); };
        Ok(self.verify_session(&claims).await?.map(|_| claims))
    }

    /// Active session's user id, `None` for unknown or inactive sessions.
    pub async fn verify_session(&self, claims: &SessionClaims) -> Result<Option<String>> {
        let resp = self.get(&format!("/v1/sessions/{}", urlencoding::encode(&claims.sid))).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(anyhow!("session lookup failed: HTTP {}", resp.status()));
        }
        let sess: ClerkSession = resp.json().await.context("malformed session payload")?;
        if sess.status == "active" && sess.user_id == claims.sub {
            Ok(Some(sess.user_id))
        } else {
            debug!(target: "identity", sid = %claims.sid, status = %sess.status, "session not active");
            Ok(None)
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<SessionUser> {
        let resp = self.get(&format!("/v1/users/{}", urlencoding::encode(user_id))).await?;
        if !resp.status().is_success() {
            return Err(anyhow!("user lookup failed: HTTP {}", resp.status()));
        }
        let user: ClerkUser = resp.json().await.context("malformed user payload")?;
        Ok(user.into())
    }

    pub async fn revoke_session(&self, sid: &str) -> Result<()> {
        let url = format!("{}/v1/sessions/{}/revoke", self.base, urlencoding::encode(sid));
        let resp = self.client.post(&url).bearer_auth(self.secret()?).send().await
            .with_context(|| format!("POST {url}"))?;
        if !resp.status().is_success() {
            return Err(anyhow!("session revoke failed: HTTP {}", resp.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    async fn verify_request(&self, headers: &HeaderMap) -> Result<Option<String>> {
        let Some(token) = session_token_from_headers(headers) else { return Ok(None); };
        Ok(self.authenticate(&token).await?.map(|c| c.sub))
    }

    async fn list_users(&self, limit: u32) -> Result<serde_json::Value> {
        let resp = self.get(&format!("/v1/users?limit={limit}")).await?;
        if !resp.status().is_success() {
            return Err(anyhow!("user list failed: HTTP {}", resp.status()));
        }
        resp.json().await.context("malformed user list payload")
    }
}

/// Session source bound to one browser's session token.
pub struct ClerkSessionSource {
    client: ClerkClient,
    token: Option<String>,
}

impl ClerkSessionSource {
    pub fn new(client: ClerkClient, token: Option<String>) -> Self { Self { client, token } }
}

#[async_trait]
impl SessionSource for ClerkSessionSource {
    async fn current_user(&self) -> Result<SessionSnapshot> {
        let Some(token) = self.token.as_deref() else {
            return Ok(SessionSnapshot { loaded: true, user: None });
        };
        let user = match self.client.authenticate(token).await? {
            Some(claims) => Some(self.client.get_user(&claims.sub).await?),
            None => None,
        };
        Ok(SessionSnapshot { loaded: true, user })
    }

    async fn sign_out(&self) -> Result<()> {
        let Some(token) = self.token.as_deref() else { return Ok(()); };
        match self.client.verify_token(token).await? {
            Some(claims) => self.client.revoke_session(&claims.sid).await,
            None => Ok(()),
        }
    }
}
