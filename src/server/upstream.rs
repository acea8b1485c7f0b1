//! Upstream login API: the storefront backend's own authentication endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::error::AppError;

pub const UPSTREAM_LOGIN_PATH: &str = "/auth/login";

/// Status and body of one upstream login attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Value,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

#[async_trait]
pub trait UpstreamLogin: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<UpstreamReply>;
}

#[derive(Clone)]
pub struct HttpUpstreamLogin {
    base: Option<String>,
    client: reqwest::Client,
}

impl HttpUpstreamLogin {
    pub fn new(base: Option<String>) -> Self {
        Self { base: base.map(|b| b.trim_end_matches('/').to_string()), client: reqwest::Client::new() }
    }

    pub fn from_config(cfg: &AppConfig) -> Self { Self::new(cfg.api_url.clone()) }
}

#[async_trait]
impl UpstreamLogin for HttpUpstreamLogin {
    async fn login(&self, email: &str, password: &str) -> Result<UpstreamReply> {
        let Some(base) = self.base.as_deref() else {
            return Err(AppError::config_missing("API URL not configured").into());
        };
        let url = format!("{base}{UPSTREAM_LOGIN_PATH}");
        let resp = self.client
            .post(&url)
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let status = resp.status();
        let body = if status.is_success() {
            resp.json::<Value>().await.context("malformed upstream login response")?
        } else {
            resp.json::<Value>().await.unwrap_or(Value::Null)
        };
        Ok(UpstreamReply { status: status.as_u16(), body })
    }
}
