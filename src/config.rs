//!
//! skinadmin configuration
//! ------------------------
//! Process-wide, immutable configuration loaded once at startup and shared
//! with every handler through `AppState`. Values come from environment
//! variables; a missing value is kept as `None` and surfaces later as the
//! documented configuration error rather than failing startup.

use crate::identity::RolePolicy;

pub const DEFAULT_HTTP_PORT: u16 = 3001;
pub const DEFAULT_CLERK_API_URL: &str = "https://api.clerk.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Operator email exchanged for a backend token (`ADMIN_EMAIL`).
    pub admin_email: Option<String>,
    /// Operator password (`ADMIN_PASSWORD`).
    pub admin_password: Option<String>,
    /// Base URL of the storefront backend (`NEXT_PUBLIC_API_URL`).
    pub api_url: Option<String>,
    /// Clerk management API secret (`CLERK_SECRET_KEY`).
    pub clerk_secret_key: Option<String>,
    /// PEM public key for session tokens (`CLERK_JWT_KEY`); JWKS is used when unset.
    pub clerk_jwt_key: Option<String>,
    pub clerk_api_url: String,
    pub role_policy: RolePolicy,
    pub http_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_email: None,
            admin_password: None,
            api_url: None,
            clerk_secret_key: None,
            clerk_jwt_key: None,
            clerk_api_url: DEFAULT_CLERK_API_URL.to_string(),
            role_policy: RolePolicy::default(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup so tests never mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let substring = lookup("ROLE_EMAIL_SUBSTRING_MATCH")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.role_policy.match_email_substring);
        Self {
            admin_email: non_empty(lookup("ADMIN_EMAIL")),
            admin_password: non_empty(lookup("ADMIN_PASSWORD")),
            api_url: non_empty(lookup("NEXT_PUBLIC_API_URL")).map(|u| u.trim_end_matches('/').to_string()),
            clerk_secret_key: non_empty(lookup("CLERK_SECRET_KEY")),
            // env files often carry the PEM with escaped newlines
            clerk_jwt_key: non_empty(lookup("CLERK_JWT_KEY")).map(|k| k.replace("\\n", "\n")),
            clerk_api_url: non_empty(lookup("CLERK_API_URL"))
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.clerk_api_url),
            role_policy: RolePolicy {
                admin_email: non_empty(lookup("ROLE_ADMIN_EMAIL")),
                match_email_substring: substring,
            },
            http_port: lookup("SKINADMIN_HTTP_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(defaults.http_port),
        }
    }

    /// Both operator credentials, or `None` when either is missing.
    pub fn operator_credentials(&self) -> Option<(&str, &str)> {
        match (self.admin_email.as_deref(), self.admin_password.as_deref()) {
            (Some(e), Some(p)) => Some((e, p)),
            _ => None,
        }
    }
}
