use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::authorizer::{Role, RolePolicy};

/// Read projection of the identity provider's session. Exists only while a
/// valid session exists and is never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    /// Primary email address.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Role claim from the provider's public metadata.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Derived view handed to the admin UI; recomputed on every refresh.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AdminUser {
    pub fn from_session(user: Option<&SessionUser>, policy: &RolePolicy) -> Option<Self> {
        let u = user?;
        let role = policy.role_for(Some(u));
        let name = u.name.clone().or_else(|| {
            let full = [u.first_name.as_deref(), u.last_name.as_deref()]
                .iter()
                .flatten()
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            if full.is_empty() { None } else { Some(full) }
        });
        Some(AdminUser {
            id: u.id.clone(),
            email: u.email.clone(),
            name,
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            image_url: u.image_url.clone(),
            role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
