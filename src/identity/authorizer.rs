use serde::{Deserialize, Serialize};

use super::principal::SessionUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Inputs to the admin determination besides the session itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    /// Exact address always treated as admin.
    pub admin_email: Option<String>,
    /// Treat any email containing "admin" as admin. This also matches
    /// addresses like `badminton@co.com`; kept on by default to match the
    /// storefront's existing behavior.
    pub match_email_substring: bool,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self { admin_email: None, match_email_substring: true }
    }
}

impl RolePolicy {
    /// First match wins: role claim, email substring, configured address.
    pub fn is_admin(&self, user: Option<&SessionUser>) -> bool {
        let Some(u) = user else { return false; };
        if u.role.as_deref() == Some("admin") {
            return true;
        }
        let Some(email) = u.email.as_deref() else { return false; };
        if self.match_email_substring && email.contains("admin") {
            return true;
        }
        self.admin_email.as_deref() == Some(email)
    }

    pub fn role_for(&self, user: Option<&SessionUser>) -> Role {
        if self.is_admin(user) { Role::Admin } else { Role::User }
    }
}
