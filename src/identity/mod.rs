//! Identity, role resolution and session guarding for the admin panel.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod authorizer;
mod clerk;

pub use principal::{SessionUser, AdminUser};
pub use session::{SessionGuard, GuardState, Navigator, History, AdminAuth, ROOT_PATH, DASHBOARD_PATH};
pub use provider::{SessionSnapshot, SessionSource, IdentityProvider, session_token_from_headers, SESSION_COOKIE};
pub use authorizer::{Role, RolePolicy};
pub use clerk::{ClerkClient, ClerkSessionSource, SessionClaims};
