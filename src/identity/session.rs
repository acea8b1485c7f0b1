//! Session guard for the admin panel.
//!
//! The guard is driven explicitly: every time the session snapshot or the
//! current route changes, call [`SessionGuard::observe`] and apply the
//! redirect it returns. [`AdminAuth`] does this wiring for a session source
//! and a navigator.

use anyhow::Result;
use tracing::warn;

use crate::tprintln;

use super::authorizer::RolePolicy;
use super::principal::AdminUser;
use super::provider::{SessionSnapshot, SessionSource};

pub const ROOT_PATH: &str = "/";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Authenticated,
    Unauthenticated,
}

impl GuardState {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        match (snapshot.loaded, snapshot.user.is_some()) {
            (false, _) => GuardState::Loading,
            (true, true) => GuardState::Authenticated,
            (true, false) => GuardState::Unauthenticated,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionGuard {
    state: GuardState,
    last_input: Option<(GuardState, String)>,
}

impl Default for SessionGuard {
    fn default() -> Self { Self { state: GuardState::Loading, last_input: None } }
}

impl SessionGuard {
    pub fn new() -> Self { Self::default() }

    pub fn state(&self) -> GuardState { self.state }

    /// Returns the path to redirect to, if any. Re-evaluates only when the
    /// state or the path differs from the previous observation.
    pub fn observe(&mut self, snapshot: &SessionSnapshot, path: &str) -> Option<&'static str> {
        let state = GuardState::from_snapshot(snapshot);
        self.state = state;
        let input = (state, path.to_string());
        if self.last_input.as_ref() == Some(&input) {
            return None;
        }
        self.last_input = Some(input);
        if state == GuardState::Unauthenticated && path != ROOT_PATH {
            tprintln!("guard.redirect from={} to={}", path, ROOT_PATH);
            return Some(ROOT_PATH);
        }
        None
    }
}

/// Client-side routing capability.
pub trait Navigator {
    fn current_path(&self) -> &str;
    fn push(&mut self, path: &str);
    fn replace(&mut self, path: &str);
}

/// In-process navigation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new(initial: &str) -> Self { Self { entries: vec![initial.to_string()] } }
    pub fn entries(&self) -> &[String] { &self.entries }
}

impl Navigator for History {
    fn current_path(&self) -> &str {
        self.entries.last().map(String::as_str).unwrap_or(ROOT_PATH)
    }
    fn push(&mut self, path: &str) { self.entries.push(path.to_string()); }
    fn replace(&mut self, path: &str) {
        match self.entries.last_mut() {
            Some(last) => *last = path.to_string(),
            None => self.entries.push(path.to_string()),
        }
    }
}

/// Admin auth state for one browser context: current user view, admin flag,
/// load state, and login/logout actions.
pub struct AdminAuth<S, N> {
    source: S,
    navigator: N,
    policy: RolePolicy,
    guard: SessionGuard,
    snapshot: SessionSnapshot,
}

impl<S: SessionSource, N: Navigator> AdminAuth<S, N> {
    pub fn new(source: S, navigator: N, policy: RolePolicy) -> Self {
        Self { source, navigator, policy, guard: SessionGuard::new(), snapshot: SessionSnapshot::default() }
    }

    /// Pull the provider's current state and run the guard.
    pub async fn refresh(&mut self) -> Result<()> {
        self.snapshot = self.source.current_user().await?;
        self.check();
        Ok(())
    }

    /// Follow an in-app link and run the guard against the new route.
    pub fn navigate(&mut self, path: &str) {
        self.navigator.push(path);
        self.check();
    }

    pub fn user(&self) -> Option<AdminUser> {
        AdminUser::from_session(self.snapshot.user.as_ref(), &self.policy)
    }

    pub fn is_admin(&self) -> bool { self.policy.is_admin(self.snapshot.user.as_ref()) }

    pub fn loading(&self) -> bool { !self.snapshot.loaded }

    pub fn guard_state(&self) -> GuardState { self.guard.state() }

    pub fn navigator(&self) -> &N { &self.navigator }

    pub fn login(&mut self) {
        self.navigate(DASHBOARD_PATH);
    }

    /// Signs out at the provider, then always redirects to the root path.
    /// The sign-out error, if any, is returned after the redirect.
    pub async fn logout(&mut self) -> Result<()> {
        let res = self.source.sign_out().await;
        match &res {
            Ok(()) => self.snapshot = SessionSnapshot { loaded: true, user: None },
            Err(e) => warn!(target: "identity", "sign-out failed: {e:#}"),
        }
        self.navigator.replace(ROOT_PATH);
        self.check();
        res
    }

    fn check(&mut self) {
        if let Some(to) = self.guard.observe(&self.snapshot, self.navigator.current_path()) {
            self.navigator.replace(to);
            // sync the guard with the route it just produced
            self.guard.observe(&self.snapshot, self.navigator.current_path());
        }
    }
}
