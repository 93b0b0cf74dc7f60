//! Site-scoped tenant context and the session that produces it.
//!
//! Every service call takes a [`TenantContext`] explicitly. The context is a
//! snapshot taken from the [`SessionStore`] at call time, so a site switch
//! between two calls is always observed by the second one.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

/// Identifier of a site (the tenant that owns interaction records).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub String);

impl SiteId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SiteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The logged-in user as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Context carried into every service call.
#[derive(Debug, Clone, Default)]
pub struct TenantContext {
    pub site_id: Option<SiteId>,
    pub user: Option<UserIdentity>,
    pub request_id: Option<String>,
}

impl TenantContext {
    /// Context for a given site with no user attached.
    pub fn new<S: Into<String>>(site: S) -> Self {
        Self {
            site_id: Some(SiteId(site.into())),
            user: None,
            request_id: None,
        }
    }

    /// Context with no site, used for site-independent endpoints.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: UserIdentity) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Return the existing request id or mint a fresh one.
    pub fn request_id_or_new(&self) -> String {
        self.request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    pub fn site(&self) -> Option<&SiteId> {
        self.site_id.as_ref()
    }
}

/// Global authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    LoggedOut,
    LoggedIn,
    /// A request came back 401; the user must log in again.
    Expired,
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub auth: AuthState,
    pub user: Option<UserIdentity>,
    pub site_id: Option<SiteId>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            auth: AuthState::LoggedOut,
            user: None,
            site_id: None,
        }
    }
}

/// Session provider with an explicit lifecycle:
/// `begin` at login, `select_site` at site selection, `clear` at logout.
///
/// Subscribers are notified of every change through a watch channel.
pub struct SessionStore {
    tx: watch::Sender<SessionSnapshot>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self { tx }
    }

    pub fn begin(&self, user: UserIdentity) {
        self.tx.send_modify(|s| {
            s.auth = AuthState::LoggedIn;
            s.user = Some(user);
            s.site_id = None;
        });
    }

    /// Set the active site, returning the previously active one.
    pub fn select_site(&self, site: SiteId) -> Option<SiteId> {
        let mut previous = None;
        self.tx.send_modify(|s| {
            previous = s.site_id.replace(site);
        });
        previous
    }

    pub fn clear(&self) {
        self.tx.send_replace(SessionSnapshot::default());
    }

    /// Drop the session after the server rejected our credentials.
    pub fn expire(&self) {
        self.tx.send_modify(|s| {
            s.auth = AuthState::Expired;
            s.user = None;
            s.site_id = None;
        });
    }

    pub fn auth_state(&self) -> AuthState {
        self.tx.borrow().auth
    }

    pub fn current_site(&self) -> Option<SiteId> {
        self.tx.borrow().site_id.clone()
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.tx.borrow().user.clone()
    }

    /// Snapshot the session into a context for one call.
    pub fn context(&self) -> TenantContext {
        let s = self.tx.borrow();
        TenantContext {
            site_id: s.site_id.clone(),
            user: s.user.clone(),
            request_id: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserIdentity {
        UserIdentity {
            id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            name: Some("Ada".to_string()),
        }
    }

    #[test]
    fn context_reflects_site_at_call_time() {
        let session = SessionStore::new();
        session.begin(user());
        session.select_site(SiteId::new("A"));
        let first = session.context();

        let previous = session.select_site(SiteId::new("B"));
        let second = session.context();

        assert_eq!(previous, Some(SiteId::new("A")));
        assert_eq!(first.site_id, Some(SiteId::new("A")));
        assert_eq!(second.site_id, Some(SiteId::new("B")));
    }

    #[test]
    fn expire_drops_user_and_site() {
        let session = SessionStore::new();
        session.begin(user());
        session.select_site(SiteId::new("A"));

        session.expire();

        assert_eq!(session.auth_state(), AuthState::Expired);
        assert!(session.current_user().is_none());
        assert!(session.current_site().is_none());
    }

    #[tokio::test]
    async fn subscribers_see_logout() {
        let session = SessionStore::new();
        let mut rx = session.subscribe();
        session.begin(user());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().auth, AuthState::LoggedIn);

        session.clear();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().auth, AuthState::LoggedOut);
    }
}
