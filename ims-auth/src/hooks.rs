use std::sync::Arc;

use async_trait::async_trait;
use ims_core::{ErrorKind, ImsError, SessionStore, TenantContext};
use ims_http::{endpoints, ApiRequest, RequestHook};
use tracing::warn;

use crate::token::StoredTokens;

/// Logs the user out when any data request comes back 401.
///
/// A rejected login is a wrong password, not an expired session, so the
/// login endpoint is ignored.
pub struct SessionExpiryHook {
    session: Arc<SessionStore>,
    tokens: Arc<StoredTokens>,
}

impl SessionExpiryHook {
    pub fn new(session: Arc<SessionStore>, tokens: Arc<StoredTokens>) -> Self {
        Self { session, tokens }
    }
}

#[async_trait]
impl RequestHook for SessionExpiryHook {
    async fn on_error(&self, err: &ImsError, req: &ApiRequest, _ctx: &TenantContext) {
        if err.kind != ErrorKind::NotAuthenticated || req.path.starts_with(endpoints::AUTH_LOGIN) {
            return;
        }

        warn!(path = %req.path, "server rejected credentials; ending session");
        self.tokens.clear();
        self.session.expire();
    }
}
