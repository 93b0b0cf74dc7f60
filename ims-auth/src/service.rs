use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use ims_core::models::Site;
use ims_core::{AuthSettings, ErrorKind, ImsError, SessionStore, SiteId, TenantContext, UserIdentity};
use ims_http::{endpoints, ApiClient, ApiRequest};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::token::{StoredToken, StoredTokens};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "token", alias = "accessToken")]
    pub access_token: String,
    pub user: UserIdentity,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SitesResponse {
    Bare(Vec<Site>),
    Wrapped { sites: Vec<Site> },
}

struct CachedSites {
    sites: Vec<Site>,
    expires_at: DateTime<Utc>,
}

/// Authentication and site membership.
pub struct AuthService {
    api: ApiClient,
    session: Arc<SessionStore>,
    tokens: Arc<StoredTokens>,
    settings: AuthSettings,
    sites_ttl: std::time::Duration,
    sites: RwLock<Option<CachedSites>>,
}

impl AuthService {
    pub fn new(
        api: ApiClient,
        session: Arc<SessionStore>,
        tokens: Arc<StoredTokens>,
        settings: AuthSettings,
        sites_ttl: std::time::Duration,
    ) -> Self {
        Self {
            api,
            session,
            tokens,
            settings,
            sites_ttl,
            sites: RwLock::new(None),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn tokens(&self) -> &Arc<StoredTokens> {
        &self.tokens
    }

    pub async fn login(&self, request: LoginRequest) -> Result<UserIdentity> {
        let req = ApiRequest::post(endpoints::AUTH_LOGIN).with_json(&request)?;
        let response: LoginResponse = self
            .api
            .request(&TenantContext::anonymous(), req)
            .await
            .map_err(|err| match ImsError::from_anyhow(&err).map(|e| e.kind) {
                Some(ErrorKind::NotAuthenticated) => {
                    ImsError::unprocessable("Invalid email or password").into_anyhow()
                }
                _ => err,
            })?;

        let token = StoredToken::issue(
            response.access_token,
            response.user.clone(),
            request.remember_me,
            &self.settings,
            response.expires_in,
            Utc::now(),
        );
        self.tokens.set(token);
        *self.sites.write() = None;
        self.session.begin(response.user.clone());

        info!(user = %response.user.email, remember_me = request.remember_me, "logged in");
        Ok(response.user)
    }

    /// Resume a persisted session. Returns the user when a valid token exists.
    pub fn restore(&self) -> Option<UserIdentity> {
        let token = self.tokens.restore(Utc::now())?;
        self.session.begin(token.user.clone());
        info!(user = %token.user.email, "session restored");
        Some(token.user)
    }

    /// End the session. The server call is best-effort; local state is
    /// always cleared.
    pub async fn logout(&self) {
        let ctx = self.session.context();
        if self.tokens.current().is_some() {
            if let Err(e) = self.api.send(&ctx, ApiRequest::post(endpoints::AUTH_LOGOUT)).await {
                warn!(error = %e, "logout request failed; clearing local session anyway");
            }
        }

        self.tokens.clear();
        *self.sites.write() = None;
        self.session.clear();
        info!("logged out");
    }

    /// Sites the current user belongs to, cached for `cache.sites_ttl`.
    pub async fn load_sites(&self) -> Result<Vec<Site>> {
        let now = Utc::now();
        if let Some(cached) = self.sites.read().as_ref() {
            if cached.expires_at > now {
                return Ok(cached.sites.clone());
            }
        }

        let response: SitesResponse = self
            .api
            .request(&self.session.context(), ApiRequest::get(endpoints::USER_SITES))
            .await?;
        let sites = match response {
            SitesResponse::Bare(s) | SitesResponse::Wrapped { sites: s } => s,
        };

        let ttl = chrono::Duration::from_std(self.sites_ttl).unwrap_or(chrono::Duration::zero());
        *self.sites.write() = Some(CachedSites {
            sites: sites.clone(),
            expires_at: now.checked_add_signed(ttl).unwrap_or(now),
        });
        Ok(sites)
    }

    /// Make `site` the active site. Returns the previously active one.
    pub async fn select_site(&self, site: &SiteId) -> Result<Option<SiteId>> {
        let sites = self.load_sites().await?;
        if !sites.iter().any(|s| &s.id == site) {
            return Err(ImsError::forbidden(format!("not a member of site {site}"))
                .with_data(Value::String(site.to_string()))
                .into_anyhow());
        }

        let previous = self.session.select_site(site.clone());
        info!(site = %site, previous = ?previous, "site selected");
        Ok(previous)
    }

    pub fn current_token(&self) -> Option<StoredToken> {
        self.tokens.valid_at(Utc::now())
    }
}
