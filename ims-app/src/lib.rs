//! ims-app: builds every service from one [`ImsConfig`] and owns the
//! session-level operations that touch more than one of them.

use std::sync::Arc;

use anyhow::Result;
use ims_auth::{AuthService, LoginRequest, SessionExpiryHook, StoredTokens, TokenStore};
use ims_cache::TenantCache;
use ims_core::{
    EventHub, ImsConfig, ServiceEvent, ServiceEventKind, SessionStore, SiteId, TenantContext, UserIdentity,
};
use ims_http::{ApiClient, SiteScopeHook};
use ims_services::{ActivityEntry, ActivityLogger, DashboardService, InteractionService, SearchService};
use tracing::info;

pub const SESSION_SERVICE: &str = "session";

pub struct ImsApp {
    config: ImsConfig,
    cache: Arc<TenantCache>,
    session: Arc<SessionStore>,
    events: Arc<EventHub>,
    api: ApiClient,
    auth: AuthService,
    interactions: Arc<InteractionService>,
    search: SearchService,
    dashboard: DashboardService,
    activity: ActivityLogger,
}

impl ImsApp {
    pub fn new(config: ImsConfig, token_store: Arc<dyn TokenStore>) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(TenantCache::new());
        let session = Arc::new(SessionStore::new());
        let events = Arc::new(EventHub::new());
        let tokens = Arc::new(StoredTokens::new(token_store));

        let api = ApiClient::from_config(&config)?.with_token_provider(tokens.clone());
        api.add_hook(Arc::new(SiteScopeHook::new()));
        api.add_hook(Arc::new(SessionExpiryHook::new(session.clone(), tokens.clone())));

        let activity = ActivityLogger::new(api.clone(), config.features.activity_logging);
        let interactions = Arc::new(
            InteractionService::new(api.clone(), cache.clone(), events.clone(), config.cache.interactions_ttl)
                .with_activity(activity.clone()),
        );
        let search = SearchService::new(
            api.clone(),
            cache.clone(),
            config.cache.search_ttl,
            config.features.advanced_search,
        );
        let dashboard = DashboardService::new(interactions.clone(), cache.clone(), config.cache.dashboard_ttl);
        let auth = AuthService::new(
            api.clone(),
            session.clone(),
            tokens,
            config.auth.clone(),
            config.cache.sites_ttl,
        );

        info!(environment = ?config.environment, api = %config.api_base_url, "client initialized");

        Ok(Self {
            config,
            cache,
            session,
            events,
            api,
            auth,
            interactions,
            search,
            dashboard,
            activity,
        })
    }

    pub fn config(&self) -> &ImsConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TenantCache> {
        &self.cache
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn interactions(&self) -> &Arc<InteractionService> {
        &self.interactions
    }

    pub fn search(&self) -> &SearchService {
        &self.search
    }

    pub fn dashboard(&self) -> &DashboardService {
        &self.dashboard
    }

    pub fn activity(&self) -> &ActivityLogger {
        &self.activity
    }

    /// Context for the current user and site.
    pub fn context(&self) -> TenantContext {
        self.session.context()
    }

    /// Log in. Cached data from any earlier session is dropped first.
    pub async fn login(&self, request: LoginRequest) -> Result<UserIdentity> {
        self.cache.clear();
        self.search.reset();
        let user = self.auth.login(request).await?;
        self.activity.record(&self.context(), ActivityEntry::new("login", "session"));
        Ok(user)
    }

    pub fn restore(&self) -> Option<UserIdentity> {
        self.auth.restore()
    }

    /// Make `site` active. Entries cached for the previous site are
    /// invalidated and in-flight searches are superseded.
    pub async fn switch_site(&self, site: &SiteId) -> Result<()> {
        let previous = self.auth.select_site(site).await?;
        if previous.as_ref() == Some(site) {
            return Ok(());
        }

        if let Some(prev) = &previous {
            let dropped = self.cache.invalidate_site(prev);
            info!(from = %prev, to = %site, dropped, "site switched");
        }
        self.search.reset();

        self.events.emit(
            &ServiceEvent::new(SESSION_SERVICE, ServiceEventKind::SiteChanged).for_site(Some(site.clone())),
        );
        Ok(())
    }

    /// End the session and forget every cached entry.
    pub async fn logout(&self) {
        self.auth.logout().await;
        self.cache.clear();
        self.search.reset();
    }
}
