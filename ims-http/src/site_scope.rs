use anyhow::Result;
use async_trait::async_trait;
use ims_core::TenantContext;
use serde_json::Value;
use tracing::warn;

use crate::hooks::RequestHook;
use crate::request::ApiRequest;

pub const SITE_ID_FIELD: &str = "site_id";

/// Paths that are never attributed to a site.
pub const DEFAULT_EXCLUDED_PATHS: &[&str] = &["/auth/", "/users/sites"];

/// What [`SiteScopeHook::apply`] did to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOutcome {
    /// Path is on the exclusion list; request untouched.
    Excluded,
    /// The request already names a site.
    AlreadyScoped,
    /// `site_id` appended to the query string.
    Query,
    /// `site_id` injected into the JSON body.
    Body,
    /// No active site; request sent unmodified.
    NoSite,
}

/// Attributes every outbound data request to the active site.
///
/// - reads and deletes get a `site_id` query parameter
/// - writes with a JSON object body get a `site_id` body field
/// - writes without an object body fall back to the query parameter
#[derive(Debug, Clone)]
pub struct SiteScopeHook {
    excluded: Vec<String>,
}

impl Default for SiteScopeHook {
    fn default() -> Self {
        Self {
            excluded: DEFAULT_EXCLUDED_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SiteScopeHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_excluded(mut self, fragment: impl Into<String>) -> Self {
        self.excluded.push(fragment.into());
        self
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded.iter().any(|frag| path.contains(frag.as_str()))
    }

    pub fn apply(&self, req: &mut ApiRequest, ctx: &TenantContext) -> ScopeOutcome {
        if self.is_excluded(&req.path) {
            return ScopeOutcome::Excluded;
        }

        let Some(site) = ctx.site() else {
            warn!(method = %req.method, path = %req.path, "no active site; sending request without site_id");
            return ScopeOutcome::NoSite;
        };

        if req.has_query(SITE_ID_FIELD) {
            return ScopeOutcome::AlreadyScoped;
        }

        if req.is_write() {
            if let Some(Value::Object(body)) = req.body.as_mut() {
                if body.contains_key(SITE_ID_FIELD) {
                    return ScopeOutcome::AlreadyScoped;
                }
                body.insert(SITE_ID_FIELD.to_string(), Value::String(site.to_string()));
                return ScopeOutcome::Body;
            }
        }

        req.query.push((SITE_ID_FIELD.to_string(), site.to_string()));
        ScopeOutcome::Query
    }
}

#[async_trait]
impl RequestHook for SiteScopeHook {
    async fn before(&self, req: &mut ApiRequest, ctx: &TenantContext) -> Result<()> {
        self.apply(req, ctx);
        Ok(())
    }
}
