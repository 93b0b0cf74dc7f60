use std::fmt;

use ims_core::models::SearchQuery;
use ims_core::{SiteId, TenantContext};

/// Resource class a cache entry belongs to. Invalidation is per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Interactions,
    Search,
    Dashboard,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Interactions,
        ResourceKind::Search,
        ResourceKind::Dashboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Interactions => "interactions",
            ResourceKind::Search => "search",
            ResourceKind::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(resource, site, query key, page, page size)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: ResourceKind,
    pub site_id: SiteId,
    pub query_key: String,
    pub page: u32,
    pub page_size: u32,
}

impl CacheKey {
    pub fn new(
        resource: ResourceKind,
        site_id: SiteId,
        query_key: impl Into<String>,
        page: u32,
        page_size: u32,
    ) -> Self {
        Self {
            resource,
            site_id,
            query_key: query_key.into(),
            page,
            page_size,
        }
    }

    /// Key for a search, or `None` when no site is active.
    pub fn for_search(ctx: &TenantContext, query: &SearchQuery) -> Option<Self> {
        let site = ctx.site()?.clone();
        Some(Self::new(
            ResourceKind::Search,
            site,
            query.canonical_key(),
            query.page,
            query.page_size,
        ))
    }

    /// Key for a single record fetched by id.
    pub fn for_record(resource: ResourceKind, ctx: &TenantContext, id: &str) -> Option<Self> {
        let site = ctx.site()?.clone();
        Some(Self::new(resource, site, format!("id:{id}"), 0, 0))
    }

    /// Key for one page of a list.
    pub fn for_page(
        resource: ResourceKind,
        ctx: &TenantContext,
        query_key: impl Into<String>,
        page: u32,
        page_size: u32,
    ) -> Option<Self> {
        let site = ctx.site()?.clone();
        Some(Self::new(resource, site, query_key, page, page_size))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.resource, self.site_id, self.query_key, self.page, self.page_size
        )
    }
}
