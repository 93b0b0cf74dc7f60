use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use ims_cache::{CacheKey, ResourceKind, TenantCache};
use ims_core::models::{Interaction, InteractionInput, ListParams, Page};
use ims_core::{EventHub, RecordService, ServiceEvent, ServiceMethodKind, SiteId, TenantContext};
use ims_http::{endpoints, ApiClient, ApiRequest};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::activity::{ActivityEntry, ActivityLogger};

pub const INTERACTIONS_SERVICE: &str = "interactions";

const LIST_QUERY_KEY: &str = "list";

/// Drop every cached view a write to `site` can affect. With no site, the
/// entries of all sites go.
pub fn invalidate_site_views(cache: &TenantCache, site: Option<&SiteId>) -> usize {
    ResourceKind::ALL
        .into_iter()
        .map(|kind| cache.invalidate(kind, site))
        .sum()
}

/// List endpoints answer either with a page envelope or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<Interaction>),
    Paged {
        #[serde(alias = "interactions", alias = "results")]
        items: Vec<Interaction>,
        #[serde(default)]
        total: Option<u64>,
        #[serde(default)]
        page: Option<u32>,
        #[serde(default)]
        page_size: Option<u32>,
    },
}

impl ListResponse {
    fn into_page(self, params: ListParams) -> Page<Interaction> {
        match self {
            ListResponse::Paged {
                items,
                total,
                page,
                page_size,
            } => Page {
                total: total.unwrap_or(items.len() as u64),
                page: page.unwrap_or(params.page),
                page_size: page_size.unwrap_or(params.page_size),
                items,
            },
            ListResponse::Bare(items) => Page {
                total: items.len() as u64,
                page: params.page,
                page_size: params.page_size,
                items,
            },
        }
    }
}

/// CRUD over `/api/interactions`, read through the tenant cache.
pub struct InteractionService {
    api: ApiClient,
    cache: Arc<TenantCache>,
    events: Arc<EventHub>,
    activity: Option<ActivityLogger>,
    ttl: Duration,
}

impl InteractionService {
    pub fn new(api: ApiClient, cache: Arc<TenantCache>, events: Arc<EventHub>, ttl: Duration) -> Self {
        Self {
            api,
            cache,
            events,
            activity: None,
            ttl,
        }
    }

    pub fn with_activity(mut self, logger: ActivityLogger) -> Self {
        self.activity = Some(logger);
        self
    }

    pub async fn list(&self, ctx: &TenantContext, params: ListParams) -> Result<Page<Interaction>> {
        self.find(ctx, params).await
    }

    /// Runs after the server confirmed a write, before the caller sees success.
    fn after_mutation(&self, ctx: &TenantContext, method: ServiceMethodKind, id: &str) {
        let dropped = invalidate_site_views(&self.cache, ctx.site());
        debug!(method = method.as_str(), id, dropped, "invalidated cached views");

        if let Some(kind) = method.standard_event() {
            self.events.emit(
                &ServiceEvent::new(INTERACTIONS_SERVICE, kind)
                    .for_site(ctx.site().cloned())
                    .for_record(id),
            );
        }

        if let Some(logger) = &self.activity {
            logger.record(
                ctx,
                ActivityEntry::new(method.as_str(), "interaction")
                    .with_resource_id(id)
                    .with_details(json!({ "site_id": ctx.site() })),
            );
        }
    }
}

#[async_trait]
impl RecordService<Interaction, InteractionInput, ListParams> for InteractionService {
    async fn find(&self, ctx: &TenantContext, params: ListParams) -> Result<Page<Interaction>> {
        let key = CacheKey::for_page(
            ResourceKind::Interactions,
            ctx,
            LIST_QUERY_KEY,
            params.page,
            params.page_size,
        );
        if let Some(page) = key.as_ref().and_then(|k| self.cache.get_as::<Page<Interaction>>(k)) {
            return Ok(page);
        }
        let generation = key.as_ref().map(|k| self.cache.generation(k));

        let req = ApiRequest::get(endpoints::INTERACTIONS)
            .with_query("page", params.page)
            .with_query("page_size", params.page_size);
        let page = self.api.request::<ListResponse>(ctx, req).await?.into_page(params);

        if let (Some(key), Some(generation)) = (key, generation) {
            self.cache.set_from_if_generation(key, &page, self.ttl, generation);
        }
        Ok(page)
    }

    async fn get(&self, ctx: &TenantContext, id: &str) -> Result<Interaction> {
        let key = CacheKey::for_record(ResourceKind::Interactions, ctx, id);
        if let Some(hit) = key.as_ref().and_then(|k| self.cache.get_as::<Interaction>(k)) {
            return Ok(hit);
        }
        let generation = key.as_ref().map(|k| self.cache.generation(k));

        let record: Interaction = self.api.request(ctx, ApiRequest::get(endpoints::interaction(id))).await?;
        if let (Some(key), Some(generation)) = (key, generation) {
            self.cache.set_from_if_generation(key, &record, self.ttl, generation);
        }
        Ok(record)
    }

    async fn create(&self, ctx: &TenantContext, data: InteractionInput) -> Result<Interaction> {
        let created: Interaction = self.api.post_json(ctx, endpoints::INTERACTIONS, &data).await?;
        self.after_mutation(ctx, ServiceMethodKind::Create, &created.id);
        Ok(created)
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: InteractionInput) -> Result<Interaction> {
        let updated: Interaction = self.api.put_json(ctx, &endpoints::interaction(id), &data).await?;
        self.after_mutation(ctx, ServiceMethodKind::Update, id);
        Ok(updated)
    }

    async fn remove(&self, ctx: &TenantContext, id: &str) -> Result<()> {
        self.api.delete(ctx, &endpoints::interaction(id)).await?;
        self.after_mutation(ctx, ServiceMethodKind::Remove, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "site_id": "A",
            "title": "Kickoff",
            "type": "Meeting",
            "start_datetime": "2024-03-01T09:00:00",
            "end_datetime": "2024-03-01T10:00:00",
            "timezone": "UTC",
            "created_at": "2024-02-01T00:00:00Z",
            "updated_at": "2024-02-01T00:00:00Z"
        })
    }

    #[test]
    fn bare_array_becomes_a_page() {
        let raw = json!([record("i-1"), record("i-2")]);
        let page = serde_json::from_value::<ListResponse>(raw)
            .unwrap()
            .into_page(ListParams { page: 2, page_size: 10 });
        assert_eq!(page.total, 2);
        assert_eq!(page.page, 2);
        assert_eq!(page.items[1].id, "i-2");
    }

    #[test]
    fn envelope_total_wins_over_item_count() {
        let raw = json!({"interactions": [record("i-1")], "total": 40});
        let page = serde_json::from_value::<ListResponse>(raw)
            .unwrap()
            .into_page(ListParams::default());
        assert_eq!(page.total, 40);
        assert_eq!(page.page_size, 25);
    }

    #[test]
    fn site_views_are_dropped_together() {
        let cache = TenantCache::new();
        let a = TenantContext::new("A");
        let b = TenantContext::new("B");
        for (kind, ctx) in [
            (ResourceKind::Interactions, &a),
            (ResourceKind::Search, &a),
            (ResourceKind::Dashboard, &a),
            (ResourceKind::Search, &b),
        ] {
            let key = CacheKey::for_page(kind, ctx, "k", 1, 25).unwrap();
            cache.set(key, json!(1), Duration::from_secs(60));
        }

        assert_eq!(invalidate_site_views(&cache, a.site()), 3);
        assert_eq!(cache.len(), 1);
    }
}
