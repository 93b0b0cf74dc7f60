use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use ims_cache::{CacheKey, ResourceKind, TenantCache};
use ims_core::models::{Interaction, InteractionType, ListParams};
use ims_core::TenantContext;
use serde::{Deserialize, Serialize};

use crate::interactions::InteractionService;

const SAMPLE_SIZE: u32 = 100;
const LIST_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total: u64,
    pub by_type: BTreeMap<InteractionType, usize>,
    /// Soonest first.
    pub upcoming: Vec<Interaction>,
    /// Most recently created first.
    pub recent: Vec<Interaction>,
}

impl DashboardSummary {
    /// Summarize `items` (a sample of `total` records) as seen at `now`.
    pub fn compute(total: u64, items: &[Interaction], now: NaiveDateTime) -> Self {
        let mut by_type: BTreeMap<InteractionType, usize> =
            InteractionType::ALL.into_iter().map(|t| (t, 0)).collect();
        for i in items {
            *by_type.entry(i.interaction_type).or_default() += 1;
        }

        let mut upcoming: Vec<Interaction> =
            items.iter().filter(|i| i.start_datetime > now).cloned().collect();
        upcoming.sort_by_key(|i| i.start_datetime);
        upcoming.truncate(LIST_LIMIT);

        let mut recent = items.to_vec();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(LIST_LIMIT);

        Self {
            total,
            by_type,
            upcoming,
            recent,
        }
    }
}

pub struct DashboardService {
    interactions: Arc<InteractionService>,
    cache: Arc<TenantCache>,
    ttl: Duration,
}

impl DashboardService {
    pub fn new(interactions: Arc<InteractionService>, cache: Arc<TenantCache>, ttl: Duration) -> Self {
        Self {
            interactions,
            cache,
            ttl,
        }
    }

    pub async fn summary(&self, ctx: &TenantContext) -> Result<DashboardSummary> {
        self.summary_at(ctx, Utc::now().naive_utc()).await
    }

    pub async fn summary_at(&self, ctx: &TenantContext, now: NaiveDateTime) -> Result<DashboardSummary> {
        let key = CacheKey::for_page(ResourceKind::Dashboard, ctx, "summary", 1, SAMPLE_SIZE);
        if let Some(hit) = key.as_ref().and_then(|k| self.cache.get_as::<DashboardSummary>(k)) {
            return Ok(hit);
        }
        // The list read below may itself be cached; the summary is only stored
        // if no mutation landed while it was being computed.
        let generation = key.as_ref().map(|k| self.cache.generation(k));

        let page = self
            .interactions
            .list(
                ctx,
                ListParams {
                    page: 1,
                    page_size: SAMPLE_SIZE,
                },
            )
            .await?;
        let summary = DashboardSummary::compute(page.total, &page.items, now);

        if let (Some(key), Some(generation)) = (key, generation) {
            self.cache.set_from_if_generation(key, &summary, self.ttl, generation);
        }
        Ok(summary)
    }
}
