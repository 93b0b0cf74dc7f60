//! Search orchestration.
//!
//! A query with structured filters goes to `POST /api/search/advanced`; any
//! other query to `GET /api/search/interactions`. Results are read through the
//! tenant cache and published on a watch channel. Every call takes a ticket;
//! a response whose ticket is no longer the latest is dropped unpublished.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use ims_cache::{CacheKey, ResourceKind, TenantCache};
use ims_core::models::{SearchFilter, SearchQuery, SearchResults, SortDirection};
use ims_core::{ImsError, SiteId, TenantContext};
use ims_http::{endpoints, ApiClient, ApiRequest};
use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::mapping::RawSearchResponse;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The results were published.
    Applied(SearchResults),
    /// A newer search was issued while this one was in flight.
    Stale,
}

impl SearchOutcome {
    pub fn applied(self) -> Option<SearchResults> {
        match self {
            SearchOutcome::Applied(r) => Some(r),
            SearchOutcome::Stale => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, SearchOutcome::Stale)
    }
}

#[derive(Serialize)]
struct AdvancedSearchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    filters: &'a [SearchFilter],
    page: u32,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_field: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_direction: Option<SortDirection>,
}

pub struct SearchService {
    api: ApiClient,
    cache: Arc<TenantCache>,
    ttl: Duration,
    advanced_enabled: bool,
    latest: AtomicU64,
    results: watch::Sender<SearchResults>,
}

impl SearchService {
    pub fn new(api: ApiClient, cache: Arc<TenantCache>, ttl: Duration, advanced_enabled: bool) -> Self {
        let (results, _) = watch::channel(SearchResults::empty(SearchQuery::default(), None));
        Self {
            api,
            cache,
            ttl,
            advanced_enabled,
            latest: AtomicU64::new(0),
            results,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.results.subscribe()
    }

    pub fn stream(&self) -> WatchStream<SearchResults> {
        WatchStream::new(self.subscribe())
    }

    /// Last published results.
    pub fn current(&self) -> SearchResults {
        self.results.borrow().clone()
    }

    /// Forget cached searches for `site`, or for every site.
    pub fn invalidate(&self, site: Option<&SiteId>) -> usize {
        self.cache.invalidate(ResourceKind::Search, site)
    }

    /// Supersede any in-flight search and publish an empty result set.
    pub fn reset(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
        self.results
            .send_replace(SearchResults::empty(SearchQuery::default(), None));
    }

    fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    pub async fn search(&self, ctx: &TenantContext, query: SearchQuery) -> Result<SearchOutcome> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        if query.is_advanced() && !self.advanced_enabled {
            let err = ImsError::bad_request("Advanced search is disabled");
            self.results
                .send_replace(SearchResults::empty(query, Some(err.user_message())));
            return Err(err.into_anyhow());
        }

        let key = CacheKey::for_search(ctx, &query);
        if let Some(hit) = key.as_ref().and_then(|k| self.cache.get_as::<SearchResults>(k)) {
            debug!(ticket, query = %query.canonical_key(), "search served from cache");
            self.results.send_replace(hit.clone());
            return Ok(SearchOutcome::Applied(hit));
        }

        self.results.send_replace(SearchResults::loading(query.clone()));

        let generation = key.as_ref().map(|k| self.cache.generation(k));
        let started = Instant::now();
        let fetched = self.fetch(ctx, &query).await;

        let results = match fetched {
            Ok(raw) => {
                let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                raw.into_results(query, elapsed)
            }
            Err(err) => {
                if !self.is_latest(ticket) {
                    debug!(ticket, "dropping error from superseded search");
                    return Ok(SearchOutcome::Stale);
                }
                let message = ImsError::user_message_for(&err);
                warn!(ticket, error = %err, "search failed");
                self.results.send_replace(SearchResults::empty(query, Some(message)));
                return Err(err);
            }
        };

        // The response is valid for its own key even when superseded by a
        // newer search, but not once a write has invalidated the scope.
        if let (Some(key), Some(generation)) = (key, generation) {
            self.cache.set_from_if_generation(key, &results, self.ttl, generation);
        }

        if !self.is_latest(ticket) {
            debug!(ticket, "discarding stale search response");
            return Ok(SearchOutcome::Stale);
        }

        self.results.send_replace(results.clone());
        Ok(SearchOutcome::Applied(results))
    }

    async fn fetch(&self, ctx: &TenantContext, query: &SearchQuery) -> Result<RawSearchResponse> {
        let req = if query.is_advanced() {
            ApiRequest::post(endpoints::SEARCH_ADVANCED).with_json(&AdvancedSearchBody {
                query: query.term(),
                filters: &query.filters,
                page: query.page,
                page_size: query.page_size,
                sort_field: query.sort_field.as_deref(),
                sort_direction: query.sort_direction,
            })?
        } else {
            ApiRequest::get(endpoints::SEARCH_INTERACTIONS)
                .with_query("q", query.term().unwrap_or(""))
                .with_query("page", query.page)
                .with_query("page_size", query.page_size)
                .with_optional_query("sort_field", query.sort_field.as_deref())
                .with_optional_query("sort_direction", query.sort_direction.map(|d| d.as_str()))
        };

        self.api.request(ctx, req).await
    }
}
