//! Raw search responses into [`SearchResults`].
//!
//! Both search endpoints return the hits plus paging totals, either at the top
//! level or under `metadata`. Missing totals are derived from the query.

use ims_core::models::{SearchMetadata, SearchQuery, SearchResultItem, SearchResults};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default, alias = "pageSize")]
    pub page_size: Option<u32>,
    #[serde(default, alias = "total_pages")]
    pub pages: Option<u32>,
    #[serde(default, alias = "executionTimeMs", alias = "took_ms")]
    pub execution_time_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RawSearchResponse {
    #[serde(default, alias = "results", alias = "interactions")]
    pub items: Vec<SearchResultItem>,
    #[serde(default, alias = "metadata")]
    pub meta: Option<RawMetadata>,
    #[serde(flatten)]
    pub top: RawMetadata,
}

impl RawSearchResponse {
    /// `elapsed_ms` is used when the server does not report its own timing.
    pub fn into_results(self, query: SearchQuery, elapsed_ms: u64) -> SearchResults {
        let meta = self.meta.unwrap_or_default();
        let top = self.top;

        let total = meta.total.or(top.total).unwrap_or(self.items.len() as u64);
        let page = meta.page.or(top.page).unwrap_or(query.page);
        let page_size = meta.page_size.or(top.page_size).unwrap_or(query.page_size);
        let pages = meta
            .pages
            .or(top.pages)
            .unwrap_or_else(|| page_count(total, page_size));
        let execution_time_ms = meta
            .execution_time_ms
            .or(top.execution_time_ms)
            .unwrap_or(elapsed_ms);

        SearchResults {
            items: self.items,
            metadata: SearchMetadata {
                total,
                page,
                page_size,
                pages,
                execution_time_ms,
            },
            query,
            loading: false,
            error: None,
        }
    }
}

fn page_count(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    u32::try_from(total.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": "Kickoff",
            "type": "Meeting",
            "start_datetime": "2024-03-01T09:00:00",
            "end_datetime": "2024-03-01T10:00:00"
        })
    }

    #[test]
    fn top_level_totals() {
        let raw: RawSearchResponse = serde_json::from_value(json!({
            "items": [hit("1"), hit("2")],
            "total": 51,
            "page": 2,
            "page_size": 25
        }))
        .unwrap();
        let results = raw.into_results(SearchQuery::text("kick").with_page(2, 25), 7);

        assert_eq!(results.metadata.total, 51);
        assert_eq!(results.metadata.pages, 3);
        assert_eq!(results.metadata.execution_time_ms, 7);
        assert!(!results.loading);
    }

    #[test]
    fn nested_metadata_wins() {
        let raw: RawSearchResponse = serde_json::from_value(json!({
            "results": [hit("1")],
            "total": 99,
            "metadata": {"total": 1, "pages": 1, "executionTimeMs": 3}
        }))
        .unwrap();
        let results = raw.into_results(SearchQuery::default(), 50);

        assert_eq!(results.items.len(), 1);
        assert_eq!(results.metadata.total, 1);
        assert_eq!(results.metadata.execution_time_ms, 3);
    }

    #[test]
    fn empty_body_falls_back_to_the_query() {
        let raw: RawSearchResponse = serde_json::from_value(json!({})).unwrap();
        let results = raw.into_results(SearchQuery::default().with_page(3, 10), 0);
        assert_eq!(results.metadata, SearchMetadata { total: 0, page: 3, page_size: 10, pages: 0, execution_time_ms: 0 });
    }
}
