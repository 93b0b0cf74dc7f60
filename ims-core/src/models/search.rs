use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::interaction::InteractionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    In,
    Gte,
    Lte,
    Between,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::In => "in",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
            FilterOperator::Between => "between",
        }
    }
}

/// One structured condition of an advanced search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl SearchFilter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Value with set-like arrays (`in`) sorted so equivalent filters compare equal.
    fn canonical_value(&self) -> Value {
        match (&self.operator, &self.value) {
            (FilterOperator::In, Value::Array(items)) => {
                let mut items = items.clone();
                items.sort_by_key(|v| v.to_string());
                Value::Array(items)
            }
            (_, v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A single search action. Built per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_search: Option<String>,
    #[serde(default)]
    pub filters: Vec<SearchFilter>,
    pub page: u32,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            global_search: None,
            filters: Vec::new(),
            page: 1,
            page_size: 25,
            sort_field: None,
            sort_direction: None,
        }
    }
}

impl SearchQuery {
    pub fn text(term: impl Into<String>) -> Self {
        Self {
            global_search: Some(term.into()),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: SearchFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_field = Some(field.into());
        self.sort_direction = Some(direction);
        self
    }

    /// Trimmed search term, `None` when blank.
    pub fn term(&self) -> Option<&str> {
        self.global_search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Any structured filter routes the query to the advanced endpoint.
    pub fn is_advanced(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Deterministic cache key for this query, excluding page and page size
    /// (those are separate key components).
    ///
    /// Filters are sorted by field, then operator, then value, so two
    /// permutations of the same filter list produce the same key. Components
    /// are JSON-encoded, so no term or field name can mimic a separator.
    pub fn canonical_key(&self) -> String {
        let sort = self.sort_field.as_deref().map(|field| {
            let direction = self.sort_direction.unwrap_or(SortDirection::Asc);
            json!([field, direction.as_str()])
        });

        if !self.is_advanced() {
            let canonical = json!({ "q": self.term().unwrap_or(""), "sort": sort });
            return format!("text:{canonical}");
        }

        let mut filters: Vec<(String, &'static str, Value)> = self
            .filters
            .iter()
            .map(|f| (f.field.clone(), f.operator.as_str(), f.canonical_value()))
            .collect();
        filters.sort_by(|a, b| {
            (a.0.as_str(), a.1, a.2.to_string()).cmp(&(b.0.as_str(), b.1, b.2.to_string()))
        });

        let canonical = json!({
            "q": self.term(),
            "filters": filters
                .into_iter()
                .map(|(field, op, value)| json!([field, op, value]))
                .collect::<Vec<_>>(),
            "sort": sort,
        });
        format!("adv:{canonical}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub lead: Option<String>,
    pub start_datetime: NaiveDateTime,
    pub end_datetime: NaiveDateTime,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub pages: u32,
    pub execution_time_ms: u64,
}

impl SearchMetadata {
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self {
            total: 0,
            page,
            page_size,
            pages: 0,
            execution_time_ms: 0,
        }
    }
}

/// View-model for one executed search. Rebuilt on every search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub items: Vec<SearchResultItem>,
    pub metadata: SearchMetadata,
    pub query: SearchQuery,
    pub loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResults {
    /// Results published for a failed search, or before the first one.
    pub fn empty(query: SearchQuery, error: Option<String>) -> Self {
        Self {
            items: Vec::new(),
            metadata: SearchMetadata::empty(query.page, query.page_size),
            query,
            loading: false,
            error,
        }
    }

    /// Placeholder published while a request is in flight.
    pub fn loading(query: SearchQuery) -> Self {
        Self {
            loading: true,
            ..Self::empty(query, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filters() -> Vec<SearchFilter> {
        vec![
            SearchFilter::new("type", FilterOperator::In, json!(["Call", "Meeting"])),
            SearchFilter::new("lead", FilterOperator::Contains, json!("smith")),
            SearchFilter::new(
                "start_datetime",
                FilterOperator::Between,
                json!(["2024-01-01T00:00:00", "2024-02-01T00:00:00"]),
            ),
            SearchFilter::new("location", FilterOperator::Equals, json!("HQ")),
        ]
    }

    #[test]
    fn text_only_query_is_simple() {
        let q = SearchQuery::text("  kickoff ");
        assert!(!q.is_advanced());
        assert_eq!(q.canonical_key(), SearchQuery::text("kickoff").canonical_key());
        assert!(q.canonical_key().starts_with("text:"));
        assert_ne!(SearchQuery::default().canonical_key(), q.canonical_key());
    }

    #[test]
    fn separators_in_the_term_cannot_forge_a_sort() {
        let sorted = SearchQuery::text("a").with_sort("title", SortDirection::Asc);
        let forged = SearchQuery::text("a|sort:title:asc");
        assert_ne!(sorted.canonical_key(), forged.canonical_key());

        let colon_field = SearchQuery::text("a").with_sort("x:desc", SortDirection::Asc);
        let plain_field = SearchQuery::text("a").with_sort("x", SortDirection::Desc);
        assert_ne!(colon_field.canonical_key(), plain_field.canonical_key());
    }

    #[test]
    fn missing_direction_sorts_ascending() {
        let implicit = SearchQuery {
            sort_field: Some("title".into()),
            ..SearchQuery::text("a")
        };
        let explicit = SearchQuery::text("a").with_sort("title", SortDirection::Asc);
        assert_eq!(implicit.canonical_key(), explicit.canonical_key());
    }

    #[test]
    fn one_filter_makes_query_advanced() {
        let q = SearchQuery::default().with_filter(filters().remove(0));
        assert!(q.is_advanced());
        assert!(q.canonical_key().starts_with("adv:"));
    }

    #[test]
    fn sort_is_part_of_the_key() {
        let a = SearchQuery::text("x").with_sort("title", SortDirection::Asc);
        let b = SearchQuery::text("x").with_sort("title", SortDirection::Desc);
        assert_ne!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn in_values_are_order_insensitive() {
        let a = SearchQuery::default()
            .with_filter(SearchFilter::new("type", FilterOperator::In, json!(["Call", "Email"])));
        let b = SearchQuery::default()
            .with_filter(SearchFilter::new("type", FilterOperator::In, json!(["Email", "Call"])));
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    proptest! {
        #[test]
        fn permuted_filters_share_a_key(order in Just(filters()).prop_shuffle()) {
            let base = SearchQuery::text("acme");
            let mut original = base.clone();
            original.filters = filters();
            let mut permuted = base;
            permuted.filters = order;

            prop_assert_eq!(original.canonical_key(), permuted.canonical_key());
        }
    }
}
