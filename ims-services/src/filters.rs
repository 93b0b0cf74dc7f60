use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use ims_core::models::{FilterOperator, InteractionType, SearchFilter, SearchQuery};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// State of the interaction finder panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinderFilters {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub types: BTreeSet<InteractionType>,
    #[serde(default)]
    pub date_from: Option<NaiveDateTime>,
    #[serde(default)]
    pub date_to: Option<NaiveDateTime>,
    #[serde(default)]
    pub lead: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl FinderFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_type(&mut self, t: InteractionType) {
        if !self.types.remove(&t) {
            self.types.insert(t);
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Ticking every type box is treated the same as ticking none.
    pub fn type_filter(&self) -> Option<SearchFilter> {
        if self.types.is_empty() || self.types.len() == InteractionType::ALL.len() {
            return None;
        }
        let values: Vec<Value> = self.types.iter().map(|t| json!(t.as_str())).collect();
        Some(SearchFilter::new("type", FilterOperator::In, Value::Array(values)))
    }

    pub fn date_filter(&self) -> Option<SearchFilter> {
        let field = "start_datetime";
        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) => Some(SearchFilter::new(
                field,
                FilterOperator::Between,
                json!([from, to]),
            )),
            (Some(from), None) => Some(SearchFilter::new(field, FilterOperator::Gte, json!(from))),
            (None, Some(to)) => Some(SearchFilter::new(field, FilterOperator::Lte, json!(to))),
            (None, None) => None,
        }
    }

    pub fn filters(&self) -> Vec<SearchFilter> {
        let mut out = Vec::new();
        out.extend(self.type_filter());
        out.extend(self.date_filter());
        if let Some(lead) = non_blank(&self.lead) {
            out.push(SearchFilter::new("lead", FilterOperator::Contains, json!(lead)));
        }
        if let Some(location) = non_blank(&self.location) {
            out.push(SearchFilter::new("location", FilterOperator::Contains, json!(location)));
        }
        out
    }

    pub fn to_query(&self, page: u32, page_size: u32) -> SearchQuery {
        let text = self.text.trim();
        SearchQuery {
            global_search: (!text.is_empty()).then(|| text.to_string()),
            filters: self.filters(),
            ..SearchQuery::default()
        }
        .with_page(page, page_size)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
