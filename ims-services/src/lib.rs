//! ims-services: the data services views bind to.
//!
//! Reads go through the site-scoped cache; every successful mutation
//! invalidates the site's cached lists, searches and dashboard before the
//! call returns.

pub mod activity;
pub mod dashboard;
pub mod filters;
pub mod interactions;
pub mod mapping;
pub mod search;

pub use activity::{ActivityEntry, ActivityLogger};
pub use dashboard::{DashboardService, DashboardSummary};
pub use filters::FinderFilters;
pub use interactions::{invalidate_site_views, InteractionService, INTERACTIONS_SERVICE};
pub use search::{SearchOutcome, SearchService};
