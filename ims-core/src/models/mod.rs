//! Records exchanged with the IMS API.

pub mod interaction;
pub mod search;
pub mod site;

pub use interaction::{Interaction, InteractionInput, InteractionType, ListParams, Page};
pub use search::{
    FilterOperator, SearchFilter, SearchMetadata, SearchQuery, SearchResultItem, SearchResults,
    SortDirection,
};
pub use site::Site;
