//! # ims-cache
//!
//! In-memory TTL cache partitioned by site.
//!
//! - keys carry the resource class, the site, a canonical query key and the
//!   page window, so one site's entries are never returned for another
//! - expired entries are treated as absent and dropped on read
//! - writes replace whole entries
//! - a read started before an invalidation cannot repopulate the scope
//! - every internal failure degrades to a miss

pub mod clock;
pub mod error;
pub mod key;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, CacheResult};
pub use key::{CacheKey, ResourceKind};
pub use store::{Generation, TenantCache};
