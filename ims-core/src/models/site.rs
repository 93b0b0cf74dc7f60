use serde::{Deserialize, Serialize};

use crate::tenant::SiteId;

/// A site the current user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}
