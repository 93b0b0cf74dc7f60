//! REST paths consumed by the client.

pub const INTERACTIONS: &str = "/api/interactions";
pub const SEARCH_INTERACTIONS: &str = "/api/search/interactions";
pub const SEARCH_ADVANCED: &str = "/api/search/advanced";
pub const AUTH_LOGIN: &str = "/api/auth/login";
pub const AUTH_LOGOUT: &str = "/api/auth/logout";
pub const USER_SITES: &str = "/api/users/sites";
pub const ACTIVITY_LOG: &str = "/api/activity/log";

pub fn interaction(id: &str) -> String {
    format!("{INTERACTIONS}/{id}")
}
