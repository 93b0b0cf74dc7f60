//! ims-http: the API gateway every data request goes through.
//!
//! Requests pass a hook pipeline before they hit the network. The
//! [`SiteScopeHook`] attributes each request to the active site;
//! error hooks see every failure after it has been mapped to an
//! [`ims_core::ImsError`].

pub mod client;
pub mod endpoints;
pub mod error;
pub mod hooks;
pub mod request;
pub mod site_scope;

pub use client::{ApiClient, NoToken, TokenProvider};
pub use error::error_from_response;
pub use hooks::RequestHook;
pub use request::ApiRequest;
pub use site_scope::{ScopeOutcome, SiteScopeHook};
