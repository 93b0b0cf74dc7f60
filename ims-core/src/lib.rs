//! ims-core: shared types for the Interaction Management System client.

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod service;
pub mod tenant;

pub use config::{
    AuthSettings, CacheTtls, Environment, FeatureFlags, ImsConfig, ImsConfigSnapshot, ImsConfigStore,
    LoggingSettings,
};
pub use errors::{ErrorCategory, ErrorKind, ImsError, ImsResult};
pub use events::{EventHub, EventListener, ListenerId, ServiceEvent, ServiceEventKind, ServiceEventPattern};
pub use service::{RecordService, ServiceMethodKind};
pub use tenant::{AuthState, SessionSnapshot, SessionStore, SiteId, TenantContext, UserIdentity};
