//! # Configuration
//!
//! Two layers:
//! - [`ImsConfigStore`], a plain string key/value store that can be filled from
//!   the process environment (`IMS__CACHE__SEARCH_TTL=30s` → `cache.search_ttl`)
//! - [`ImsConfig`], the typed, environment-selected configuration the services
//!   read. It starts from per-environment defaults and is overlaid with a
//!   store snapshot.
//!
//! ```rust
//! use ims_core::config::{Environment, ImsConfig, ImsConfigStore};
//!
//! let mut store = ImsConfigStore::new();
//! store.set("api_base_url", "https://ims.internal.example");
//! store.set("cache.search_ttl", "45s");
//!
//! let cfg = ImsConfig::for_environment(Environment::Staging)
//!     .apply_snapshot(&store.snapshot())
//!     .unwrap();
//! assert_eq!(cfg.cache.search_ttl.as_secs(), 45);
//! ```

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ImsError, ImsResult};

#[derive(Debug, Default)]
pub struct ImsConfigStore {
    values: HashMap<String, String>,
}

impl ImsConfigStore {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn snapshot(&self) -> ImsConfigSnapshot {
        ImsConfigSnapshot::new(self.values.clone())
    }
}

/// Copy environment variables with `prefix` into the store.
///
/// `IMS__CACHE__SEARCH_TTL` with prefix `IMS__` becomes `cache.search_ttl`.
pub fn load_env_overrides(store: &mut ImsConfigStore, prefix: &str) {
    load_overrides_from(store, prefix, std::env::vars());
}

pub fn load_overrides_from<I>(store: &mut ImsConfigStore, prefix: &str, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(prefix) {
            let normalized = stripped.to_lowercase().replace("__", ".");
            store.set(normalized, value);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImsConfigSnapshot {
    map: HashMap<String, String>,
}

impl ImsConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.parse::<bool>().ok())
    }

    /// Parse a humantime duration such as `30s`, `12h` or `30days`.
    pub fn get_duration(&self, key: &str) -> ImsResult<Option<Duration>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => humantime_serde::re::humantime::parse_duration(raw)
                .map(Some)
                .map_err(|e| {
                    ImsError::bad_request(format!("invalid duration for '{key}': {e}")).into_anyhow()
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(ImsError::bad_request(format!("unknown environment '{other}'")).into_anyhow()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    pub provider_domain: String,
    pub client_id: String,
    pub audience: String,
    /// Lifetime of a token stored without "remember me".
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,
    /// Lifetime of a token stored with "remember me".
    #[serde(with = "humantime_serde")]
    pub remember_me_ttl: Duration,
}

/// Cache TTLs per resource class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtls {
    #[serde(with = "humantime_serde")]
    pub search_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub interactions_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub dashboard_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub sites_ttl: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            search_ttl: Duration::from_secs(60),
            interactions_ttl: Duration::from_secs(300),
            dashboard_ttl: Duration::from_secs(120),
            sites_ttl: Duration::from_secs(900),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `ims_services=debug`.
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub advanced_search: bool,
    pub activity_logging: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            advanced_search: true,
            activity_logging: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImsConfig {
    pub environment: Environment,
    pub api_base_url: String,
    pub auth: AuthSettings,
    pub cache: CacheTtls,
    pub logging: LoggingSettings,
    pub features: FeatureFlags,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl ImsConfig {
    pub fn for_environment(environment: Environment) -> Self {
        let (api_base_url, provider_domain, level) = match environment {
            Environment::Development => ("http://localhost:8000", "ims-dev.auth.example.com", "debug"),
            Environment::Staging => ("https://staging-api.ims.example.com", "ims-staging.auth.example.com", "info"),
            Environment::Production => ("https://api.ims.example.com", "ims.auth.example.com", "warn"),
        };

        Self {
            environment,
            api_base_url: api_base_url.to_string(),
            auth: AuthSettings {
                provider_domain: provider_domain.to_string(),
                client_id: String::new(),
                audience: "ims-api".to_string(),
                session_ttl: Duration::from_secs(12 * 3600),
                remember_me_ttl: Duration::from_secs(30 * 24 * 3600),
            },
            cache: CacheTtls::default(),
            logging: LoggingSettings {
                level: level.to_string(),
                json: environment == Environment::Production,
            },
            features: FeatureFlags::default(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_json_str(raw: &str) -> ImsResult<Self> {
        let cfg: ImsConfig = serde_json::from_str(raw).map_err(|e| {
            ImsError::bad_request(format!("invalid configuration: {e}")).into_anyhow()
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay snapshot values onto this configuration.
    pub fn apply_snapshot(mut self, snap: &ImsConfigSnapshot) -> ImsResult<Self> {
        if let Some(v) = snap.get_string("api_base_url") {
            self.api_base_url = v;
        }
        if let Some(v) = snap.get_string("auth.provider_domain") {
            self.auth.provider_domain = v;
        }
        if let Some(v) = snap.get_string("auth.client_id") {
            self.auth.client_id = v;
        }
        if let Some(v) = snap.get_string("auth.audience") {
            self.auth.audience = v;
        }
        if let Some(v) = snap.get_duration("auth.session_ttl")? {
            self.auth.session_ttl = v;
        }
        if let Some(v) = snap.get_duration("auth.remember_me_ttl")? {
            self.auth.remember_me_ttl = v;
        }
        if let Some(v) = snap.get_duration("cache.search_ttl")? {
            self.cache.search_ttl = v;
        }
        if let Some(v) = snap.get_duration("cache.interactions_ttl")? {
            self.cache.interactions_ttl = v;
        }
        if let Some(v) = snap.get_duration("cache.dashboard_ttl")? {
            self.cache.dashboard_ttl = v;
        }
        if let Some(v) = snap.get_duration("cache.sites_ttl")? {
            self.cache.sites_ttl = v;
        }
        if let Some(v) = snap.get_string("logging.level") {
            self.logging.level = v;
        }
        if let Some(v) = snap.get_bool("logging.json") {
            self.logging.json = v;
        }
        if let Some(v) = snap.get_bool("features.advanced_search") {
            self.features.advanced_search = v;
        }
        if let Some(v) = snap.get_bool("features.activity_logging") {
            self.features.activity_logging = v;
        }
        if let Some(v) = snap.get_duration("request_timeout")? {
            self.request_timeout = v;
        }

        self.validate()?;
        Ok(self)
    }

    /// Environment from `IMS_ENV` (default development), defaults for that
    /// environment, then `IMS__*` overrides.
    pub fn from_env() -> ImsResult<Self> {
        let environment = match std::env::var("IMS_ENV") {
            Ok(v) => v.parse()?,
            Err(_) => Environment::Development,
        };
        let mut store = ImsConfigStore::new();
        load_env_overrides(&mut store, "IMS__");
        Self::for_environment(environment).apply_snapshot(&store.snapshot())
    }

    pub fn validate(&self) -> ImsResult<()> {
        if self.api_base_url.trim().is_empty() {
            crate::bail_ims!(bad_request, "api_base_url cannot be empty");
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            crate::bail_ims!(bad_request, "api_base_url must be a valid HTTP/HTTPS URL");
        }

        let ttls = [
            ("auth.session_ttl", self.auth.session_ttl),
            ("auth.remember_me_ttl", self.auth.remember_me_ttl),
            ("cache.search_ttl", self.cache.search_ttl),
            ("cache.interactions_ttl", self.cache.interactions_ttl),
            ("cache.dashboard_ttl", self.cache.dashboard_ttl),
            ("cache.sites_ttl", self.cache.sites_ttl),
        ];
        for (key, ttl) in ttls {
            if ttl.is_zero() {
                crate::bail_ims!(bad_request, "{} must be greater than 0", key);
            }
        }

        Ok(())
    }
}
