use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ims_core::SiteId;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, CacheResult};
use crate::key::{CacheKey, ResourceKind};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Snapshot of how often a `(resource, site)` scope has been invalidated.
///
/// Take one before a network read and hand it to
/// [`TenantCache::set_if_generation`]; the write is dropped if the scope was
/// invalidated while the read was in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    epoch: u64,
    resource: u64,
    scope: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Bumped by `clear`.
    epoch: u64,
    /// Bumped by `invalidate(resource, None)`.
    resources: HashMap<ResourceKind, u64>,
    /// Bumped by `invalidate(resource, Some(site))` and `invalidate_site`.
    scopes: HashMap<(ResourceKind, SiteId), u64>,
}

impl Inner {
    fn generation(&self, resource: ResourceKind, site: &SiteId) -> Generation {
        Generation {
            epoch: self.epoch,
            resource: self.resources.get(&resource).copied().unwrap_or(0),
            scope: self
                .scopes
                .get(&(resource, site.clone()))
                .copied()
                .unwrap_or(0),
        }
    }

    fn bump_scope(&mut self, resource: ResourceKind, site: &SiteId) {
        *self.scopes.entry((resource, site.clone())).or_default() += 1;
    }
}

/// Site-partitioned TTL cache of JSON values.
///
/// All access goes through one mutex; no lock is held across an await
/// because nothing in here is async.
pub struct TenantCache {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl Default for TenantCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }

    /// Cached value if present and not expired. An expired entry is removed.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let fresh = inner
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));

        match fresh {
            Some(Some(value)) => {
                debug!(key = %key, "cache hit");
                Some(value)
            }
            Some(None) => {
                inner.entries.remove(key);
                debug!(key = %key, "cache entry expired");
                None
            }
            None => {
                debug!(key = %key, "cache miss");
                None
            }
        }
    }

    /// Typed read. A value that no longer decodes is dropped and reported as a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = self.get(key)?;
        match decode(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %key, error = %e, "dropping undecodable cache entry");
                self.inner.lock().entries.remove(key);
                None
            }
        }
    }

    /// Current generation of the scope `key` lives in.
    pub fn generation(&self, key: &CacheKey) -> Generation {
        self.inner.lock().generation(key.resource, &key.site_id)
    }

    /// Store or overwrite `key`, expiring at now + `ttl`.
    pub fn set(&self, key: CacheKey, value: Value, ttl: Duration) {
        if let Err(e) = self.try_set(key, value, ttl, None) {
            warn!(error = %e, "cache write skipped");
        }
    }

    /// Typed write. Encoding failures skip the write.
    pub fn set_from<T: Serialize>(&self, key: CacheKey, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(v) => self.set(key, v, ttl),
            Err(e) => warn!(key = %key, error = %CacheError::Encode(e.to_string()), "cache write skipped"),
        }
    }

    /// Like [`set`](Self::set), but only while `key`'s scope is still at
    /// `generation`. Returns whether the value was stored.
    pub fn set_if_generation(&self, key: CacheKey, value: Value, ttl: Duration, generation: Generation) -> bool {
        match self.try_set(key, value, ttl, Some(generation)) {
            Ok(()) => true,
            Err(e @ CacheError::Superseded(_)) => {
                debug!(error = %e, "cache write skipped");
                false
            }
            Err(e) => {
                warn!(error = %e, "cache write skipped");
                false
            }
        }
    }

    /// Typed [`set_if_generation`](Self::set_if_generation).
    pub fn set_from_if_generation<T: Serialize>(
        &self,
        key: CacheKey,
        value: &T,
        ttl: Duration,
        generation: Generation,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(v) => self.set_if_generation(key, v, ttl, generation),
            Err(e) => {
                warn!(key = %key, error = %CacheError::Encode(e.to_string()), "cache write skipped");
                false
            }
        }
    }

    fn try_set(&self, key: CacheKey, value: Value, ttl: Duration, expected: Option<Generation>) -> CacheResult<()> {
        let now = self.clock.now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(CacheError::InvalidTtl(ttl))?;

        let mut inner = self.inner.lock();
        if let Some(expected) = expected {
            if inner.generation(key.resource, &key.site_id) != expected {
                return Err(CacheError::Superseded(key.to_string()));
            }
        }

        debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set");
        inner.entries.insert(key, CacheEntry { value, expires_at });
        Ok(())
    }

    /// Remove every entry of `resource`, restricted to `site` when given.
    /// Returns the number of removed entries; removing nothing is not an error.
    ///
    /// The scope's generation moves on even when nothing was removed, so
    /// reads already in flight cannot repopulate it.
    pub fn invalidate(&self, resource: ResourceKind, site: Option<&SiteId>) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|k, _| {
            let matches = k.resource == resource && site.map_or(true, |s| &k.site_id == s);
            !matches
        });
        match site {
            Some(s) => inner.bump_scope(resource, s),
            None => *inner.resources.entry(resource).or_default() += 1,
        }
        let removed = before - inner.entries.len();
        debug!(resource = %resource, site = ?site, removed, "cache invalidated");
        removed
    }

    /// Remove every entry scoped to `site`, whatever its resource class.
    pub fn invalidate_site(&self, site: &SiteId) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|k, _| &k.site_id != site);
        for resource in ResourceKind::ALL {
            inner.bump_scope(resource, site);
        }
        let removed = before - inner.entries.len();
        debug!(site = %site, removed, "site cache invalidated");
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.epoch += 1;
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> CacheResult<T> {
    serde_json::from_value(value).map_err(|e| CacheError::Decode(e.to_string()))
}
