//! Client-side token persistence.
//!
//! A token saved without "remember me" lives for `auth.session_ttl`; with it,
//! for `auth.remember_me_ttl`. A shorter lifetime reported by the server wins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ims_core::{AuthSettings, UserIdentity};
use ims_http::TokenProvider;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum TokenStoreError {
    #[error("token store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored token is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub user: UserIdentity,
    pub remember_me: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn issue(
        access_token: impl Into<String>,
        user: UserIdentity,
        remember_me: bool,
        settings: &AuthSettings,
        server_expires_in: Option<u64>,
        now: DateTime<Utc>,
    ) -> Self {
        let policy = if remember_me {
            settings.remember_me_ttl
        } else {
            settings.session_ttl
        };
        let mut lifetime = ChronoDuration::from_std(policy).unwrap_or(ChronoDuration::MAX);
        if let Some(secs) = server_expires_in.and_then(|s| i64::try_from(s).ok()) {
            lifetime = lifetime.min(ChronoDuration::seconds(secs));
        }

        Self {
            access_token: access_token.into(),
            user,
            remember_me,
            issued_at: now,
            expires_at: now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Persistent backing for the current token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredToken>, TokenStoreError>;
    fn save(&self, token: &StoredToken) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<StoredToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredToken>, TokenStoreError> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, token: &StoredToken) -> Result<(), TokenStoreError> {
        *self.slot.lock() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// Token kept as a JSON file, so "remember me" survives restarts.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredToken>, TokenStoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &StoredToken) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(token)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write-through holder of the current token over a [`TokenStore`].
///
/// Also the [`TokenProvider`] handed to the API client; an expired token is
/// never sent.
pub struct StoredTokens {
    current: RwLock<Option<StoredToken>>,
    store: Arc<dyn TokenStore>,
}

impl StoredTokens {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            current: RwLock::new(None),
            store,
        }
    }

    /// Load from the backing store, discarding an expired or unreadable token.
    pub fn restore(&self, now: DateTime<Utc>) -> Option<StoredToken> {
        let loaded = match self.store.load() {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "discarding unreadable stored token");
                self.clear();
                return None;
            }
        };

        match loaded {
            Some(token) if !token.is_expired_at(now) => {
                *self.current.write() = Some(token.clone());
                Some(token)
            }
            Some(_) => {
                self.clear();
                None
            }
            None => None,
        }
    }

    pub fn set(&self, token: StoredToken) {
        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "failed to persist token; keeping it for this session only");
        }
        *self.current.write() = Some(token);
    }

    pub fn clear(&self) {
        *self.current.write() = None;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear persisted token");
        }
    }

    pub fn current(&self) -> Option<StoredToken> {
        self.current.read().clone()
    }

    pub fn valid_at(&self, now: DateTime<Utc>) -> Option<StoredToken> {
        self.current().filter(|t| !t.is_expired_at(now))
    }
}

impl TokenProvider for StoredTokens {
    fn access_token(&self) -> Option<String> {
        self.valid_at(Utc::now()).map(|t| t.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> AuthSettings {
        AuthSettings {
            provider_domain: "auth.example.com".to_string(),
            client_id: "client".to_string(),
            audience: "ims-api".to_string(),
            session_ttl: Duration::from_secs(8 * 3600),
            remember_me_ttl: Duration::from_secs(30 * 24 * 3600),
        }
    }

    fn user() -> UserIdentity {
        UserIdentity {
            id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            name: None,
        }
    }

    #[test]
    fn remember_me_extends_expiry() {
        let now = Utc::now();
        let short = StoredToken::issue("t", user(), false, &settings(), None, now);
        let long = StoredToken::issue("t", user(), true, &settings(), None, now);

        assert_eq!(short.expires_at - now, ChronoDuration::hours(8));
        assert_eq!(long.expires_at - now, ChronoDuration::days(30));
    }

    #[test]
    fn server_lifetime_caps_policy() {
        let now = Utc::now();
        let t = StoredToken::issue("t", user(), true, &settings(), Some(600), now);
        assert_eq!(t.expires_at - now, ChronoDuration::minutes(10));
    }

    #[test]
    fn expired_token_is_dropped_on_restore() {
        let store = Arc::new(MemoryTokenStore::new());
        let issued = Utc::now() - ChronoDuration::days(1);
        store
            .save(&StoredToken::issue("old", user(), false, &settings(), None, issued))
            .unwrap();

        let tokens = StoredTokens::new(store.clone());
        assert!(tokens.restore(Utc::now()).is_none());
        assert!(store.load().unwrap().is_none());
        assert!(tokens.access_token().is_none());
    }

    #[test]
    fn file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("token.json"));
        assert!(store.load().unwrap().is_none());

        let token = StoredToken::issue("abc", user(), true, &settings(), None, Utc::now());
        store.save(&token).unwrap();
        assert_eq!(store.load().unwrap(), Some(token));

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, b"{not json").unwrap();

        let tokens = StoredTokens::new(Arc::new(FileTokenStore::new(&path)));
        assert!(tokens.restore(Utc::now()).is_none());
        assert!(!path.exists());
    }
}
