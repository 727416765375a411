//! Time-bounded session cache.
//!
//! # Responsibilities
//! - Serve identities for known session tokens without a database trip
//! - Fall back to the session store on a miss and cache positive answers
//! - Drop local state on logout and mark the session inactive upstream
//!
//! # Design Decisions
//! - Negative answers are never cached (tokens are not reused)
//! - One mutex guards the map; it is released before any store call
//! - A fetch that raced an `invalidate` answers its caller but is not
//!   cached
//! - Eviction on a full cache purges expired entries first, then the entry
//!   closest to expiry

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::db::QueryError;
use crate::observability::metrics;
use crate::session::store::SessionStore;
use crate::session::Identity;

/// Session resolution failed for a reason other than "not logged in".
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Store(#[from] QueryError),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    identity: Identity,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    /// Bumped by every `invalidate`; a fetch started under an older value
    /// must not populate the map.
    invalidations: u64,
}

/// TTL cache mapping session tokens to identities.
pub struct SessionCache {
    entries: Mutex<Entries>,
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    max_entries: usize,
}

impl SessionCache {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            store,
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Cached identity for `token`, if present and unexpired.
    pub fn lookup(&self, token: &str) -> Option<Identity> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("session cache mutex poisoned");
        match entries.map.get(token) {
            Some(entry) if now < entry.expires_at => Some(entry.identity.clone()),
            Some(_) => {
                entries.map.remove(token);
                metrics::record_session_cache_size(entries.map.len());
                None
            }
            None => None,
        }
    }

    /// Identity for `token`, consulting the store on a miss.
    ///
    /// `Ok(None)` means anonymous: empty, unknown, inactive or expired token.
    pub async fn resolve(&self, token: &str) -> Result<Option<Identity>, SessionError> {
        if token.is_empty() {
            return Ok(None);
        }

        if let Some(identity) = self.lookup(token) {
            metrics::record_session_cache("hit");
            return Ok(Some(identity));
        }
        metrics::record_session_cache("miss");

        let generation = self.generation();
        match self.store.fetch_identity(token).await? {
            Some(identity) => {
                self.insert(token, identity.clone(), generation);
                Ok(Some(identity))
            }
            None => {
                self.remove(token);
                tracing::debug!("Session not active in store");
                Ok(None)
            }
        }
    }

    /// Forget `token` locally and deactivate it in the store.
    ///
    /// Fetches in flight on either side of the store update are kept out
    /// of the cache.
    pub async fn invalidate(&self, token: &str) -> Result<(), SessionError> {
        self.forget(token);
        if token.is_empty() {
            return Ok(());
        }
        let deactivated = self.store.deactivate(token).await;
        self.forget(token);
        deactivated?;
        tracing::info!("Session invalidated");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("session cache mutex poisoned").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn generation(&self) -> u64 {
        self.entries.lock().expect("session cache mutex poisoned").invalidations
    }

    fn forget(&self, token: &str) {
        let mut entries = self.entries.lock().expect("session cache mutex poisoned");
        entries.invalidations += 1;
        if entries.map.remove(token).is_some() {
            metrics::record_session_cache_size(entries.map.len());
        }
    }

    fn remove(&self, token: &str) {
        let mut entries = self.entries.lock().expect("session cache mutex poisoned");
        if entries.map.remove(token).is_some() {
            metrics::record_session_cache_size(entries.map.len());
        }
    }

    fn insert(&self, token: &str, identity: Identity, generation: u64) {
        let now = Instant::now();
        let mut guard = self.entries.lock().expect("session cache mutex poisoned");
        if guard.invalidations != generation {
            tracing::debug!("Session invalidated during fetch, not caching");
            return;
        }
        let entries = &mut guard.map;

        if !entries.contains_key(token) && entries.len() >= self.max_entries {
            entries.retain(|_, e| now < e.expires_at);

            if entries.len() >= self.max_entries {
                let soonest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(key) = soonest {
                    entries.remove(&key);
                    metrics::record_session_eviction();
                }
            }
        }

        entries.insert(
            token.to_string(),
            CacheEntry {
                identity,
                expires_at: now + self.ttl,
            },
        );
        metrics::record_session_cache_size(entries.len());
    }
}
