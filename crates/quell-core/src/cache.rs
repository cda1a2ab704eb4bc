//! Short-TTL in-process caches.
//!
//! # Purpose
//! A minimal TTL map to trim backend reads on hot paths, plus the tenant
//! configuration cache built on it. Lazy expiration on read; entries are
//! value copies, so callers never hold references into the cache and a
//! `put` to the backing store simply becomes visible when the entry ages
//! out (staleness is bounded by the TTL, 5 minutes for configs).
use crate::model::TenantConfig;
use crate::store::{ConfigStore, StoreResult};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Tenant configs are cached for 5 minutes.
pub const CONFIG_CACHE_TTL: Duration = Duration::from_secs(300);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Lazily expiring TTL map. Reads take the shared lock; only inserts take
/// the exclusive lock, so lookups stay concurrent. Expired entries linger
/// until overwritten, which is fine at the key cardinalities involved here
/// (one entry per active tenant).
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a copy of the value if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-through cache over a [`ConfigStore`].
pub struct ConfigCache {
    entries: TtlCache<String, TenantConfig>,
    ttl: Duration,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self {
            entries: TtlCache::new(),
            ttl: CONFIG_CACHE_TTL,
        }
    }

    #[doc(hidden)]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: TtlCache::new(),
            ttl,
        }
    }

    /// Returns the cached config or reads through to the store, caching the
    /// result. Misses propagate the store error unchanged (including
    /// `NotFound` for unknown tenants).
    pub async fn load(
        &self,
        store: &dyn ConfigStore,
        tenant_id: &str,
    ) -> StoreResult<TenantConfig> {
        if let Some(config) = self.entries.get(&tenant_id.to_string()) {
            return Ok(config);
        }
        let config = store.get(tenant_id).await?;
        self.entries
            .insert(tenant_id.to_string(), config.clone(), self.ttl);
        Ok(config)
    }
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new()
    }
}
