//! In-memory implementations of the storage interfaces.
//!
//! # Purpose
//! These stores implement the core's storage traits entirely in memory using
//! `HashMap`s guarded by `tokio::sync::RwLock`/`Mutex`. They exist for:
//! - local development and tests (no external dependencies)
//! - deployments where durability is not required
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: CAS and rate-bucket updates are
//!   serialized under their locks, so the version protocol and the
//!   at-most-`cap` grant bound hold within one process.
//! - **No multi-node coordination**: multiple gateway instances each have
//!   independent state; durable backends must provide the same contracts
//!   server-side.
use super::{ConfigStore, RateLimiter, StateStore, StoreError, StoreResult};
use crate::clock::{Clock, SystemClock};
use crate::model::TenantConfig;
use crate::state::EdgeState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Extra bucket lifetime past the window so slow readers never observe a
/// vanished bucket mid-minute.
const RATE_BUCKET_GRACE_SECS: i64 = 120;

/// In-memory tenant-configuration store.
#[derive(Default)]
pub struct InMemoryConfigStore {
    configs: RwLock<HashMap<String, TenantConfig>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(&self, tenant_id: &str) -> StoreResult<TenantConfig> {
        self.configs
            .read()
            .await
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("tenant".into()))
    }

    async fn list(&self) -> StoreResult<Vec<String>> {
        Ok(self.configs.read().await.keys().cloned().collect())
    }

    async fn put(&self, tenant_id: &str, config: TenantConfig) -> StoreResult<()> {
        config
            .validate()
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let mut configs = self.configs.write().await;
        configs.insert(tenant_id.to_string(), config);
        metrics::gauge!("quell_tenants_total").set(configs.len() as f64);
        Ok(())
    }

    async fn delete(&self, tenant_id: &str) -> StoreResult<()> {
        let mut configs = self.configs.write().await;
        if configs.remove(tenant_id).is_none() {
            return Err(StoreError::NotFound("tenant".into()));
        }
        metrics::gauge!("quell_tenants_total").set(configs.len() as f64);
        Ok(())
    }

    async fn clear_all(&self) -> StoreResult<()> {
        self.configs.write().await.clear();
        metrics::gauge!("quell_tenants_total").set(0.0);
        Ok(())
    }
}

/// In-memory versioned edge-state store.
///
/// Records are keyed by `(tenant_id, scope_key)`; the version lives beside
/// the state and is bumped only by a committed CAS.
#[derive(Default)]
pub struct InMemoryStateStore {
    records: RwLock<HashMap<(String, String), (EdgeState, u64)>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(
        &self,
        tenant_id: &str,
        scope_key: &str,
    ) -> StoreResult<Option<(EdgeState, u64)>> {
        let key = (tenant_id.to_string(), scope_key.to_string());
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn upsert_cas(
        &self,
        tenant_id: &str,
        scope_key: &str,
        prev_version: u64,
        mut next: EdgeState,
    ) -> StoreResult<bool> {
        next.scope_key = scope_key.to_string();
        let key = (tenant_id.to_string(), scope_key.to_string());
        let mut records = self.records.write().await;
        match records.get(&key) {
            None if prev_version == 0 => {
                records.insert(key, (next, 1));
                metrics::gauge!("quell_edge_states_total").set(records.len() as f64);
                Ok(true)
            }
            Some((_, version)) if prev_version != 0 && *version == prev_version => {
                records.insert(key, (next, prev_version + 1));
                Ok(true)
            }
            // Create raced with an existing record, or the version moved on.
            _ => Ok(false),
        }
    }
}

struct RateBucket {
    count: u32,
    ttl: i64,
}

/// In-memory fixed-window rate limiter.
///
/// A single mutex makes bucket creation, capacity check, and increment one
/// critical section — the in-process equivalent of the one-round-trip
/// conditional write a durable backend performs server-side. Expired buckets
/// are evicted lazily on acquire.
pub struct InMemoryRateLimiter {
    clock: Arc<dyn Clock>,
    buckets: Mutex<HashMap<(String, i64), RateBucket>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn acquire(
        &self,
        cancel: &CancellationToken,
        scope: &str,
        cap: u32,
        window: Duration,
    ) -> StoreResult<bool> {
        if cancel.is_cancelled() {
            return Err(StoreError::Unexpected(anyhow::anyhow!(
                "rate acquire cancelled"
            )));
        }
        if cap == 0 {
            return Ok(false);
        }
        let now = self.clock.epoch_secs();
        let epoch_minute = now.div_euclid(60);
        let mut buckets = self.buckets.lock().await;
        buckets.retain(|_, bucket| bucket.ttl > now);
        let bucket = buckets
            .entry((scope.to_string(), epoch_minute))
            .or_insert(RateBucket {
                count: 0,
                ttl: now + window.as_secs() as i64 + RATE_BUCKET_GRACE_SECS,
            });
        if bucket.count < cap {
            bucket.count += 1;
            Ok(true)
        } else {
            metrics::counter!("quell_rate_denials_total").increment(1);
            Ok(false)
        }
    }
}
