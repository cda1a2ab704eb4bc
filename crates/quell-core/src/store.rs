//! Storage and publishing interfaces consumed by the core.
//!
//! # Purpose
//! The decision pipeline is polymorphic over three small capability sets —
//! tenant configuration, versioned edge state, and fixed-window rate
//! buckets — plus the outbound publisher. Backends implement these traits;
//! the in-memory versions in [`memory`] back local development and tests.
use crate::model::TenantConfig;
use crate::state::EdgeState;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable tenant-configuration storage.
///
/// The notification path only reads; mutation happens through administrative
/// tooling. Implementations MUST return `StoreError::NotFound` for missing
/// tenants and reject invalid configurations from `put`.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, tenant_id: &str) -> StoreResult<TenantConfig>;
    async fn list(&self) -> StoreResult<Vec<String>>;
    async fn put(&self, tenant_id: &str, config: TenantConfig) -> StoreResult<()>;
    async fn delete(&self, tenant_id: &str) -> StoreResult<()>;
    /// Purges all tenant configuration. Test support only.
    async fn clear_all(&self) -> StoreResult<()>;
}

/// Versioned edge/flap state storage with compare-and-set semantics.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the state and its monotonic version, or `None` when no record
    /// exists (callers treat that as version 0).
    async fn load(
        &self,
        tenant_id: &str,
        scope_key: &str,
    ) -> StoreResult<Option<(EdgeState, u64)>>;

    /// Creates or replaces the record only if the stored version still equals
    /// `prev_version`; with `prev_version == 0` the record must not exist.
    /// On commit the stored version becomes `prev_version + 1`. A
    /// precondition miss is `Ok(false)`, not an error.
    async fn upsert_cas(
        &self,
        tenant_id: &str,
        scope_key: &str,
        prev_version: u64,
        next: EdgeState,
    ) -> StoreResult<bool>;
}

/// Fixed-window rate limiting over integer-minute buckets.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Attempts a slot in `scope` for the current minute. Atomically creates
    /// the bucket on first use (TTL = window + grace, set only at creation)
    /// and increments iff the count is under `cap`. `Ok(false)` means
    /// rate-limited; `cap == 0` always denies (callers treat 0 as "not
    /// applicable" and skip the call). Implementations must observe `cancel`
    /// and abandon the acquire promptly with an error once it fires.
    async fn acquire(
        &self,
        cancel: &CancellationToken,
        scope: &str,
        cap: u32,
        window: Duration,
    ) -> StoreResult<bool>;
}

/// Outbound delivery to the downstream fan-out topic. Best-effort: failures
/// are reported but never unwind an already-committed state transition.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_raw(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()>;
}
