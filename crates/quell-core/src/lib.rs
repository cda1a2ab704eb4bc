//! Notification-shaping decision core.
//!
//! # Purpose
//! Everything between "a decoded notification arrived for tenant X" and
//! "forward it / suppress it / send an aggregate / reject it" lives here:
//! expression evaluation, the payload codec, the fixed-window rate-limiter
//! contract, the edge/flap state machine, the request pipeline, and the
//! short-TTL tenant-config cache.
//!
//! # Notes
//! The crate is transport-agnostic: HTTP listeners, queue consumers, and the
//! outbound topic publisher plug in through the traits in [`store`]. The
//! in-memory backends in [`store::memory`] serve local development and tests;
//! durable adapters live with the embedding service.
pub mod action;
pub mod cache;
pub mod clock;
pub mod codec;
pub mod engine;
pub mod expr;
pub mod model;
pub mod pipeline;
pub mod scope;
pub mod state;
pub mod store;

pub use action::Action;
pub use cache::ConfigCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EdgeFlapEngine, EngineError, EngineOutcome};
pub use model::{FlapConfig, Passthrough, TargetConfig, TenantConfig, TriggerConfig};
pub use pipeline::{PipelineError, PipelineOutcome, RequestPipeline};
pub use state::{EdgeState, Flip};
pub use store::{ConfigStore, Publisher, RateLimiter, StateStore, StoreError, StoreResult};
