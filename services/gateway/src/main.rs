// Quell Gateway (HTTP)
// --------------------
// This binary is the notification-shaping gateway. It accepts event
// notifications on `POST /notify`, runs each one through the per-tenant
// decision pipeline (auth, layered rate limits, pass-through, edge/flap
// state machine), and hands forwarded or aggregated payloads to the
// outbound publisher.
//
// Storage model:
// - The decision core is polymorphic over three storage traits (tenant
//   config, versioned edge state, rate buckets). This binary wires the
//   in-memory implementations, which reset on restart; durable adapters
//   slot in behind the same traits without touching the pipeline.
// - Tenant configuration is administered via `/admin/tenants` and cached
//   in-process for five minutes on the read path.
use anyhow::Result;
use quell_core::cache::ConfigCache;
use quell_core::clock::{Clock, SystemClock};
use quell_core::pipeline::RequestPipeline;
use quell_core::store::memory::{InMemoryConfigStore, InMemoryRateLimiter, InMemoryStateStore};
use quell_core::store::{ConfigStore, Publisher, RateLimiter, StateStore};
use quell_gateway::{app, config, observability, publisher::LogPublisher};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let metrics_handle = observability::init_observability();

    let config = config::GatewayConfig::from_env_or_yaml()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let configs: Arc<dyn ConfigStore> = Arc::new(InMemoryConfigStore::new());
    let state_store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let limiter: Arc<dyn RateLimiter> = Arc::new(InMemoryRateLimiter::with_clock(clock.clone()));
    let publisher: Arc<dyn Publisher> = Arc::new(LogPublisher);
    tracing::info!(backend = "memory", durable = false, "gateway stores ready");

    let state = app::AppState {
        configs,
        cache: Arc::new(ConfigCache::new()),
        pipeline: Arc::new(RequestPipeline::new(limiter, state_store, clock)),
        publisher,
        request_timeout: config.request_timeout,
    };

    tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let router = app::build_router(state);

    let addr = config.bind_addr;
    tracing::info!(%addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
