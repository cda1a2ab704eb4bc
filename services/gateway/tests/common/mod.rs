// Shared integration-test harness:
// - full router over in-memory stores, served on an ephemeral listener
// - manual clock so edge/flap windows are deterministic
// - recording publisher to assert on downstream dispatches
// - strict client timeouts and no_proxy to prevent localhost hijacking
use anyhow::{Context, Result};
use async_trait::async_trait;
use quell_core::cache::ConfigCache;
use quell_core::clock::ManualClock;
use quell_core::model::{TargetConfig, TenantConfig, TriggerConfig};
use quell_core::pipeline::RequestPipeline;
use quell_core::store::memory::{InMemoryConfigStore, InMemoryRateLimiter, InMemoryStateStore};
use quell_core::store::{ConfigStore, Publisher, RateLimiter, StateStore};
use quell_gateway::app::{AppState, build_router};
use reqwest::redirect::Policy;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

pub const TEST_SECRET: &str = "k12345678";

/// Publisher that records every dispatch for later assertions.
#[derive(Default)]
pub struct RecordingPublisher {
    records: Mutex<Vec<(String, Vec<u8>)>>,
}

#[allow(dead_code)]
impl RecordingPublisher {
    pub fn count(&self) -> usize {
        self.records.lock().expect("records lock").len()
    }

    pub fn topics(&self) -> Vec<String> {
        self.records
            .lock()
            .expect("records lock")
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.records
            .lock()
            .expect("records lock")
            .iter()
            .map(|(_, bytes)| serde_json::from_slice(bytes).expect("published payload is JSON"))
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish_raw(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        self.records
            .lock()
            .expect("records lock")
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

#[allow(dead_code)]
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub configs: Arc<InMemoryConfigStore>,
    pub states: Arc<InMemoryStateStore>,
    pub clock: Arc<ManualClock>,
    pub publisher: Arc<RecordingPublisher>,
    shutdown: Option<oneshot::Sender<()>>,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let clock = ManualClock::new(1_700_000_000);
        let configs = Arc::new(InMemoryConfigStore::new());
        let states = Arc::new(InMemoryStateStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let limiter: Arc<dyn RateLimiter> =
            Arc::new(InMemoryRateLimiter::with_clock(clock.clone()));

        let state_store: Arc<dyn StateStore> = states.clone();
        let state = AppState {
            configs: configs.clone(),
            cache: Arc::new(ConfigCache::new()),
            pipeline: Arc::new(RequestPipeline::new(limiter, state_store, clock.clone())),
            publisher: publisher.clone(),
            request_timeout: Duration::from_secs(2),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind test listener")?;
        let addr = listener.local_addr().context("listener addr")?;
        let router = build_router(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let serve = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            );
            let _ = serve
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });
        wait_for_listen(addr).await?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .no_proxy()
            .redirect(Policy::none())
            .build()
            .context("build test http client")?;

        Ok(Self {
            base_url: format!("http://{addr}"),
            client,
            configs,
            states,
            clock,
            publisher,
            shutdown: Some(shutdown_tx),
        })
    }

    pub async fn put_config(&self, config: TenantConfig) -> Result<()> {
        let tenant_id = config.tenant_id.clone();
        self.configs
            .put(&tenant_id, config)
            .await
            .map_err(|err| anyhow::anyhow!("put config: {err}"))
    }

    pub async fn notify(
        &self,
        tenant_id: &str,
        secret: &str,
        payload: &Value,
    ) -> Result<reqwest::Response> {
        self.client
            .post(format!("{}/notify", self.base_url))
            .header("x-client-id", tenant_id)
            .header("x-client-key", secret)
            .json(payload)
            .send()
            .await
            .context("POST /notify")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn wait_for_listen(addr: SocketAddr) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(err) => {
                if Instant::now() >= deadline {
                    return Err(anyhow::anyhow!("server not ready at {addr}: {err}"));
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Minimal tenant tracking `$.event.type`, no flapping, unlimited rates.
#[allow(dead_code)]
pub fn edge_tenant(tenant_id: &str) -> TenantConfig {
    TenantConfig {
        tenant_id: tenant_id.to_string(),
        display_name: "Integration Tenant".to_string(),
        secret_key: TEST_SECRET.to_string(),
        trigger: TriggerConfig {
            expr: "$.event.type".to_string(),
            target: TargetConfig {
                topic: "T".to_string(),
                target_rpm: 0,
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Asserts an accepted response carrying the given action status text.
#[allow(dead_code)]
pub async fn assert_action(response: reqwest::Response, expected: &str) {
    assert_eq!(response.status().as_u16(), 202, "action {expected}");
    let body: Value = response.json().await.expect("response body");
    assert_eq!(body["status"], expected);
}
