//! Outbound publisher wiring.
//!
//! # Purpose
//! The deployment seam for the downstream fan-out topic. The gateway core
//! treats publishing as best-effort; this default implementation records the
//! dispatch in the logs and metrics so local runs are observable without a
//! cloud topic client behind them.
use async_trait::async_trait;
use quell_core::store::Publisher;

pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish_raw(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        metrics::counter!("quell_publishes_total").increment(1);
        tracing::info!(topic, bytes = payload.len(), "publish");
        Ok(())
    }
}
