use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

// Gateway configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    // HTTP bind address for the notification API.
    pub bind_addr: SocketAddr,
    // Metrics HTTP bind address.
    pub metrics_bind: SocketAddr,
    // Per-request pipeline deadline.
    pub request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GatewayConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    request_timeout_ms: Option<u64>,
}

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        // Environment variables provide defaults for local development.
        let bind_addr = std::env::var("QUELL_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8088".to_string())
            .parse()
            .with_context(|| "parse QUELL_BIND")?;
        let metrics_bind = std::env::var("QUELL_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9090".to_string())
            .parse()
            .with_context(|| "parse QUELL_METRICS_BIND")?;
        let request_timeout_ms = match std::env::var("QUELL_REQUEST_TIMEOUT_MS") {
            Ok(value) => value
                .parse::<u64>()
                .with_context(|| "parse QUELL_REQUEST_TIMEOUT_MS")?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT_MS,
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            request_timeout: Duration::from_millis(request_timeout_ms),
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("QUELL_CONFIG") {
            // YAML overrides allow ops-friendly config files.
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read QUELL_CONFIG: {path}"))?;
            let override_cfg: GatewayConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse gateway config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.request_timeout_ms {
                config.request_timeout = Duration::from_millis(value);
            }
        }
        Ok(config)
    }
}
