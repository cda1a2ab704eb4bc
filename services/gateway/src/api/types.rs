//! HTTP API request/response types.
//!
//! # Purpose
//! Defines shared payload shapes for the gateway REST surface and OpenAPI
//! schema generation. Tenant configuration bodies mirror the core model so
//! the admin API stays documented without leaking transport concerns into
//! the core crate.
use quell_core::model::{FlapConfig, Passthrough, TargetConfig, TenantConfig, TriggerConfig};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Outcome reported to notification submitters.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotifyResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TenantListResponse {
    pub items: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct PassthroughBody {
    #[serde(default)]
    pub expr: String,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct TargetBody {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub target_rpm: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct FlappingBody {
    pub window_seconds: u32,
    #[serde(default)]
    pub suppress_below: u32,
    #[serde(default)]
    pub aggregate_at: u32,
    #[serde(default)]
    pub aggregate_max_items: u32,
    #[serde(default)]
    pub aggregate_cooldown_seconds: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct TriggerBody {
    #[serde(default)]
    pub expr: String,
    #[serde(default)]
    pub scope_fields: Vec<String>,
    #[serde(default)]
    pub target: TargetBody,
    #[serde(default)]
    pub flapping: Option<FlappingBody>,
}

/// Full tenant configuration as carried by the admin API. The path
/// parameter is authoritative for the tenant id.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct TenantConfigBody {
    pub display_name: String,
    pub secret_key: String,
    #[serde(default)]
    pub ip_rpm: u32,
    #[serde(default)]
    pub tenant_rpm: u32,
    #[serde(default)]
    pub passthrough: PassthroughBody,
    #[serde(default)]
    pub trigger: TriggerBody,
}

impl TenantConfigBody {
    pub fn into_config(self, tenant_id: &str) -> TenantConfig {
        TenantConfig {
            tenant_id: tenant_id.to_string(),
            display_name: self.display_name,
            secret_key: self.secret_key,
            ip_rpm: self.ip_rpm,
            tenant_rpm: self.tenant_rpm,
            passthrough: Passthrough {
                expr: self.passthrough.expr,
                negate: self.passthrough.negate,
            },
            trigger: TriggerConfig {
                expr: self.trigger.expr,
                scope_fields: self.trigger.scope_fields,
                target: TargetConfig {
                    topic: self.trigger.target.topic,
                    target_rpm: self.trigger.target.target_rpm,
                },
                flapping: self.trigger.flapping.map(|f| FlapConfig {
                    window_seconds: f.window_seconds,
                    suppress_below: f.suppress_below,
                    aggregate_at: f.aggregate_at,
                    aggregate_max_items: f.aggregate_max_items,
                    aggregate_cooldown_seconds: f.aggregate_cooldown_seconds,
                }),
            },
        }
    }
}

impl From<TenantConfig> for TenantConfigBody {
    fn from(config: TenantConfig) -> Self {
        Self {
            display_name: config.display_name,
            secret_key: config.secret_key,
            ip_rpm: config.ip_rpm,
            tenant_rpm: config.tenant_rpm,
            passthrough: PassthroughBody {
                expr: config.passthrough.expr,
                negate: config.passthrough.negate,
            },
            trigger: TriggerBody {
                expr: config.trigger.expr,
                scope_fields: config.trigger.scope_fields,
                target: TargetBody {
                    topic: config.trigger.target.topic,
                    target_rpm: config.trigger.target.target_rpm,
                },
                flapping: config.trigger.flapping.map(|f| FlappingBody {
                    window_seconds: f.window_seconds,
                    suppress_below: f.suppress_below,
                    aggregate_at: f.aggregate_at,
                    aggregate_max_items: f.aggregate_max_items,
                    aggregate_cooldown_seconds: f.aggregate_cooldown_seconds,
                }),
            },
        }
    }
}
