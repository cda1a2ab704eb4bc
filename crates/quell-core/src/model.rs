//! Tenant configuration model.
//!
//! # Purpose
//! Defines the per-tenant record that drives authentication, rate limiting,
//! pass-through, and edge/flap behavior, together with its validation rules.
//! The record is stored durably, cached in-process, and mutated only through
//! administrative operations — never by the notification path.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header carrying the tenant identifier (case-insensitive).
pub const TENANT_ID_HEADER: &str = "x-client-id";
/// Header carrying the shared secret (case-insensitive).
pub const TENANT_KEY_HEADER: &str = "x-client-key";

pub const TENANT_ID_MIN_LEN: usize = 4;
pub const SECRET_KEY_MIN_LEN: usize = 8;
/// Smallest flap-counting window accepted by validation.
pub const MIN_WINDOW_SECONDS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("tenant_id must be at least {TENANT_ID_MIN_LEN} characters")]
    TenantIdTooShort,
    #[error("display_name is required")]
    MissingDisplayName,
    #[error("secret_key must be at least {SECRET_KEY_MIN_LEN} characters")]
    SecretKeyTooShort,
    #[error("flapping.window_seconds must be at least {MIN_WINDOW_SECONDS} seconds")]
    WindowTooSmall,
    #[error("flapping.suppress_below must not exceed window_seconds")]
    SuppressBelowOutOfRange,
}

/// Per-tenant stored configuration.
///
/// The `(tenant_id, secret_key)` pair authenticates requests; a mismatch in
/// the credential headers rejects the request with 401. `display_name` is
/// for operators only. `ip_rpm` / `tenant_rpm` cap accepted requests per
/// minute per source address / per tenant; 0 means unlimited.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub display_name: String,
    pub secret_key: String,
    #[serde(default)]
    pub ip_rpm: u32,
    #[serde(default)]
    pub tenant_rpm: u32,
    #[serde(default)]
    pub passthrough: Passthrough,
    #[serde(default)]
    pub trigger: TriggerConfig,
}

/// Forwards matching events as-is, skipping the edge logic entirely.
///
/// `expr` must select a boolean; when `negate` is set the rule inverts, so
/// events NOT matching the expression pass through.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Passthrough {
    #[serde(default)]
    pub expr: String,
    #[serde(default)]
    pub negate: bool,
}

/// Drives edge detection and forwarding.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TriggerConfig {
    /// Selects the value whose edges are tracked (string-coerced). Empty
    /// disables edge logic: requests forward as-is after the rate limits.
    #[serde(default)]
    pub expr: String,
    /// Reserved for narrowing the edge-tracking scope. Carried through
    /// storage but not consulted when deriving the scope key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope_fields: Vec<String>,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flapping: Option<FlapConfig>,
}

/// Downstream destination for forwarded and aggregated notifications.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TargetConfig {
    /// Opaque topic identifier handed to the publisher.
    #[serde(default)]
    pub topic: String,
    /// Max forwards per minute to this target; 0 means unlimited.
    #[serde(default)]
    pub target_rpm: u32,
}

/// Tolerates early flips and condenses noisy patterns into aggregates.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FlapConfig {
    /// Span in seconds over which flips are counted. The window rolls
    /// forward lazily the first time a flip lands past its end.
    pub window_seconds: u32,
    /// Flips numbered 1..=suppress_below within a window are ignored.
    /// 0 disables suppression: every flip forwards.
    #[serde(default)]
    pub suppress_below: u32,
    /// Once the in-window flip count reaches this threshold, send one
    /// aggregate instead of forwarding originals. 0 disables aggregation.
    #[serde(default)]
    pub aggregate_at: u32,
    /// Max recent flips included in an aggregate; 0 means all retained.
    #[serde(default)]
    pub aggregate_max_items: u32,
    /// Minimum seconds between aggregate sends; 0 means no cooldown.
    #[serde(default)]
    pub aggregate_cooldown_seconds: u32,
}

impl TenantConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.tenant_id.len() < TENANT_ID_MIN_LEN {
            return Err(ConfigValidationError::TenantIdTooShort);
        }
        if self.display_name.is_empty() {
            return Err(ConfigValidationError::MissingDisplayName);
        }
        if self.secret_key.len() < SECRET_KEY_MIN_LEN {
            return Err(ConfigValidationError::SecretKeyTooShort);
        }
        if let Some(flapping) = &self.trigger.flapping {
            if flapping.window_seconds < MIN_WINDOW_SECONDS {
                return Err(ConfigValidationError::WindowTooSmall);
            }
            if flapping.suppress_below > flapping.window_seconds {
                return Err(ConfigValidationError::SuppressBelowOutOfRange);
            }
        }
        Ok(())
    }
}
