//! Per-request decision pipeline.
//!
//! # Purpose
//! Runs one notification through authentication, the layered rate limits,
//! the pass-through rule, trigger evaluation, the edge/flap engine, and the
//! target rate limit, producing the action plus the payload to dispatch.
//! Rate-limit rejections and auth failures are ordinary outcomes surfaced
//! as typed errors; the transport maps them to wire responses.
use crate::action::Action;
use crate::clock::Clock;
use crate::engine::{EdgeFlapEngine, EngineError};
use crate::expr;
use crate::model::TenantConfig;
use crate::scope;
use crate::store::{RateLimiter, StateStore, StoreError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Credential headers absent.
    #[error("missing headers")]
    MissingCredentials,
    /// Credential did not match the tenant secret.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Source address exhausted its per-minute budget.
    #[error("rate limit (ip)")]
    RateLimitedIp,
    /// Tenant exhausted its per-minute budget.
    #[error("rate limit (client)")]
    RateLimitedTenant,
    /// The trigger expression failed to evaluate.
    #[error("trigger field eval error")]
    TriggerEval,
    #[error("request cancelled")]
    Cancelled,
    #[error("storage error")]
    Storage(#[source] StoreError),
}

impl From<EngineError> for PipelineError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Cancelled => PipelineError::Cancelled,
            EngineError::Store(inner) => PipelineError::Storage(inner),
            EngineError::Codec(inner) => {
                PipelineError::Storage(StoreError::Unexpected(inner.into()))
            }
        }
    }
}

/// What the transport should do with the request.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub action: Action,
    /// HTTP-like status the transport reports; 202 normally, 429 when the
    /// target limiter demoted a committed forward.
    pub status: u16,
    /// Payload to publish: the aggregate for [`Action::AggregateSent`], the
    /// original for forwards, nothing otherwise.
    pub dispatch: Option<Value>,
}

impl PipelineOutcome {
    fn accepted(action: Action, dispatch: Option<Value>) -> Self {
        Self {
            action,
            status: 202,
            dispatch,
        }
    }
}

pub struct RequestPipeline {
    rate: Arc<dyn RateLimiter>,
    engine: EdgeFlapEngine,
}

impl RequestPipeline {
    pub fn new(
        rate: Arc<dyn RateLimiter>,
        state: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rate,
            engine: EdgeFlapEngine::new(state, clock),
        }
    }

    /// Processes one notification for an already-resolved tenant config.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        tenant_id: &str,
        source_addr: &str,
        credential: &str,
        config: &TenantConfig,
        payload: &Value,
    ) -> Result<PipelineOutcome, PipelineError> {
        authenticate(config, tenant_id, credential)?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        if config.ip_rpm > 0 {
            let granted = self
                .rate
                .acquire(
                    cancel,
                    &format!("IP:{source_addr}"),
                    config.ip_rpm,
                    RATE_WINDOW,
                )
                .await
                .map_err(PipelineError::Storage)?;
            if !granted {
                metrics::counter!("quell_rejections_total", "reason" => "ip_rate_limit")
                    .increment(1);
                return Err(PipelineError::RateLimitedIp);
            }
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        if config.tenant_rpm > 0 {
            let granted = self
                .rate
                .acquire(
                    cancel,
                    &format!("CLIENT:{tenant_id}"),
                    config.tenant_rpm,
                    RATE_WINDOW,
                )
                .await
                .map_err(PipelineError::Storage)?;
            if !granted {
                metrics::counter!("quell_rejections_total", "reason" => "tenant_rate_limit")
                    .increment(1);
                return Err(PipelineError::RateLimitedTenant);
            }
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Matching events skip the edge logic entirely: no state is read or
        // written for them.
        if check_passthrough(&config.passthrough, payload) {
            return Ok(self.finish(Action::ForwardedAsIs, Some(payload.clone())));
        }

        // No field to watch means nothing to deduplicate on; forward.
        if config.trigger.expr.is_empty() {
            return Ok(self.finish(Action::ForwardedAsIs, Some(payload.clone())));
        }

        let value = expr::eval_string(&config.trigger.expr, payload).map_err(|err| {
            tracing::debug!(tenant_id, error = %err, "trigger expression failed");
            PipelineError::TriggerEval
        })?;

        let mut action = Action::NoOp;
        let mut aggregate = None;
        if let Some(value) = value {
            let scope_key = scope::fingerprint(&config.trigger.expr);
            let flap = config.trigger.flapping.as_ref();
            let mut outcome = self
                .engine
                .evaluate(cancel, tenant_id, &scope_key, &value, flap, payload)
                .await?;
            if outcome.raced {
                // One full re-evaluation against the committed state; a
                // second miss keeps the degraded action.
                tracing::debug!(tenant_id, %scope_key, "edge CAS raced, retrying evaluation");
                outcome = self
                    .engine
                    .evaluate(cancel, tenant_id, &scope_key, &value, flap, payload)
                    .await?;
            }
            action = outcome.action;
            aggregate = outcome.aggregate;
        }

        if action.counts_against_target() && config.trigger.target.target_rpm > 0 {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let target_scope = format!("TARGET:{tenant_id}:{}", config.trigger.target.topic);
            let granted = self
                .rate
                .acquire(
                    cancel,
                    &target_scope,
                    config.trigger.target.target_rpm,
                    RATE_WINDOW,
                )
                .await
                .map_err(PipelineError::Storage)?;
            if !granted {
                // The state transition already committed; the downstream
                // just never hears about this edge.
                metrics::counter!("quell_rejections_total", "reason" => "target_rate_limit")
                    .increment(1);
                return Ok(PipelineOutcome {
                    action: Action::NoOp,
                    status: 429,
                    dispatch: None,
                });
            }
        }

        let dispatch = match action {
            Action::AggregateSent => aggregate,
            Action::EdgeTriggeredForward => Some(payload.clone()),
            _ => None,
        };
        Ok(self.finish(action, dispatch))
    }

    fn finish(&self, action: Action, dispatch: Option<Value>) -> PipelineOutcome {
        metrics::counter!("quell_actions_total", "action" => action.status_text()).increment(1);
        PipelineOutcome::accepted(action, dispatch)
    }
}

/// Constant-time credential check against the tenant's shared secret.
fn authenticate(
    config: &TenantConfig,
    tenant_id: &str,
    credential: &str,
) -> Result<(), PipelineError> {
    if tenant_id.is_empty() || credential.is_empty() {
        return Err(PipelineError::MissingCredentials);
    }
    let matches: bool = credential
        .as_bytes()
        .ct_eq(config.secret_key.as_bytes())
        .into();
    if !matches {
        metrics::counter!("quell_rejections_total", "reason" => "auth").increment(1);
        return Err(PipelineError::InvalidCredentials);
    }
    Ok(())
}

/// Pass-through rule: non-empty expression selecting a boolean `b`, passing
/// when `b XOR negate` is true. `negate` only inverts genuine booleans:
/// missing, non-boolean, and malformed selections never pass through.
fn check_passthrough(rule: &crate::model::Passthrough, payload: &Value) -> bool {
    if rule.expr.is_empty() {
        return false;
    }
    match expr::eval_any(&rule.expr, payload) {
        Ok(Some(Value::Bool(matched))) => matched != rule.negate,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{FlapConfig, Passthrough, TargetConfig, TriggerConfig};
    use crate::store::memory::{InMemoryRateLimiter, InMemoryStateStore};
    use serde_json::json;

    struct Fixture {
        pipeline: RequestPipeline,
        state: Arc<InMemoryStateStore>,
        clock: Arc<ManualClock>,
        cancel: CancellationToken,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(10_000);
        let state = Arc::new(InMemoryStateStore::new());
        Fixture {
            pipeline: RequestPipeline::new(
                Arc::new(InMemoryRateLimiter::with_clock(clock.clone())),
                state.clone(),
                clock.clone(),
            ),
            state,
            clock,
            cancel: CancellationToken::new(),
        }
    }

    fn config() -> TenantConfig {
        TenantConfig {
            tenant_id: "tenant-1".to_string(),
            display_name: "Tenant One".to_string(),
            secret_key: "k12345678".to_string(),
            ip_rpm: 0,
            tenant_rpm: 0,
            passthrough: Passthrough::default(),
            trigger: TriggerConfig {
                expr: "$.event.type".to_string(),
                scope_fields: Vec::new(),
                target: TargetConfig {
                    topic: "T".to_string(),
                    target_rpm: 0,
                },
                flapping: None,
            },
        }
    }

    async fn run(fx: &Fixture, cfg: &TenantConfig, payload: Value) -> PipelineOutcome {
        fx.pipeline
            .run(
                &fx.cancel,
                "tenant-1",
                "10.0.0.1",
                "k12345678",
                cfg,
                &payload,
            )
            .await
            .expect("run")
    }

    #[tokio::test]
    async fn rejects_missing_and_bad_credentials() {
        let fx = fixture();
        let cfg = config();
        let err = fx
            .pipeline
            .run(&fx.cancel, "tenant-1", "10.0.0.1", "", &cfg, &json!({}))
            .await
            .expect_err("missing");
        assert!(matches!(err, PipelineError::MissingCredentials));

        let err = fx
            .pipeline
            .run(
                &fx.cancel,
                "tenant-1",
                "10.0.0.1",
                "wrong-key",
                &cfg,
                &json!({}),
            )
            .await
            .expect_err("mismatch");
        assert!(matches!(err, PipelineError::InvalidCredentials));
    }

    #[tokio::test]
    async fn ip_limit_rejects_after_cap() {
        let fx = fixture();
        let mut cfg = config();
        cfg.ip_rpm = 2;
        for _ in 0..2 {
            run(&fx, &cfg, json!({"event": {"type": "e1"}})).await;
        }
        let err = fx
            .pipeline
            .run(
                &fx.cancel,
                "tenant-1",
                "10.0.0.1",
                "k12345678",
                &cfg,
                &json!({"event": {"type": "e1"}}),
            )
            .await
            .expect_err("limited");
        assert!(matches!(err, PipelineError::RateLimitedIp));
    }

    #[tokio::test]
    async fn tenant_limit_rejects_after_cap() {
        let fx = fixture();
        let mut cfg = config();
        cfg.tenant_rpm = 1;
        run(&fx, &cfg, json!({"event": {"type": "e1"}})).await;
        let err = fx
            .pipeline
            .run(
                &fx.cancel,
                "tenant-1",
                "10.0.0.2",
                "k12345678",
                &cfg,
                &json!({"event": {"type": "e1"}}),
            )
            .await
            .expect_err("limited");
        assert!(matches!(err, PipelineError::RateLimitedTenant));
    }

    #[tokio::test]
    async fn passthrough_short_circuits_without_touching_state() {
        let fx = fixture();
        let mut cfg = config();
        cfg.passthrough = Passthrough {
            expr: "$.urgent".to_string(),
            negate: false,
        };
        let outcome = run(&fx, &cfg, json!({"urgent": true, "event": {"type": "e1"}})).await;
        assert_eq!(outcome.action, Action::ForwardedAsIs);
        assert!(outcome.dispatch.is_some());

        let scope_key = scope::fingerprint(&cfg.trigger.expr);
        assert!(
            fx.state
                .load("tenant-1", &scope_key)
                .await
                .expect("load")
                .is_none()
        );
    }

    #[tokio::test]
    async fn negated_passthrough_inverts_the_match() {
        let fx = fixture();
        let mut cfg = config();
        cfg.passthrough = Passthrough {
            expr: "$.urgent".to_string(),
            negate: true,
        };
        // urgent=true with negate → no pass-through; edge logic runs.
        let outcome = run(&fx, &cfg, json!({"urgent": true, "event": {"type": "e1"}})).await;
        assert_eq!(outcome.action, Action::EdgeTriggeredForward);

        // urgent=false with negate → pass-through.
        let outcome = run(&fx, &cfg, json!({"urgent": false, "event": {"type": "e1"}})).await;
        assert_eq!(outcome.action, Action::ForwardedAsIs);
    }

    #[tokio::test]
    async fn negated_passthrough_ignores_non_boolean_selections() {
        let fx = fixture();
        let mut cfg = config();
        cfg.passthrough = Passthrough {
            expr: "$.urgent".to_string(),
            negate: true,
        };
        // Missing field: negate must not turn the absence into a match.
        let outcome = run(&fx, &cfg, json!({"event": {"type": "e1"}})).await;
        assert_eq!(outcome.action, Action::EdgeTriggeredForward);

        // Non-boolean selection is equally ignored.
        let outcome = run(&fx, &cfg, json!({"urgent": "yes", "event": {"type": "e2"}})).await;
        assert_eq!(outcome.action, Action::EdgeTriggeredForward);
    }

    #[tokio::test]
    async fn malformed_passthrough_never_matches() {
        let fx = fixture();
        let mut cfg = config();
        cfg.passthrough = Passthrough {
            expr: "$.[broken".to_string(),
            negate: true,
        };
        // A broken rule must not forward traffic around the edge engine.
        let outcome = run(&fx, &cfg, json!({"event": {"type": "e1"}})).await;
        assert_eq!(outcome.action, Action::EdgeTriggeredForward);
    }

    #[tokio::test]
    async fn empty_trigger_forwards_as_is() {
        let fx = fixture();
        let mut cfg = config();
        cfg.trigger.expr = String::new();
        let outcome = run(&fx, &cfg, json!({"anything": 1})).await;
        assert_eq!(outcome.action, Action::ForwardedAsIs);
        assert_eq!(outcome.status, 202);
    }

    #[tokio::test]
    async fn malformed_trigger_is_an_eval_error() {
        let fx = fixture();
        let mut cfg = config();
        cfg.trigger.expr = "$.[broken".to_string();
        let err = fx
            .pipeline
            .run(
                &fx.cancel,
                "tenant-1",
                "10.0.0.1",
                "k12345678",
                &cfg,
                &json!({}),
            )
            .await
            .expect_err("eval error");
        assert!(matches!(err, PipelineError::TriggerEval));
    }

    #[tokio::test]
    async fn missing_trigger_value_is_noop_without_state() {
        let fx = fixture();
        let cfg = config();
        let outcome = run(&fx, &cfg, json!({"other": 1})).await;
        assert_eq!(outcome.action, Action::NoOp);
        assert!(outcome.dispatch.is_none());

        let scope_key = scope::fingerprint(&cfg.trigger.expr);
        assert!(
            fx.state
                .load("tenant-1", &scope_key)
                .await
                .expect("load")
                .is_none()
        );
    }

    #[tokio::test]
    async fn stable_sequence_forwards_once() {
        let fx = fixture();
        let cfg = config();
        let mut actions = Vec::new();
        for _ in 0..10 {
            let outcome = run(&fx, &cfg, json!({"event": {"type": "e1"}})).await;
            actions.push(outcome.action);
        }
        assert_eq!(actions[0], Action::EdgeTriggeredForward);
        assert!(actions[1..].iter().all(|a| *a == Action::NoOp));
    }

    #[tokio::test]
    async fn target_limit_demotes_committed_forwards() {
        let fx = fixture();
        let mut cfg = config();
        cfg.trigger.target.target_rpm = 2;

        for (i, value) in ["e1", "e2", "e3"].iter().enumerate() {
            fx.clock.advance(1);
            let outcome = run(&fx, &cfg, json!({"event": {"type": value}})).await;
            if i < 2 {
                assert_eq!(outcome.action, Action::EdgeTriggeredForward);
                assert_eq!(outcome.status, 202);
            } else {
                assert_eq!(outcome.action, Action::NoOp);
                assert_eq!(outcome.status, 429);
                assert!(outcome.dispatch.is_none());
            }
        }

        // The demoted edge still committed: the same value is now stable.
        fx.clock.advance(1);
        let outcome = run(&fx, &cfg, json!({"event": {"type": "e3"}})).await;
        assert_eq!(outcome.action, Action::NoOp);
        assert_eq!(outcome.status, 202);
    }

    #[tokio::test]
    async fn aggregate_outcome_carries_replacement_payload() {
        let fx = fixture();
        let mut cfg = config();
        cfg.trigger.flapping = Some(FlapConfig {
            window_seconds: 300,
            suppress_below: 0,
            aggregate_at: 3,
            aggregate_max_items: 3,
            aggregate_cooldown_seconds: 0,
        });

        run(&fx, &cfg, json!({"event": {"type": "e0"}})).await;
        let mut statuses = Vec::new();
        for value in ["e1", "e0", "e1", "e0"] {
            fx.clock.advance(1);
            let outcome = run(&fx, &cfg, json!({"event": {"type": value}})).await;
            if outcome.action == Action::AggregateSent {
                let dispatch = outcome.dispatch.as_ref().expect("aggregate payload");
                assert_eq!(dispatch["type"], "flap_aggregate");
                assert_eq!(dispatch["recent"].as_array().map(Vec::len), Some(3));
            }
            statuses.push(outcome.action);
        }
        assert_eq!(
            statuses,
            vec![
                Action::SuppressFlapping,
                Action::SuppressFlapping,
                Action::AggregateSent,
                Action::SuppressFlapping,
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_pipeline() {
        let fx = fixture();
        let cfg = config();
        fx.cancel.cancel();
        let err = fx
            .pipeline
            .run(
                &fx.cancel,
                "tenant-1",
                "10.0.0.1",
                "k12345678",
                &cfg,
                &json!({"event": {"type": "e1"}}),
            )
            .await
            .expect_err("cancelled");
        assert!(matches!(err, PipelineError::Cancelled));
    }
}
