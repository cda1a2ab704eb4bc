//! Edge detection and flap aggregation.
//!
//! # Purpose
//! The persistent state machine behind the gateway's shaping decisions. One
//! evaluation is a single load + compare-and-set against the state store:
//! first observation creates the record, a stable value reads without
//! writing, and a flip updates the window counters and decides between
//! forwarding, suppressing, and emitting an aggregate.
//!
//! # Concurrency
//! Concurrent evaluations on the same (tenant, scope) are serialized by the
//! store's CAS; at most one transition commits per version step. A lost race
//! surfaces in [`EngineOutcome::raced`] so the caller can re-run the whole
//! evaluation once — a re-load and re-decide, never a tight retry loop.
use crate::action::Action;
use crate::clock::Clock;
use crate::codec::{self, CodecError};
use crate::model::FlapConfig;
use crate::scope;
use crate::state::{EdgeState, Flip};
use crate::store::{StateStore, StoreError};
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("evaluation cancelled")]
    Cancelled,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result of one engine evaluation.
#[derive(Debug)]
pub struct EngineOutcome {
    pub action: Action,
    /// Replacement payload, present only for [`Action::AggregateSent`].
    pub aggregate: Option<Value>,
    /// The evaluation lost a CAS race and its action degraded; the caller
    /// may re-run the evaluation once.
    pub raced: bool,
}

impl EngineOutcome {
    fn committed(action: Action) -> Self {
        Self {
            action,
            aggregate: None,
            raced: false,
        }
    }

    fn raced(action: Action) -> Self {
        Self {
            action,
            aggregate: None,
            raced: true,
        }
    }
}

pub struct EdgeFlapEngine {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
}

impl EdgeFlapEngine {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Applies edge detection + flapping logic for `new_value` and persists
    /// the transition via CAS.
    pub async fn evaluate(
        &self,
        cancel: &CancellationToken,
        tenant_id: &str,
        scope_key: &str,
        new_value: &str,
        flap: Option<&FlapConfig>,
        payload: &Value,
    ) -> Result<EngineOutcome, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let now = self.clock.epoch_secs();
        let loaded = self.store.load(tenant_id, scope_key).await?;

        let (mut state, version) = match loaded {
            None => {
                // First observation counts as an edge.
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                let created = self
                    .store
                    .upsert_cas(tenant_id, scope_key, 0, scope::new_state(scope_key, new_value, now))
                    .await?;
                if created {
                    tracing::debug!(tenant_id, scope_key, value = new_value, "edge scope created");
                    return Ok(EngineOutcome::committed(Action::EdgeTriggeredForward));
                }
                // Another task created the record first; degrade and let the
                // caller re-run against the committed state.
                return Ok(EngineOutcome::raced(Action::SuppressFlapping));
            }
            Some(existing) => existing,
        };

        // Stable value: read-only, no contention.
        if state.last_value == new_value {
            return Ok(EngineOutcome::committed(Action::NoOp));
        }

        // Flip observed.
        let previous = std::mem::replace(&mut state.last_value, new_value.to_string());
        state.push_recent(Flip {
            at: now,
            from: previous,
            to: new_value.to_string(),
            payload: codec::encode(payload)?,
        });
        state.last_change_ts = now;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        if let Some(flap) = flap {
            let new_window =
                flap.window_seconds > 0 && now - state.window_start > i64::from(flap.window_seconds);
            if new_window {
                // The flip we just appended is the first of the new window;
                // older flips belong to the closed one.
                state.window_start = now;
                state.flip_count = 1;
                let keep = state.recent.len().saturating_sub(1);
                state.recent.drain(..keep);
            } else {
                state.flip_count += 1;
            }

            // Early flips under the tolerance are ignored outright. The
            // write is advisory: losing a race here reverts to the same
            // observable outcome, so neither a miss nor an error changes
            // the decision.
            if state.flip_count <= flap.suppress_below {
                if let Err(err) = self
                    .store
                    .upsert_cas(tenant_id, scope_key, version, state)
                    .await
                {
                    tracing::warn!(tenant_id, scope_key, error = %err, "suppressed-flip write failed");
                }
                return Ok(EngineOutcome::committed(Action::SuppressFlapping));
            }

            if flap.aggregate_at > 0 && !new_window {
                let threshold = flap.aggregate_at as usize;
                let mut action = Action::SuppressFlapping;
                let mut aggregate = None;
                if state.flip_count >= flap.aggregate_at
                    && now > state.agg_until_ts
                    && state.recent.len() >= threshold
                {
                    state.agg_until_ts = now + i64::from(flap.aggregate_cooldown_seconds);
                    aggregate = Some(build_aggregate(&state, flap.aggregate_max_items as usize));
                    state.recent.clear();
                    action = Action::AggregateSent;
                }
                let committed = self
                    .store
                    .upsert_cas(tenant_id, scope_key, version, state)
                    .await?;
                if committed {
                    return Ok(EngineOutcome {
                        action,
                        aggregate: if action == Action::AggregateSent {
                            aggregate
                        } else {
                            None
                        },
                        raced: false,
                    });
                }
                return Ok(EngineOutcome::raced(Action::NoOp));
            }
            // Window rolled (or aggregation is off): fall through to a plain
            // edge forward — the first flip out of a quiet period notifies.
        }

        let committed = self
            .store
            .upsert_cas(tenant_id, scope_key, version, state)
            .await?;
        if committed {
            tracing::debug!(tenant_id, scope_key, value = new_value, "edge forwarded");
            Ok(EngineOutcome::committed(Action::EdgeTriggeredForward))
        } else {
            Ok(EngineOutcome::raced(Action::NoOp))
        }
    }
}

/// Builds the aggregate payload from the retained flips, newest first.
/// `max_items == 0` includes everything retained; a stored payload that no
/// longer decodes contributes `null`.
fn build_aggregate(state: &EdgeState, max_items: usize) -> Value {
    let take = if max_items > 0 {
        max_items.min(state.recent.len())
    } else {
        state.recent.len()
    };
    let items: Vec<Value> = state
        .recent
        .iter()
        .rev()
        .take(take)
        .map(|flip| {
            let payload = if flip.payload.is_empty() {
                Value::Null
            } else {
                codec::decode(&flip.payload)
                    .ok()
                    .and_then(|bytes| serde_json::from_slice(&bytes).ok())
                    .unwrap_or(Value::Null)
            };
            json!({
                "at": flip.at,
                "from": flip.from,
                "to": flip.to,
                "payload": payload,
            })
        })
        .collect();
    json!({
        "type": "flap_aggregate",
        "scope": state.scope_key,
        "last_value": state.last_value,
        "window_start": state.window_start,
        "flip_count": state.flip_count,
        "recent": items,
    })
}
