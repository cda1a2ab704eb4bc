//! Notification ingestion handler.
//!
//! # Purpose
//! The hot path: extracts credentials and the source address, enforces the
//! body cap, decodes the JSON payload, runs the decision pipeline under a
//! per-request deadline, publishes when the outcome says so, and maps every
//! outcome to its wire status.
use crate::api::types::NotifyResponse;
use crate::app::AppState;
use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use quell_core::action::Action;
use quell_core::model::{TENANT_ID_HEADER, TENANT_KEY_HEADER};
use quell_core::pipeline::PipelineError;
use quell_core::store::StoreError;
use serde_json::Value;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

/// Inbound bodies are capped at 1 MiB.
const MAX_BODY_BYTES: usize = 1 << 20;

#[utoipa::path(
    post,
    path = "/notify",
    tag = "notify",
    responses(
        (status = 202, description = "Request accepted; status reports the shaping outcome", body = NotifyResponse),
        (status = 400, description = "Unreadable, oversized, or invalid JSON body"),
        (status = 401, description = "Unknown client or invalid credentials"),
        (status = 429, description = "Target rate limit exceeded after a committed edge")
    )
)]
pub(crate) async fn notify(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    metrics::counter!("quell_requests_total").increment(1);
    let (parts, body) = request.into_parts();
    let tenant_id = header_value(&parts.headers, TENANT_ID_HEADER);
    let credential = header_value(&parts.headers, TENANT_KEY_HEADER);

    // Config lookup goes through the TTL cache; an unknown tenant is an
    // auth failure, not a 404, so probes cannot enumerate tenants.
    let config = match state.cache.load(state.configs.as_ref(), &tenant_id).await {
        Ok(config) => config,
        Err(StoreError::NotFound(_)) => {
            return (StatusCode::UNAUTHORIZED, "unknown client").into_response();
        }
        Err(err) => {
            tracing::error!(error = %err, "tenant config load failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "storage error").into_response();
        }
    };

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::BAD_REQUEST, "read error").into_response(),
    };
    if bytes.is_empty() {
        return (StatusCode::BAD_REQUEST, "empty body").into_response();
    }
    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid json").into_response(),
    };

    let source = source_address(&parts.headers, peer);
    let cancel = CancellationToken::new();
    let run = state.pipeline.run(
        &cancel,
        &tenant_id,
        &source,
        &credential,
        &config,
        &payload,
    );
    let result = match tokio::time::timeout(state.request_timeout, run).await {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            tracing::warn!(%tenant_id, "request deadline exceeded");
            return (StatusCode::INTERNAL_SERVER_ERROR, "deadline exceeded").into_response();
        }
    };

    match result {
        Ok(outcome) => {
            if let Some(dispatch) = &outcome.dispatch {
                publish(&state, &config.trigger.target.topic, outcome.action, dispatch).await;
            }
            let status =
                StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::ACCEPTED);
            (
                status,
                Json(NotifyResponse {
                    status: outcome.action.status_text().to_string(),
                }),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn publish(state: &AppState, topic: &str, action: Action, dispatch: &Value) {
    let bytes = match serde_json::to_vec(dispatch) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "dispatch payload encode failed");
            return;
        }
    };
    // Best-effort: a publish failure never unwinds the committed state
    // transition; the submitter still sees the action that was decided.
    if let Err(err) = state.publisher.publish_raw(topic, &bytes).await {
        metrics::counter!("quell_publish_failures_total").increment(1);
        tracing::warn!(topic, action = action.status_text(), error = %err, "publish failed");
    }
}

fn error_response(err: PipelineError) -> Response {
    match err {
        PipelineError::MissingCredentials | PipelineError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, err.to_string()).into_response()
        }
        // Limited submitters are told "accepted" so they drop the event
        // instead of retrying into the same full bucket.
        PipelineError::RateLimitedIp | PipelineError::RateLimitedTenant => {
            (StatusCode::ACCEPTED, err.to_string()).into_response()
        }
        PipelineError::TriggerEval => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        PipelineError::Cancelled => {
            (StatusCode::INTERNAL_SERVER_ERROR, "request cancelled").into_response()
        }
        PipelineError::Storage(inner) => {
            tracing::error!(error = %inner, "pipeline storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage error").into_response()
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// First `X-Forwarded-For` token when present, else the peer address.
fn source_address(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    peer.ip().to_string()
}
