//! Gateway HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! This module centralizes route composition to keep `main` small and
//! testable; integration tests build the same router over in-memory stores.
use crate::api;
use crate::api::openapi::ApiDoc;
use axum::Router;
use quell_core::cache::ConfigCache;
use quell_core::pipeline::RequestPipeline;
use quell_core::store::{ConfigStore, Publisher};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub configs: Arc<dyn ConfigStore>,
    pub cache: Arc<ConfigCache>,
    pub pipeline: Arc<RequestPipeline>,
    pub publisher: Arc<dyn Publisher>,
    /// Per-request deadline around the decision pipeline.
    pub request_timeout: Duration,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
            )
        });

    Router::new()
        .route("/notify", axum::routing::post(api::notify::notify))
        .route("/health", axum::routing::get(api::system::health))
        .route(
            "/admin/tenants",
            axum::routing::get(api::tenants::list_tenants),
        )
        .route(
            "/admin/tenants/:tenant_id",
            axum::routing::get(api::tenants::get_tenant)
                .put(api::tenants::put_tenant)
                .delete(api::tenants::delete_tenant),
        )
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}
