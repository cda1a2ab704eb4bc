//! Tenant configuration admin handlers.
//!
//! # Purpose
//! Administrative CRUD over the config store with consistent error mapping.
//! These routes are the only way configuration changes enter the system;
//! the notification path never mutates it.
use crate::api::error::{ApiError, api_internal, api_not_found, api_validation_error};
use crate::api::types::{TenantConfigBody, TenantListResponse};
use crate::app::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use quell_core::store::StoreError;

#[utoipa::path(
    get,
    path = "/admin/tenants",
    tag = "tenants",
    responses(
        (status = 200, description = "List tenant identifiers", body = TenantListResponse)
    )
)]
pub(crate) async fn list_tenants(
    State(state): State<AppState>,
) -> Result<Json<TenantListResponse>, ApiError> {
    let mut items = state
        .configs
        .list()
        .await
        .map_err(|err| api_internal("failed to list tenants", &err))?;
    items.sort();
    Ok(Json(TenantListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/admin/tenants/{tenant_id}",
    tag = "tenants",
    params(
        ("tenant_id" = String, Path, description = "Tenant identifier")
    ),
    responses(
        (status = 200, description = "Tenant configuration", body = TenantConfigBody),
        (status = 404, description = "Tenant not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_tenant(
    Path(tenant_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TenantConfigBody>, ApiError> {
    match state.configs.get(&tenant_id).await {
        Ok(config) => Ok(Json(config.into())),
        Err(StoreError::NotFound(_)) => Err(api_not_found("tenant not found")),
        Err(err) => Err(api_internal("failed to load tenant", &err)),
    }
}

#[utoipa::path(
    put,
    path = "/admin/tenants/{tenant_id}",
    tag = "tenants",
    params(
        ("tenant_id" = String, Path, description = "Tenant identifier")
    ),
    request_body = TenantConfigBody,
    responses(
        (status = 204, description = "Tenant configuration stored"),
        (status = 400, description = "Validation failure", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn put_tenant(
    Path(tenant_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<TenantConfigBody>,
) -> Result<StatusCode, ApiError> {
    let config = body.into_config(&tenant_id);
    match state.configs.put(&tenant_id, config).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::Invalid(message)) => Err(api_validation_error(&message)),
        Err(err) => Err(api_internal("failed to store tenant", &err)),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/tenants/{tenant_id}",
    tag = "tenants",
    params(
        ("tenant_id" = String, Path, description = "Tenant identifier")
    ),
    responses(
        (status = 204, description = "Tenant deleted"),
        (status = 404, description = "Tenant not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_tenant(
    Path(tenant_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    match state.configs.delete(&tenant_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::NotFound(_)) => Err(api_not_found("tenant not found")),
        Err(err) => Err(api_internal("failed to delete tenant", &err)),
    }
}
