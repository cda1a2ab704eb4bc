//! OpenAPI schema aggregation for the gateway API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document for
//! docs and client generation.
use crate::api::{
    notify, system, tenants,
    types::{
        ErrorResponse, FlappingBody, HealthStatus, NotifyResponse, PassthroughBody, TargetBody,
        TenantConfigBody, TenantListResponse, TriggerBody,
    },
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "quell-gateway",
        version = "v1",
        description = "Notification-shaping gateway HTTP API"
    ),
    paths(
        notify::notify,
        system::health,
        tenants::list_tenants,
        tenants::get_tenant,
        tenants::put_tenant,
        tenants::delete_tenant
    ),
    components(schemas(
        ErrorResponse,
        NotifyResponse,
        HealthStatus,
        TenantListResponse,
        TenantConfigBody,
        PassthroughBody,
        TriggerBody,
        TargetBody,
        FlappingBody
    )),
    tags(
        (name = "notify", description = "Notification ingestion"),
        (name = "system", description = "Health and liveness"),
        (name = "tenants", description = "Tenant configuration management")
    )
)]
pub struct ApiDoc;
