use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    actor::Actor, entities::driver, errors::ServiceError, services::drivers::HeartbeatInput,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

#[utoipa::path(
    put,
    path = "/api/v1/drivers/{id}/availability",
    summary = "Toggle driver availability",
    params(("id" = Uuid, Path, description = "Driver ID")),
    request_body = AvailabilityRequest,
    responses(
        (status = 200, description = "Availability updated", body = ApiResponse<driver::Model>),
        (status = 403, description = "Actor may not manage this driver", body = crate::errors::ErrorResponse),
        (status = 404, description = "Driver not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Driver is deactivated", body = crate::errors::ErrorResponse),
    )
)]
pub async fn set_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<ApiResponse<driver::Model>>, ServiceError> {
    let updated = state
        .services
        .drivers
        .set_availability(id, actor, request.is_available)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    post,
    path = "/api/v1/drivers/{id}/heartbeat",
    summary = "Driver position heartbeat",
    description = "Keeps the driver out of the staleness sweep and feeds live ETA computation",
    params(("id" = Uuid, Path, description = "Driver ID")),
    request_body = HeartbeatInput,
    responses(
        (status = 200, description = "Heartbeat recorded", body = ApiResponse<driver::Model>),
        (status = 400, description = "Invalid coordinates", body = crate::errors::ErrorResponse),
        (status = 404, description = "Driver not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(request): Json<HeartbeatInput>,
) -> Result<Json<ApiResponse<driver::Model>>, ServiceError> {
    let updated = state.services.drivers.heartbeat(id, actor, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}
