use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    actor::Actor,
    errors::ServiceError,
    services::verification::{CodeIssue, VerifyOutcome},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    pub code: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/verification/generate",
    summary = "Ensure a delivery code exists",
    description = "Idempotent: an unexpired code is reused, an expired or missing one is replaced",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Code issued or reused", body = ApiResponse<CodeIssue>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order is terminal", body = crate::errors::ErrorResponse),
    )
)]
pub async fn generate_code(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _actor: Actor,
) -> Result<Json<ApiResponse<CodeIssue>>, ServiceError> {
    let issue = state.services.verification.generate_code(id).await?;
    Ok(Json(ApiResponse::success(issue)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/verification/send",
    summary = "Re-send the delivery code",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Code pushed to customer and driver"),
        (status = 422, description = "No code generated yet", body = crate::errors::ErrorResponse),
    )
)]
pub async fn send_code(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _actor: Actor,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.verification.send_code(id).await?;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/verification/regenerate",
    summary = "Issue a fresh delivery code",
    description = "Replaces the current code regardless of remaining lifetime and resets the attempt budget",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Fresh code issued and sent", body = ApiResponse<CodeIssue>),
        (status = 422, description = "Order is terminal", body = crate::errors::ErrorResponse),
    )
)]
pub async fn regenerate_code(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _actor: Actor,
) -> Result<Json<ApiResponse<CodeIssue>>, ServiceError> {
    let issue = state.services.verification.regenerate_code(id).await?;
    Ok(Json(ApiResponse::success(issue)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/verification/verify",
    summary = "Submit the delivery code",
    description = "A correct code from the assigned driver completes the delivery",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Verified; order is delivered", body = ApiResponse<VerifyOutcome>),
        (status = 400, description = "Incorrect code", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the assigned driver, or attempts exhausted", body = crate::errors::ErrorResponse),
        (status = 410, description = "Code expired", body = crate::errors::ErrorResponse),
        (status = 422, description = "No code generated", body = crate::errors::ErrorResponse),
    )
)]
pub async fn verify_code(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<Json<ApiResponse<VerifyOutcome>>, ServiceError> {
    let outcome = state
        .services
        .verification
        .verify_code(id, actor, request.code.trim())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
