use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::{errors::ServiceError, services::tracking::TrackingView, ApiResponse, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/tracking",
    summary = "Customer tracking view",
    description = "The 5-stage projection plus a live ETA while the delivery is in transit",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Tracking snapshot", body = ApiResponse<TrackingView>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_tracking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TrackingView>>, ServiceError> {
    let view = state.services.tracking.snapshot(id).await?;
    Ok(Json(ApiResponse::success(view)))
}
