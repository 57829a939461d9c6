use axum::{
    extract::{Path, State},
    response::Json,
};
use sea_orm::EntityTrait;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    actor::{Actor, ActorRole},
    entities::{driver_assignment, order},
    errors::ServiceError,
    services::dispatch::RankedCandidate,
    services::geo::Coordinates,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualAssignRequest {
    pub driver_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OfferResponseRequest {
    pub accept: bool,
}

fn require_operator(actor: Actor) -> Result<(), ServiceError> {
    if !matches!(actor.role, ActorRole::Admin | ActorRole::System) {
        return Err(ServiceError::Forbidden(
            "dispatch operations require an operator role".to_string(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/assign",
    summary = "Auto-assign a driver",
    description = "Offer the order to the best-ranked nearby driver; fails while a prior offer is still live",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Offer created", body = ApiResponse<driver_assignment::Model>),
        (status = 404, description = "No eligible driver within the radius", body = crate::errors::ErrorResponse),
        (status = 409, description = "Offer outstanding or driver already assigned", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order not in a dispatchable status", body = crate::errors::ErrorResponse),
    )
)]
pub async fn auto_assign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<ApiResponse<driver_assignment::Model>>, ServiceError> {
    require_operator(actor)?;
    let assignment = state.services.dispatch.auto_assign_driver(id).await?;
    Ok(Json(ApiResponse::success(assignment)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/assign/manual",
    summary = "Manually assign a driver",
    description = "Operator-selected driver; skips ranking and the accept step",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = ManualAssignRequest,
    responses(
        (status = 200, description = "Driver bound to the order", body = ApiResponse<order::Model>),
        (status = 404, description = "Order or driver not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Driver already assigned", body = crate::errors::ErrorResponse),
        (status = 422, description = "Driver not dispatchable or order not ready", body = crate::errors::ErrorResponse),
    )
)]
pub async fn manual_assign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(request): Json<ManualAssignRequest>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    require_operator(actor)?;
    let updated = state
        .services
        .dispatch
        .manual_assign_driver(id, request.driver_id)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/offer/respond",
    summary = "Answer an outstanding offer",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = OfferResponseRequest,
    responses(
        (status = 200, description = "Response recorded; order present when accepted", body = ApiResponse<Option<order::Model>>),
        (status = 404, description = "No outstanding offer for this driver", body = crate::errors::ErrorResponse),
        (status = 422, description = "Offer already expired", body = crate::errors::ErrorResponse),
    )
)]
pub async fn respond_to_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(request): Json<OfferResponseRequest>,
) -> Result<Json<ApiResponse<Option<order::Model>>>, ServiceError> {
    if actor.role != ActorRole::Driver {
        return Err(ServiceError::Forbidden(
            "only drivers answer offers".to_string(),
        ));
    }
    let outcome = state
        .services
        .dispatch
        .respond_to_offer(id, actor, request.accept)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/claim",
    summary = "Claim from the pool",
    description = "First-come-first-served claim on an unassigned preparing/ready order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Claim won", body = ApiResponse<order::Model>),
        (status = 409, description = "Another driver claimed first", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order not claimable or driver not dispatchable", body = crate::errors::ErrorResponse),
    )
)]
pub async fn claim_from_pool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    if actor.role != ActorRole::Driver {
        return Err(ServiceError::Forbidden(
            "only drivers claim from the pool".to_string(),
        ));
    }
    let updated = state.services.dispatch.accept_from_pool(id, actor).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/release",
    summary = "Release an assignment",
    description = "Hand the order back: clears the driver, deletes the delivery, reopens the pool",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Assignment released", body = ApiResponse<order::Model>),
        (status = 403, description = "Actor does not hold the assignment", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order status no longer allows release", body = crate::errors::ErrorResponse),
    )
)]
pub async fn release_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    if !matches!(actor.role, ActorRole::Driver | ActorRole::Admin) {
        return Err(ServiceError::Forbidden(
            "only the assigned driver or an operator may release".to_string(),
        ));
    }
    let updated = state
        .services
        .dispatch
        .release_assignment(id, actor)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/candidates",
    summary = "Ranked driver candidates",
    description = "Operator view of the ranking the auto-assign pass would use",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Candidates sorted by score", body = ApiResponse<Vec<RankedCandidate>>),
        (status = 404, description = "Order or restaurant not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_candidates(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<ApiResponse<Vec<RankedCandidate>>>, ServiceError> {
    require_operator(actor)?;
    let order = state.services.orders.get_order(id).await?;
    let restaurant = crate::entities::restaurant::Entity::find_by_id(order.restaurant_id)
        .one(&*state.db)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Restaurant {} not found", order.restaurant_id))
        })?;
    let candidates = state
        .services
        .dispatch
        .rank_candidates(
            Coordinates::new(restaurant.latitude, restaurant.longitude),
            &[],
        )
        .await?;
    Ok(Json(ApiResponse::success(candidates)))
}
