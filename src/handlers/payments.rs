use axum::{extract::State, response::Json};

use crate::{
    entities::order, errors::ServiceError, services::orders::PaymentWebhookInput, ApiResponse,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    summary = "Payment provider webhook",
    description = "Marks the order paid or failed from the provider's callback",
    request_body = PaymentWebhookInput,
    responses(
        (status = 200, description = "Payment status applied", body = ApiResponse<order::Model>),
        (status = 400, description = "Unsupported webhook payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(request): Json<PaymentWebhookInput>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    let updated = state.services.orders.apply_payment_webhook(request).await?;
    Ok(Json(ApiResponse::success(updated)))
}
