use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dispatch API",
        version = "0.2.0",
        description = r#"
# Food Delivery Dispatch API

Order lifecycle, driver dispatch, delivery tracking and handoff
verification for a food delivery marketplace.

## Actor headers

Every mutating endpoint is actor-scoped. Callers carry their resolved
identity in two headers:

```
X-Actor-Role: customer | restaurant | driver | admin
X-Actor-Id: <uuid>
```

## Error Handling

Failures use a consistent envelope with appropriate status codes:

```json
{
  "error": "Precondition Failed",
  "message": "order ... cannot move from 'delivered' to 'cancelled' as customer",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Checkout and lifecycle endpoints"),
        (name = "Dispatch", description = "Driver matching and assignment endpoints"),
        (name = "Tracking", description = "Customer-facing tracking projection"),
        (name = "Verification", description = "Delivery handoff codes"),
        (name = "Drivers", description = "Driver presence endpoints"),
        (name = "Payments", description = "Payment provider boundary"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::get_order_history,

        // Dispatch
        crate::handlers::dispatch::auto_assign,
        crate::handlers::dispatch::manual_assign,
        crate::handlers::dispatch::respond_to_offer,
        crate::handlers::dispatch::claim_from_pool,
        crate::handlers::dispatch::release_assignment,
        crate::handlers::dispatch::list_candidates,

        // Tracking
        crate::handlers::tracking::get_tracking,

        // Verification
        crate::handlers::verification::generate_code,
        crate::handlers::verification::send_code,
        crate::handlers::verification::regenerate_code,
        crate::handlers::verification::verify_code,

        // Drivers
        crate::handlers::drivers::set_availability,
        crate::handlers::drivers::heartbeat,

        // Payments
        crate::handlers::payments::payment_webhook,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,

            crate::handlers::orders::UpdateStatusRequest,
            crate::handlers::orders::CancelOrderRequest,
            crate::handlers::dispatch::ManualAssignRequest,
            crate::handlers::dispatch::OfferResponseRequest,
            crate::handlers::verification::VerifyCodeRequest,
            crate::handlers::drivers::AvailabilityRequest,

            crate::services::orders::CreateOrderInput,
            crate::services::orders::OrderItemInput,
            crate::services::orders::CreatedOrder,
            crate::services::orders::OrderDetail,
            crate::services::orders::PaymentWebhookInput,
            crate::services::dispatch::RankedCandidate,
            crate::services::tracking::TrackingView,
            crate::services::verification::CodeIssue,
            crate::services::verification::VerifyOutcome,
            crate::services::drivers::HeartbeatInput,
            crate::services::fees::FeeQuote,
            crate::services::lifecycle::OrderStatus,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted beside the JSON document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
