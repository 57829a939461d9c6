pub mod actor;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod request_id;
pub mod services;

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::handlers::AppServices;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: request_id::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// All versioned API routes, nested under `/api/v1` by the caller.
pub fn api_v1_routes() -> Router<AppState> {
    let orders = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))
        .route(
            "/orders/:id/history",
            get(handlers::orders::get_order_history),
        );

    let dispatch = Router::new()
        .route("/orders/:id/assign", post(handlers::dispatch::auto_assign))
        .route(
            "/orders/:id/assign/manual",
            post(handlers::dispatch::manual_assign),
        )
        .route(
            "/orders/:id/offer/respond",
            post(handlers::dispatch::respond_to_offer),
        )
        .route("/orders/:id/claim", post(handlers::dispatch::claim_from_pool))
        .route(
            "/orders/:id/release",
            post(handlers::dispatch::release_assignment),
        )
        .route(
            "/orders/:id/candidates",
            get(handlers::dispatch::list_candidates),
        );

    let tracking = Router::new().route(
        "/orders/:id/tracking",
        get(handlers::tracking::get_tracking),
    );

    let verification = Router::new()
        .route(
            "/orders/:id/verification/generate",
            post(handlers::verification::generate_code),
        )
        .route(
            "/orders/:id/verification/send",
            post(handlers::verification::send_code),
        )
        .route(
            "/orders/:id/verification/regenerate",
            post(handlers::verification::regenerate_code),
        )
        .route(
            "/orders/:id/verification/verify",
            post(handlers::verification::verify_code),
        );

    let drivers = Router::new()
        .route(
            "/drivers/:id/availability",
            put(handlers::drivers::set_availability),
        )
        .route("/drivers/:id/heartbeat", post(handlers::drivers::heartbeat));

    let payments = Router::new().route(
        "/payments/webhook",
        post(handlers::payments::payment_webhook),
    );

    Router::new()
        .merge(orders)
        .merge(dispatch)
        .merge(tracking)
        .merge(verification)
        .merge(drivers)
        .merge(payments)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness(State(state): State<AppState>) -> Json<Value> {
    let db_ok = state.db.ping().await.is_ok();
    Json(json!({
        "status": if db_ok { "ready" } else { "degraded" },
        "database": db_ok,
    }))
}

/// The full application router: versioned API, health probes, Swagger,
/// and the request-id middleware.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .with_state(state)
}
