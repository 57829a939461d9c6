mod common;

use common::TestApp;
use rust_decimal::Decimal;
use sea_orm::EntityTrait;
use uuid::Uuid;

use dispatch_api::{
    actor::Actor,
    entities::order::Entity as OrderEntity,
    errors::ServiceError,
    services::lifecycle::OrderStatus,
};

#[tokio::test]
async fn checkout_prices_the_order_at_creation() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let customer_id = Uuid::new_v4();
    // One available driver keeps the surge ratio at zero.
    app.seed_driver(9.006, 38.764, 4.8).await;

    let order = app.create_order(customer_id, &restaurant).await;

    // Zero distance: fee floors at the 25.00 minimum.
    assert_eq!(order.subtotal, Decimal::new(20_000, 2));
    assert_eq!(order.delivery_fee, Decimal::new(2_500, 2));
    assert_eq!(order.service_fee, Decimal::new(500, 2));
    assert_eq!(order.discount, Decimal::ZERO);
    assert_eq!(order.total_amount, Decimal::new(23_000, 2));
    assert_eq!(order.status, "pending");
    assert_eq!(order.payment_status, "pending");
    assert_eq!(order.flow_type, "partnered");

    // The restaurant heard about the new order.
    let events = app
        .bus
        .events_for_room(&format!("restaurant:{}", restaurant.id))
        .await;
    assert!(events.contains(&"order_created".to_string()));
}

#[tokio::test]
async fn restaurant_walks_the_preparation_chain() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let order = app.create_order(Uuid::new_v4(), &restaurant).await;
    let staff = Actor::restaurant(restaurant.id);

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
    ] {
        let updated = app
            .services
            .lifecycle
            .transition(order.id, staff, status, None)
            .await
            .expect("transition should succeed");
        assert_eq!(updated.status, status.to_string());
    }

    let stored = OrderEntity::find_by_id(order.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.confirmed_at.is_some());

    let history = app.services.lifecycle.history(order.id).await.unwrap();
    let chain: Vec<(Option<String>, String)> = history
        .iter()
        .map(|h| (h.old_status.clone(), h.new_status.clone()))
        .collect();
    assert_eq!(
        chain,
        vec![
            (None, "pending".to_string()),
            (Some("pending".to_string()), "confirmed".to_string()),
            (Some("confirmed".to_string()), "preparing".to_string()),
            (Some("preparing".to_string()), "ready".to_string()),
        ]
    );
}

#[tokio::test]
async fn restaurant_cancel_at_confirmed_closes_the_pool() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let order = app.create_order(Uuid::new_v4(), &restaurant).await;
    let staff = Actor::restaurant(restaurant.id);
    let driver = app.seed_driver(9.006, 38.764, 4.5).await;

    app.services
        .lifecycle
        .transition(order.id, staff, OrderStatus::Confirmed, None)
        .await
        .unwrap();
    let cancelled = app
        .services
        .lifecycle
        .cancel(order.id, staff, Some("out of stock".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("out of stock"));
    assert!(cancelled.cancelled_at.is_some());

    let history = app.services.lifecycle.history(order.id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.old_status.as_deref(), Some("confirmed"));
    assert_eq!(last.new_status, "cancelled");

    // A pool claim on the cancelled order is rejected as a precondition.
    let err = app
        .services
        .dispatch
        .accept_from_pool(order.id, Actor::driver(driver.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PreconditionFailed(_)));
}

#[tokio::test]
async fn customer_cancel_window_closes_at_preparing() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let customer_id = Uuid::new_v4();
    let order = app.create_order(customer_id, &restaurant).await;
    let customer = Actor::customer(customer_id);
    let staff = Actor::restaurant(restaurant.id);

    app.services
        .lifecycle
        .transition(order.id, staff, OrderStatus::Confirmed, None)
        .await
        .unwrap();
    app.services
        .lifecycle
        .transition(order.id, staff, OrderStatus::Preparing, None)
        .await
        .unwrap();

    let err = app
        .services
        .lifecycle
        .cancel(order.id, customer, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PreconditionFailed(_)));

    let stored = OrderEntity::find_by_id(order.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "preparing");
}

#[tokio::test]
async fn strangers_cannot_touch_the_order() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let order = app.create_order(Uuid::new_v4(), &restaurant).await;

    let err = app
        .services
        .lifecycle
        .cancel(order.id, Actor::customer(Uuid::new_v4()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = app
        .services
        .lifecycle
        .transition(
            order.id,
            Actor::restaurant(Uuid::new_v4()),
            OrderStatus::Confirmed,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn terminal_orders_admit_no_mutation() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let order = app.create_order(Uuid::new_v4(), &restaurant).await;
    let staff = Actor::restaurant(restaurant.id);

    app.services
        .lifecycle
        .cancel(order.id, staff, None)
        .await
        .unwrap();

    let err = app
        .services
        .lifecycle
        .transition(order.id, staff, OrderStatus::Confirmed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PreconditionFailed(_)));
}

#[tokio::test]
async fn status_updates_reach_the_order_room() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let order = app.create_order(Uuid::new_v4(), &restaurant).await;

    app.services
        .lifecycle
        .transition(
            order.id,
            Actor::restaurant(restaurant.id),
            OrderStatus::Confirmed,
            None,
        )
        .await
        .unwrap();

    let events = app
        .bus
        .events_for_room(&format!("order:{}", order.id))
        .await;
    assert!(events.contains(&"status_changed".to_string()));
}

#[tokio::test]
async fn payment_webhook_marks_the_order_paid() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let order = app.create_order(Uuid::new_v4(), &restaurant).await;

    let updated = app
        .services
        .orders
        .apply_payment_webhook(dispatch_api::services::orders::PaymentWebhookInput {
            order_id: order.id,
            transaction_id: "txn-1".to_string(),
            status: "completed".to_string(),
            amount: order.total_amount,
        })
        .await
        .unwrap();
    assert_eq!(updated.payment_status, "completed");

    // Paid while still pending projects tracking stage 2.
    let view = app.services.tracking.snapshot(order.id).await.unwrap();
    assert_eq!(view.stage, 2);
    assert_eq!(view.stage_name, "Payment Verified");
}

#[tokio::test]
async fn checkout_prices_a_cross_town_delivery() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    app.seed_driver(9.006, 38.764, 4.8).await;

    // Due north of the restaurant by exactly 4.00 km of great-circle
    // distance (9.005 + 4 * 180 / (6371 * pi) degrees of latitude).
    let created = app
        .services
        .orders
        .create_order(
            Actor::customer(Uuid::new_v4()),
            dispatch_api::services::orders::CreateOrderInput {
                restaurant_id: restaurant.id,
                items: vec![dispatch_api::services::orders::OrderItemInput {
                    name: "Special Burger".to_string(),
                    unit_price: Decimal::new(10_000, 2),
                    quantity: 2,
                }],
                delivery_street: "Ayat Road".to_string(),
                delivery_city: restaurant.city.clone(),
                delivery_sub_city: restaurant.sub_city.clone(),
                delivery_latitude: 9.04097286423675,
                delivery_longitude: 38.763,
                payment_method: "cash".to_string(),
                tip: None,
            },
        )
        .await
        .unwrap();

    // Urban rate: 15.00 base + 4 km x 20.00 = 95.00, above the floor.
    assert_eq!(created.order.subtotal, Decimal::new(20_000, 2));
    assert_eq!(created.order.delivery_fee, Decimal::new(9_500, 2));
    assert_eq!(created.order.service_fee, Decimal::new(500, 2));
    assert_eq!(created.order.total_amount, Decimal::new(30_000, 2));
}
