mod common;

use common::TestApp;
use futures::future::join_all;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use dispatch_api::{
    actor::Actor,
    entities::delivery::{self, Entity as DeliveryEntity},
    entities::driver_assignment::{self, Entity as AssignmentEntity},
    entities::order::Entity as OrderEntity,
    errors::ServiceError,
    services::lifecycle::OrderStatus,
};

async fn ready_order(app: &TestApp, restaurant: &dispatch_api::entities::restaurant::Model) -> Uuid {
    let order = app.create_order(Uuid::new_v4(), restaurant).await;
    let staff = Actor::restaurant(restaurant.id);
    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
    ] {
        app.services
            .lifecycle
            .transition(order.id, staff, status, None)
            .await
            .unwrap();
    }
    order.id
}

#[tokio::test]
async fn auto_assign_offers_the_nearest_driver() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let near = app.seed_driver(9.006, 38.764, 4.0).await;
    let _far = app.seed_driver(9.05, 38.80, 5.0).await;
    let order_id = ready_order(&app, &restaurant).await;

    // The ready transition already dispatched automatically.
    let assignments = AssignmentEntity::find()
        .filter(driver_assignment::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].driver_id, near.id);
    assert_eq!(assignments[0].status, "offered");

    // A second assign call while the offer is live conflicts.
    let err = app
        .services
        .dispatch
        .auto_assign_driver(order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // The driver room heard the offer.
    let events = app
        .bus
        .events_for_room(&format!("driver:{}", near.id))
        .await;
    assert!(events.contains(&"assignment_offer".to_string()));
}

#[tokio::test]
async fn accepting_an_offer_completes_dispatch() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let driver = app.seed_driver(9.006, 38.764, 4.0).await;
    let order_id = ready_order(&app, &restaurant).await;

    let updated = app
        .services
        .dispatch
        .respond_to_offer(order_id, Actor::driver(driver.id), true)
        .await
        .unwrap()
        .expect("acceptance returns the order");

    assert_eq!(updated.driver_id, Some(driver.id));
    assert_eq!(updated.status, "picked_up");

    let deliveries = DeliveryEntity::find()
        .filter(delivery::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].driver_id, driver.id);
    assert_eq!(deliveries[0].status, "picked_up");

    // Dispatch issued a handoff code.
    let stored = OrderEntity::find_by_id(order_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.verification_code.is_some());
    assert!(stored.verification_expires_at.is_some());

    let accepted = AssignmentEntity::find()
        .filter(driver_assignment::Column::OrderId.eq(order_id))
        .filter(driver_assignment::Column::Status.eq("accepted"))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(accepted.len(), 1);
}

#[tokio::test]
async fn rejection_moves_the_offer_to_the_next_driver() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let first = app.seed_driver(9.006, 38.764, 4.0).await;
    let second = app.seed_driver(9.01, 38.77, 4.0).await;
    let order_id = ready_order(&app, &restaurant).await;

    let outcome = app
        .services
        .dispatch
        .respond_to_offer(order_id, Actor::driver(first.id), false)
        .await
        .unwrap();
    assert!(outcome.is_none());

    let assignment = app
        .services
        .dispatch
        .auto_assign_driver(order_id)
        .await
        .unwrap();
    assert_eq!(assignment.driver_id, second.id);
}

#[tokio::test]
async fn pool_claims_are_exclusive_under_contention() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    // No driver near the restaurant at ready-time, so auto-dispatch finds
    // nobody and the order stays in the pool.
    let order_id = ready_order(&app, &restaurant).await;

    let mut drivers = Vec::new();
    for _ in 0..5 {
        drivers.push(app.seed_driver(9.006, 38.764, 4.0).await);
    }

    let attempts = drivers.iter().map(|d| {
        let dispatch = app.services.dispatch.clone();
        let actor = Actor::driver(d.id);
        async move { dispatch.accept_from_pool(order_id, actor).await }
    });
    let results = join_all(attempts).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::Conflict(_))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 4);

    let stored = OrderEntity::find_by_id(order_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.driver_id.is_some());
    assert_eq!(stored.status, "picked_up");

    let accepted = AssignmentEntity::find()
        .filter(driver_assignment::Column::OrderId.eq(order_id))
        .filter(driver_assignment::Column::Status.eq("accepted"))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(accepted.len(), 1);
}

#[tokio::test]
async fn claiming_while_preparing_reserves_the_driver() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let order = app.create_order(Uuid::new_v4(), &restaurant).await;
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

    let driver = app.seed_driver(9.006, 38.764, 4.0).await;
    let claimed = app
        .services
        .dispatch
        .accept_from_pool(order.id, Actor::driver(driver.id))
        .await
        .unwrap();

    // Reserved, but food state untouched and no delivery yet.
    assert_eq!(claimed.driver_id, Some(driver.id));
    assert_eq!(claimed.status, "preparing");
    let deliveries = DeliveryEntity::find()
        .filter(delivery::Column::OrderId.eq(order.id))
        .all(&*app.db)
        .await
        .unwrap();
    assert!(deliveries.is_empty());

    // Readiness completes the reserved claim.
    app.services
        .lifecycle
        .transition(order.id, staff, OrderStatus::Ready, None)
        .await
        .unwrap();
    let stored = OrderEntity::find_by_id(order.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "picked_up");
    let deliveries = DeliveryEntity::find()
        .filter(delivery::Column::OrderId.eq(order.id))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(deliveries.len(), 1);
    assert!(stored.verification_code.is_some());
}

#[tokio::test]
async fn release_reopens_the_pool() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let order_id = ready_order(&app, &restaurant).await;
    let driver = app.seed_driver(9.006, 38.764, 4.0).await;

    app.services
        .dispatch
        .accept_from_pool(order_id, Actor::driver(driver.id))
        .await
        .unwrap();

    let released = app
        .services
        .dispatch
        .release_assignment(order_id, Actor::driver(driver.id))
        .await
        .unwrap();

    assert_eq!(released.driver_id, None);
    assert_eq!(released.status, "ready");
    let deliveries = DeliveryEntity::find()
        .filter(delivery::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .unwrap();
    assert!(deliveries.is_empty());

    // Another driver can now take it.
    let other = app.seed_driver(9.007, 38.765, 4.2).await;
    let reclaimed = app
        .services
        .dispatch
        .accept_from_pool(order_id, Actor::driver(other.id))
        .await
        .unwrap();
    assert_eq!(reclaimed.driver_id, Some(other.id));
}

#[tokio::test]
async fn no_driver_in_radius_is_reported_as_not_found() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    // 75 km away, outside the 10 km radius.
    app.seed_driver(8.54, 39.27, 5.0).await;
    let order_id = ready_order(&app, &restaurant).await;

    let err = app
        .services
        .dispatch
        .auto_assign_driver(order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn unavailable_drivers_never_rank() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let off_duty = app.seed_driver(9.006, 38.764, 5.0).await;
    app.services
        .drivers
        .set_availability(off_duty.id, Actor::driver(off_duty.id), false)
        .await
        .unwrap();

    let candidates = app
        .services
        .dispatch
        .rank_candidates(
            dispatch_api::services::geo::Coordinates::new(restaurant.latitude, restaurant.longitude),
            &[],
        )
        .await
        .unwrap();
    assert!(candidates.is_empty());
}

#[tokio::test]
async fn in_transit_keeps_the_delivery_record_in_step() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let driver = app.seed_driver(9.006, 38.764, 4.5).await;
    let order_id = ready_order(&app, &restaurant).await;

    app.services
        .dispatch
        .respond_to_offer(order_id, Actor::driver(driver.id), true)
        .await
        .unwrap();
    app.services
        .lifecycle
        .transition(order_id, Actor::driver(driver.id), OrderStatus::InTransit, None)
        .await
        .unwrap();

    let delivery = DeliveryEntity::find()
        .filter(delivery::Column::OrderId.eq(order_id))
        .one(&*app.db)
        .await
        .unwrap()
        .expect("dispatched order has a delivery");
    assert_eq!(delivery.status, "in_transit");

    // The live view now reads a consistent pair: stage 4 with an ETA
    // from the driver's last known position.
    let view = app.services.tracking.snapshot(order_id).await.unwrap();
    assert_eq!(view.stage, 4);
    assert_eq!(view.delivery_status.as_deref(), Some("in_transit"));
    assert!(view.eta_minutes.is_some());
    assert!(view.eta_minutes.unwrap() >= 1);
}

#[tokio::test]
async fn driver_handoff_closes_the_delivery_record() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let driver = app.seed_driver(9.006, 38.764, 4.5).await;
    let order_id = ready_order(&app, &restaurant).await;

    app.services
        .dispatch
        .respond_to_offer(order_id, Actor::driver(driver.id), true)
        .await
        .unwrap();
    for status in [OrderStatus::InTransit, OrderStatus::Delivered] {
        app.services
            .lifecycle
            .transition(order_id, Actor::driver(driver.id), status, None)
            .await
            .unwrap();
    }

    let delivery = DeliveryEntity::find()
        .filter(delivery::Column::OrderId.eq(order_id))
        .one(&*app.db)
        .await
        .unwrap()
        .expect("dispatched order has a delivery");
    assert_eq!(delivery.status, "delivered");
    assert!(delivery.delivered_at.is_some());
}

#[tokio::test]
async fn failed_acceptance_leaves_no_partial_binding() {
    let app = TestApp::new().await;
    let restaurant = app.seed_restaurant(true).await;
    let driver = app.seed_driver(9.006, 38.764, 4.5).await;
    let order_id = ready_order(&app, &restaurant).await;

    // Pull the restaurant out from under the accept; the delivery
    // artifacts cannot be built and the whole binding must roll back.
    dispatch_api::entities::restaurant::Entity::delete_by_id(restaurant.id)
        .exec(&*app.db)
        .await
        .unwrap();

    let err = app
        .services
        .dispatch
        .respond_to_offer(order_id, Actor::driver(driver.id), true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let order = OrderEntity::find_by_id(order_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.driver_id, None);
    assert_eq!(order.status, "ready");

    let assignments = AssignmentEntity::find()
        .filter(driver_assignment::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].status, "offered");

    let deliveries = DeliveryEntity::find()
        .filter(delivery::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .unwrap();
    assert!(deliveries.is_empty());
}
