mod common;

use chrono::{Duration, Utc};
use common::TestApp;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};

use dispatch_api::{
    actor::Actor,
    entities::driver::{self, Entity as DriverEntity},
    errors::ServiceError,
    services::drivers::HeartbeatInput,
};

#[tokio::test]
async fn heartbeat_updates_position_and_presence() {
    let app = TestApp::new().await;
    let seeded = app.seed_driver(9.0, 38.7, 4.5).await;

    let updated = app
        .services
        .drivers
        .heartbeat(
            seeded.id,
            Actor::driver(seeded.id),
            HeartbeatInput {
                latitude: 9.01,
                longitude: 38.71,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.current_latitude, Some(9.01));
    assert_eq!(updated.current_longitude, Some(38.71));
    assert!(updated.last_seen_at.is_some());
}

#[tokio::test]
async fn heartbeat_rejects_bad_coordinates() {
    let app = TestApp::new().await;
    let seeded = app.seed_driver(9.0, 38.7, 4.5).await;

    let err = app
        .services
        .drivers
        .heartbeat(
            seeded.id,
            Actor::driver(seeded.id),
            HeartbeatInput {
                latitude: 123.0,
                longitude: 38.71,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn drivers_only_manage_themselves() {
    let app = TestApp::new().await;
    let a = app.seed_driver(9.0, 38.7, 4.5).await;
    let b = app.seed_driver(9.1, 38.8, 4.5).await;

    let err = app
        .services
        .drivers
        .set_availability(a.id, Actor::driver(b.id), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    // Admins may.
    app.services
        .drivers
        .set_availability(a.id, Actor::admin(uuid::Uuid::new_v4()), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn deactivated_drivers_cannot_go_available() {
    let app = TestApp::new().await;
    let seeded = app.seed_driver(9.0, 38.7, 4.5).await;

    let mut active: driver::ActiveModel = seeded.clone().into();
    active.is_active = Set(false);
    active.is_available = Set(false);
    active.update(&*app.db).await.unwrap();

    let err = app
        .services
        .drivers
        .set_availability(seeded.id, Actor::driver(seeded.id), true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PreconditionFailed(_)));
}

#[tokio::test]
async fn staleness_sweep_flips_silent_drivers_once() {
    let app = TestApp::new().await;
    let fresh = app.seed_driver(9.0, 38.7, 4.5).await;
    let stale = app.seed_driver(9.1, 38.8, 4.5).await;
    let silent = app.seed_driver(9.2, 38.9, 4.5).await;

    let mut active: driver::ActiveModel = stale.clone().into();
    active.last_seen_at = Set(Some(Utc::now() - Duration::minutes(10)));
    active.update(&*app.db).await.unwrap();
    let mut active: driver::ActiveModel = silent.clone().into();
    active.last_seen_at = Set(None);
    active.update(&*app.db).await.unwrap();

    let flipped = app.services.monitor.sweep_once().await.unwrap();
    assert_eq!(flipped, 2);

    let still_available = DriverEntity::find_by_id(fresh.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(still_available.is_available);
    let now_off = DriverEntity::find_by_id(stale.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!now_off.is_available);

    // Re-running with nothing stale is a no-op.
    let flipped = app.services.monitor.sweep_once().await.unwrap();
    assert_eq!(flipped, 0);
}
