#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use dispatch_api::{
    actor::Actor,
    config::AppConfig,
    db::{self, DbPool},
    entities::{driver, order, restaurant},
    events::{self, EventSender},
    handlers::AppServices,
    notifications::{NotificationBus, RecordingNotificationBus},
    services::orders::{CreateOrderInput, OrderItemInput},
};

/// A full service graph over an in-memory SQLite database, with a
/// recording notification bus instead of Redis.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub bus: Arc<RecordingNotificationBus>,
    pub event_sender: EventSender,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        // A single connection keeps the in-memory database alive and
        // shared for the whole test.
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "redis://127.0.0.1:6379".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        // Peak pricing off so quotes do not depend on the wall clock.
        cfg.fees.peak_lunch_window = String::new();
        cfg.fees.peak_dinner_window = String::new();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");
        let db = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let bus = Arc::new(RecordingNotificationBus::new());
        let bus_dyn: Arc<dyn NotificationBus> = bus.clone();
        let services = AppServices::build(db.clone(), &cfg, event_sender.clone(), bus_dyn);

        Self {
            db,
            services,
            bus,
            event_sender,
            _event_task: event_task,
        }
    }

    /// Restaurant in central Addis Ababa, partnered by default.
    pub async fn seed_restaurant(&self, partnered: bool) -> restaurant::Model {
        restaurant::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test Kitchen".to_string()),
            street: Set("Bole Road".to_string()),
            city: Set("Addis Ababa".to_string()),
            sub_city: Set(Some("Bole".to_string())),
            latitude: Set(9.005),
            longitude: Set(38.763),
            flat_delivery_fee: Set(Decimal::ZERO),
            commission_rate: Set(Decimal::new(15, 2)),
            is_partnered: Set(partnered),
            happy_hour_enabled: Set(false),
            happy_hour_percent: Set(Decimal::ZERO),
            happy_hour_days: Set(None),
            happy_hour_start_date: Set(None),
            happy_hour_end_date: Set(None),
            happy_hour_start_time: Set(None),
            happy_hour_end_time: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed restaurant")
    }

    /// Approved, available driver near the seeded restaurant.
    pub async fn seed_driver(&self, latitude: f64, longitude: f64, rating: f64) -> driver::Model {
        driver::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test Driver".to_string()),
            is_available: Set(true),
            is_active: Set(true),
            verification_status: Set("approved".to_string()),
            vehicle_type: Set("motorcycle".to_string()),
            current_latitude: Set(Some(latitude)),
            current_longitude: Set(Some(longitude)),
            rating: Set(rating),
            completed_deliveries: Set(0),
            last_seen_at: Set(Some(Utc::now())),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed driver")
    }

    /// Creates an order through the checkout service. The drop-off sits
    /// at the restaurant so distance-dependent numbers are exact.
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        restaurant: &restaurant::Model,
    ) -> order::Model {
        let created = self
            .services
            .orders
            .create_order(
                Actor::customer(customer_id),
                CreateOrderInput {
                    restaurant_id: restaurant.id,
                    items: vec![OrderItemInput {
                        name: "Special Burger".to_string(),
                        unit_price: Decimal::new(10_000, 2),
                        quantity: 2,
                    }],
                    delivery_street: "Meskel Flower Road".to_string(),
                    delivery_city: restaurant.city.clone(),
                    delivery_sub_city: restaurant.sub_city.clone(),
                    delivery_latitude: restaurant.latitude,
                    delivery_longitude: restaurant.longitude,
                    payment_method: "cash".to_string(),
                    tip: None,
                },
            )
            .await
            .expect("failed to create order");
        created.order
    }
}
