use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A room-addressed message pushed to client apps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMessage {
    pub event: String,
    pub payload: Value,
    pub sent_at: DateTime<Utc>,
}

impl RoomMessage {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
            sent_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Publish port for the order/driver/restaurant rooms.
///
/// Emission is fire-and-forget relative to the mutating transaction. The
/// caller commits first, and a delivery failure is logged and swallowed,
/// never propagated.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    async fn emit_to_order(&self, order_id: Uuid, message: RoomMessage)
        -> Result<(), NotificationError>;
    async fn emit_to_driver(
        &self,
        driver_id: Uuid,
        message: RoomMessage,
    ) -> Result<(), NotificationError>;
    async fn emit_to_restaurant(
        &self,
        restaurant_id: Uuid,
        message: RoomMessage,
    ) -> Result<(), NotificationError>;
    /// Shared room every online driver watches for pool availability.
    async fn broadcast_to_drivers(&self, message: RoomMessage) -> Result<(), NotificationError>;
}

/// Emits on a best-effort basis: failures are logged, never returned.
pub async fn emit_best_effort(
    bus: &Arc<dyn NotificationBus>,
    room: Room,
    message: RoomMessage,
) {
    let result = match room {
        Room::Order(id) => bus.emit_to_order(id, message).await,
        Room::Driver(id) => bus.emit_to_driver(id, message).await,
        Room::Restaurant(id) => bus.emit_to_restaurant(id, message).await,
        Room::Drivers => bus.broadcast_to_drivers(message).await,
    };
    if let Err(e) = result {
        warn!(error = %e, "notification delivery failed; continuing");
    }
}

/// Addressable rooms.
#[derive(Debug, Clone, Copy)]
pub enum Room {
    Order(Uuid),
    Driver(Uuid),
    Restaurant(Uuid),
    Drivers,
}

/// Redis pub/sub implementation; one channel per room.
#[derive(Clone)]
pub struct RedisNotificationBus {
    redis: Arc<redis::Client>,
}

impl RedisNotificationBus {
    pub fn new(redis: Arc<redis::Client>) -> Self {
        Self { redis }
    }

    fn order_room(order_id: Uuid) -> String {
        format!("order:{}", order_id)
    }

    fn driver_room(driver_id: Uuid) -> String {
        format!("driver:{}", driver_id)
    }

    fn restaurant_room(restaurant_id: Uuid) -> String {
        format!("restaurant:{}", restaurant_id)
    }

    const DRIVERS_ROOM: &'static str = "drivers";

    async fn publish(&self, channel: String, message: RoomMessage) -> Result<(), NotificationError> {
        let mut conn = self.redis.get_async_connection().await?;
        let json = serde_json::to_string(&message)?;
        let receivers: i64 = conn.publish(&channel, json).await?;
        debug!(channel = %channel, receivers, event = %message.event, "room message published");
        Ok(())
    }
}

#[async_trait]
impl NotificationBus for RedisNotificationBus {
    #[instrument(skip(self, message), fields(order_id = %order_id, event = %message.event))]
    async fn emit_to_order(
        &self,
        order_id: Uuid,
        message: RoomMessage,
    ) -> Result<(), NotificationError> {
        self.publish(Self::order_room(order_id), message).await
    }

    #[instrument(skip(self, message), fields(driver_id = %driver_id, event = %message.event))]
    async fn emit_to_driver(
        &self,
        driver_id: Uuid,
        message: RoomMessage,
    ) -> Result<(), NotificationError> {
        self.publish(Self::driver_room(driver_id), message).await
    }

    #[instrument(skip(self, message), fields(restaurant_id = %restaurant_id, event = %message.event))]
    async fn emit_to_restaurant(
        &self,
        restaurant_id: Uuid,
        message: RoomMessage,
    ) -> Result<(), NotificationError> {
        self.publish(Self::restaurant_room(restaurant_id), message)
            .await
    }

    #[instrument(skip(self, message), fields(event = %message.event))]
    async fn broadcast_to_drivers(&self, message: RoomMessage) -> Result<(), NotificationError> {
        self.publish(Self::DRIVERS_ROOM.to_string(), message).await
    }
}

/// In-memory bus recording every emission; used by unit and integration
/// tests to assert on fan-out without a broker.
#[derive(Default)]
pub struct RecordingNotificationBus {
    emitted: tokio::sync::Mutex<Vec<(String, RoomMessage)>>,
}

impl RecordingNotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(room, message)` pairs emitted so far.
    pub async fn emitted(&self) -> Vec<(String, RoomMessage)> {
        self.emitted.lock().await.clone()
    }

    pub async fn events_for_room(&self, room: &str) -> Vec<String> {
        self.emitted
            .lock()
            .await
            .iter()
            .filter(|(r, _)| r == room)
            .map(|(_, m)| m.event.clone())
            .collect()
    }

    async fn record(&self, room: String, message: RoomMessage) -> Result<(), NotificationError> {
        self.emitted.lock().await.push((room, message));
        Ok(())
    }
}

#[async_trait]
impl NotificationBus for RecordingNotificationBus {
    async fn emit_to_order(
        &self,
        order_id: Uuid,
        message: RoomMessage,
    ) -> Result<(), NotificationError> {
        self.record(format!("order:{}", order_id), message).await
    }

    async fn emit_to_driver(
        &self,
        driver_id: Uuid,
        message: RoomMessage,
    ) -> Result<(), NotificationError> {
        self.record(format!("driver:{}", driver_id), message).await
    }

    async fn emit_to_restaurant(
        &self,
        restaurant_id: Uuid,
        message: RoomMessage,
    ) -> Result<(), NotificationError> {
        self.record(format!("restaurant:{}", restaurant_id), message)
            .await
    }

    async fn broadcast_to_drivers(&self, message: RoomMessage) -> Result<(), NotificationError> {
        self.record("drivers".to_string(), message).await
    }
}

/// Placeholder SMS hook. A real gateway integration slots in behind this
/// function; until then the send is logged.
pub fn send_sms_placeholder(phone_hint: &str, body: &str) {
    info!(recipient = %phone_hint, body = %body, "SMS placeholder: message logged, not sent");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn recording_bus_captures_rooms_and_events() {
        let bus = RecordingNotificationBus::new();
        let order_id = Uuid::new_v4();

        bus.emit_to_order(order_id, RoomMessage::new("status_changed", json!({"s": 1})))
            .await
            .unwrap();
        bus.broadcast_to_drivers(RoomMessage::new("order_taken", json!({})))
            .await
            .unwrap();

        let emitted = bus.emitted().await;
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].0, format!("order:{}", order_id));
        assert_eq!(emitted[1].0, "drivers");
        assert_eq!(
            bus.events_for_room(&format!("order:{}", order_id)).await,
            vec!["status_changed".to_string()]
        );
    }

    #[tokio::test]
    async fn best_effort_emission_swallows_failures() {
        struct FailingBus;

        #[async_trait]
        impl NotificationBus for FailingBus {
            async fn emit_to_order(
                &self,
                _order_id: Uuid,
                _message: RoomMessage,
            ) -> Result<(), NotificationError> {
                Err(NotificationError::Serialization(
                    serde_json::from_str::<Value>("not json").unwrap_err(),
                ))
            }
            async fn emit_to_driver(
                &self,
                _driver_id: Uuid,
                _message: RoomMessage,
            ) -> Result<(), NotificationError> {
                Ok(())
            }
            async fn emit_to_restaurant(
                &self,
                _restaurant_id: Uuid,
                _message: RoomMessage,
            ) -> Result<(), NotificationError> {
                Ok(())
            }
            async fn broadcast_to_drivers(
                &self,
                _message: RoomMessage,
            ) -> Result<(), NotificationError> {
                Ok(())
            }
        }

        let bus: Arc<dyn NotificationBus> = Arc::new(FailingBus);
        // Must not panic or propagate.
        emit_best_effort(
            &bus,
            Room::Order(Uuid::new_v4()),
            RoomMessage::new("x", json!({})),
        )
        .await;
    }
}
