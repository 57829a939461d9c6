use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    actor::{Actor, ActorRole},
    db::DbPool,
    entities::driver::{self, Entity as DriverEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{emit_best_effort, NotificationBus, Room, RoomMessage},
    services::geo::Coordinates,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HeartbeatInput {
    pub latitude: f64,
    pub longitude: f64,
}

/// Driver presence: the availability toggle and the location heartbeat
/// the staleness monitor watches.
#[derive(Clone)]
pub struct DriverService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    bus: Arc<dyn NotificationBus>,
}

impl DriverService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, bus: Arc<dyn NotificationBus>) -> Self {
        Self {
            db,
            event_sender,
            bus,
        }
    }

    async fn load_driver(&self, driver_id: Uuid) -> Result<driver::Model, ServiceError> {
        DriverEntity::find_by_id(driver_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Driver {} not found", driver_id)))
    }

    fn check_self_or_admin(actor: Actor, driver_id: Uuid) -> Result<(), ServiceError> {
        let permitted = matches!(actor.role, ActorRole::Admin | ActorRole::System)
            || (actor.role == ActorRole::Driver && actor.id == driver_id);
        if !permitted {
            return Err(ServiceError::Forbidden(format!(
                "actor may not manage driver {}",
                driver_id
            )));
        }
        Ok(())
    }

    /// Flips the driver's availability. Going available also counts as a
    /// heartbeat so the monitor does not immediately flip them back.
    #[instrument(skip(self), fields(driver_id = %driver_id, available))]
    pub async fn set_availability(
        &self,
        driver_id: Uuid,
        actor: Actor,
        available: bool,
    ) -> Result<driver::Model, ServiceError> {
        Self::check_self_or_admin(actor, driver_id)?;
        let now = Utc::now();
        let driver = self.load_driver(driver_id).await?;

        if available && !driver.is_active {
            return Err(ServiceError::PreconditionFailed(format!(
                "driver {} is deactivated and cannot go available",
                driver_id
            )));
        }

        let mut active: driver::ActiveModel = driver.into();
        active.is_available = Set(available);
        if available {
            active.last_seen_at = Set(Some(now));
        }
        active.updated_at = Set(Some(now));
        let updated = active.update(&*self.db).await?;

        info!(driver_id = %driver_id, available, "driver availability changed");

        emit_best_effort(
            &self.bus,
            Room::Driver(driver_id),
            RoomMessage::new(
                "availability_changed",
                json!({ "driver_id": driver_id, "is_available": available }),
            ),
        )
        .await;
        if let Err(e) = self
            .event_sender
            .send(Event::DriverAvailabilityChanged {
                driver_id,
                is_available: available,
            })
            .await
        {
            warn!(driver_id = %driver_id, error = %e, "failed to send availability event");
        }

        Ok(updated)
    }

    /// Records a position heartbeat; keeps the driver out of the
    /// staleness sweep and feeds live ETA computation.
    #[instrument(skip(self, input), fields(driver_id = %driver_id))]
    pub async fn heartbeat(
        &self,
        driver_id: Uuid,
        actor: Actor,
        input: HeartbeatInput,
    ) -> Result<driver::Model, ServiceError> {
        Self::check_self_or_admin(actor, driver_id)?;
        let position = Coordinates::validated(input.latitude, input.longitude)?;
        let now = Utc::now();
        let driver = self.load_driver(driver_id).await?;

        let mut active: driver::ActiveModel = driver.into();
        active.current_latitude = Set(Some(position.latitude));
        active.current_longitude = Set(Some(position.longitude));
        active.last_seen_at = Set(Some(now));
        active.updated_at = Set(Some(now));
        let updated = active.update(&*self.db).await?;

        Ok(updated)
    }
}
