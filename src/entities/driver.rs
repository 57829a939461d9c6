use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Driver fields relevant to dispatch. Availability is driver-toggled but
/// also flipped off by the heartbeat staleness monitor.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Driver)]
#[sea_orm(table_name = "drivers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,
    pub is_available: bool,
    pub is_active: bool,
    /// "pending", "approved", or "rejected".
    pub verification_status: String,
    /// "bicycle", "motorcycle", or "car"; selects the ETA travel speed.
    pub vehicle_type: String,

    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub rating: f64,
    pub completed_deliveries: i32,

    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::driver_assignment::Entity")]
    DriverAssignment,
    #[sea_orm(has_many = "super::delivery::Entity")]
    Delivery,
}

impl Related<super::driver_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DriverAssignment.def()
    }
}

impl Related<super::delivery::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Delivery.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
