use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// An order row. Status columns are plain strings parsed into the service
/// enums at the boundary; money columns are fixed-point decimals.
///
/// Monetary invariant: `total_amount = subtotal - discount + delivery_fee
/// + service_fee + tip`, all components non-negative.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Order)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    /// Unset until a driver is matched.
    pub driver_id: Option<Uuid>,

    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    /// "partnered" or "non_partnered" fulfillment flow.
    pub flow_type: String,

    pub delivery_street: String,
    pub delivery_city: String,
    pub delivery_sub_city: Option<String>,
    pub delivery_latitude: f64,
    pub delivery_longitude: f64,

    pub subtotal: Decimal,
    pub discount: Decimal,
    pub delivery_fee: Decimal,
    pub service_fee: Decimal,
    pub tip: Decimal,
    pub total_amount: Decimal,

    /// Cancel-only free text; never reused for other reasons.
    pub cancellation_reason: Option<String>,

    pub verification_code: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub verification_attempts: i32,
    pub verified_at: Option<DateTime<Utc>>,

    /// Non-partnered reimbursement path.
    pub receipt_amount: Option<Decimal>,
    pub receipt_image_ref: Option<String>,

    pub confirmed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::order_status_history::Entity")]
    StatusHistory,
    #[sea_orm(has_many = "super::driver_assignment::Entity")]
    DriverAssignment,
    #[sea_orm(has_one = "super::delivery::Entity")]
    Delivery,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::order_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
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
