use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    db::DbPool,
    entities::delivery::{self, Entity as DeliveryEntity},
    entities::driver::Entity as DriverEntity,
    entities::order::Entity as OrderEntity,
    errors::ServiceError,
    services::geo::{distance_km, Coordinates},
    services::lifecycle::{DeliveryStatus, OrderStatus, PaymentStatus},
};

/// The 5 customer-facing milestones, monotone over an order's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStage {
    OrderIssued = 1,
    PaymentVerified = 2,
    ProcessingFood = 3,
    DeliveryOnTheWay = 4,
    Delivered = 5,
}

impl TrackingStage {
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for TrackingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrackingStage::OrderIssued => "Order Issued",
            TrackingStage::PaymentVerified => "Payment Verified",
            TrackingStage::ProcessingFood => "Processing Food",
            TrackingStage::DeliveryOnTheWay => "Delivery On The Way",
            TrackingStage::Delivered => "Delivered",
        };
        write!(f, "{}", name)
    }
}

/// Collapses order and payment status into a tracking stage. Recomputed
/// on every read and mutation; nothing persists the stage itself.
pub fn project_stage(order: OrderStatus, payment: PaymentStatus) -> TrackingStage {
    use OrderStatus::*;
    match order {
        Delivered => TrackingStage::Delivered,
        PickedUp | InTransit => TrackingStage::DeliveryOnTheWay,
        Confirmed | Preparing | Ready => TrackingStage::ProcessingFood,
        Pending if payment == PaymentStatus::Completed => TrackingStage::PaymentVerified,
        Pending | Cancelled => TrackingStage::OrderIssued,
    }
}

/// Variant tolerant of raw column strings; unknown values project to the
/// floor stage rather than erroring, since tracking is a read-only view.
pub fn project_stage_from_strings(order_status: &str, payment_status: &str) -> TrackingStage {
    let order = order_status.parse().unwrap_or(OrderStatus::Pending);
    let payment = payment_status.parse().unwrap_or(PaymentStatus::Pending);
    project_stage(order, payment)
}

/// Average travel speed per vehicle class, km/h.
#[derive(Debug, Clone, Copy)]
pub struct VehicleSpeeds {
    pub bicycle_kmh: f64,
    pub motorcycle_kmh: f64,
    pub car_kmh: f64,
}

impl VehicleSpeeds {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bicycle_kmh: config.speed_bicycle_kmh,
            motorcycle_kmh: config.speed_motorcycle_kmh,
            car_kmh: config.speed_car_kmh,
        }
    }

    pub fn for_vehicle(&self, vehicle_type: &str) -> f64 {
        match vehicle_type {
            "bicycle" => self.bicycle_kmh,
            "car" => self.car_kmh,
            // Motorcycles dominate the fleet; unknown types assume that.
            _ => self.motorcycle_kmh,
        }
    }
}

/// Remaining travel time in whole minutes, rounded up.
pub fn eta_minutes(distance_km: f64, speed_kmh: f64) -> Option<u32> {
    if !distance_km.is_finite() || distance_km < 0.0 || speed_kmh <= 0.0 {
        return None;
    }
    Some((distance_km / speed_kmh * 60.0).ceil() as u32)
}

/// What the customer tracking screen renders.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackingView {
    pub order_id: Uuid,
    pub order_status: String,
    pub payment_status: String,
    pub stage: u8,
    pub stage_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_longitude: Option<f64>,
    /// Only present while the delivery is in transit and both the driver
    /// position and the drop-off point are known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
}

#[derive(Clone)]
pub struct TrackingProjector {
    db: Arc<DbPool>,
    speeds: VehicleSpeeds,
}

impl TrackingProjector {
    pub fn new(db: Arc<DbPool>, speeds: VehicleSpeeds) -> Self {
        Self { db, speeds }
    }

    /// Builds the tracking view for one order from its current rows.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn snapshot(&self, order_id: Uuid) -> Result<TrackingView, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let stage = project_stage_from_strings(&order.status, &order.payment_status);

        let mut view = TrackingView {
            order_id,
            order_status: order.status.clone(),
            payment_status: order.payment_status.clone(),
            stage: stage.number(),
            stage_name: stage.to_string(),
            delivery_status: None,
            driver_latitude: None,
            driver_longitude: None,
            eta_minutes: None,
        };

        let delivery = DeliveryEntity::find()
            .filter(delivery::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;
        let Some(delivery) = delivery else {
            return Ok(view);
        };
        view.delivery_status = Some(delivery.status.clone());

        if let Some(driver) = DriverEntity::find_by_id(delivery.driver_id)
            .one(&*self.db)
            .await?
        {
            view.driver_latitude = driver.current_latitude;
            view.driver_longitude = driver.current_longitude;

            let in_transit = delivery.status == DeliveryStatus::InTransit.to_string();
            if in_transit {
                if let (Some(lat), Some(lng)) = (driver.current_latitude, driver.current_longitude)
                {
                    let remaining = distance_km(
                        Coordinates::new(lat, lng),
                        Coordinates::new(delivery.dropoff_latitude, delivery.dropoff_longitude),
                    );
                    view.eta_minutes =
                        eta_minutes(remaining, self.speeds.for_vehicle(&driver.vehicle_type));
                }
            }
        }

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_sequence_over_natural_lifecycle() {
        use OrderStatus::*;
        let sequence = [
            Pending, Confirmed, Preparing, Ready, PickedUp, InTransit, Delivered,
        ];
        let stages: Vec<u8> = sequence
            .iter()
            .map(|s| project_stage(*s, PaymentStatus::Pending).number())
            .collect();
        assert_eq!(stages, vec![1, 3, 3, 3, 4, 4, 5]);
    }

    #[test]
    fn paid_pending_order_reaches_stage_two() {
        assert_eq!(
            project_stage(OrderStatus::Pending, PaymentStatus::Completed),
            TrackingStage::PaymentVerified
        );
        assert_eq!(
            project_stage(OrderStatus::Pending, PaymentStatus::Pending),
            TrackingStage::OrderIssued
        );
    }

    #[test]
    fn stage_is_monotone_even_after_payment_completes_late() {
        // Payment flipping to completed mid-preparation never drops the stage.
        let before = project_stage(OrderStatus::Preparing, PaymentStatus::Pending);
        let after = project_stage(OrderStatus::Preparing, PaymentStatus::Completed);
        assert!(after >= before);
    }

    #[test]
    fn unknown_strings_project_to_the_floor() {
        assert_eq!(
            project_stage_from_strings("???", "???"),
            TrackingStage::OrderIssued
        );
    }

    #[test]
    fn eta_rounds_up_to_whole_minutes() {
        // 5 km at 30 km/h is exactly 10 minutes.
        assert_eq!(eta_minutes(5.0, 30.0), Some(10));
        // 5.1 km at 30 km/h is 10.2 minutes, rounded up.
        assert_eq!(eta_minutes(5.1, 30.0), Some(11));
        assert_eq!(eta_minutes(0.0, 30.0), Some(0));
        assert_eq!(eta_minutes(5.0, 0.0), None);
        assert_eq!(eta_minutes(-1.0, 30.0), None);
    }

    #[test]
    fn vehicle_class_selects_speed() {
        let speeds = VehicleSpeeds {
            bicycle_kmh: 15.0,
            motorcycle_kmh: 30.0,
            car_kmh: 40.0,
        };
        assert_eq!(speeds.for_vehicle("bicycle"), 15.0);
        assert_eq!(speeds.for_vehicle("car"), 40.0);
        assert_eq!(speeds.for_vehicle("motorcycle"), 30.0);
        assert_eq!(speeds.for_vehicle("hoverboard"), 30.0);
    }
}
