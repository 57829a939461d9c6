use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    actor::{Actor, ActorRole},
    db::DbPool,
    entities::driver::{self, Entity as DriverEntity},
    entities::order::{self, Entity as OrderEntity},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::order_status_history,
    entities::restaurant::Entity as RestaurantEntity,
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{emit_best_effort, NotificationBus, Room, RoomMessage},
    services::dispatch::DispatchEngine,
    services::fees::{round_money, FeeCalculator, FeeInput, FeeQuote},
    services::geo::{distance_km, Coordinates},
    services::lifecycle::{OrderFlowType, OrderStatus, PaymentStatus},
    services::tracking::project_stage_from_strings,
};

/// One cart line at checkout; persisted as an immutable snapshot so the
/// order survives later menu edits.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct OrderItemInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub unit_price: Decimal,
    #[validate(range(min = 1, max = 99))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    pub restaurant_id: Uuid,
    #[validate(length(min = 1, message = "order needs at least one item"))]
    pub items: Vec<OrderItemInput>,
    #[validate(length(min = 1, max = 255))]
    pub delivery_street: String,
    #[validate(length(min = 1, max = 100))]
    pub delivery_city: String,
    pub delivery_sub_city: Option<String>,
    pub delivery_latitude: f64,
    pub delivery_longitude: f64,
    /// "cash", "card", or "wallet".
    #[validate(length(min = 1, max = 30))]
    pub payment_method: String,
    pub tip: Option<Decimal>,
}

/// The checkout response: the persisted order plus its fee breakdown.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedOrder {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub quote: FeeQuote,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// The payment provider's webhook payload, opaque beyond this shape.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PaymentWebhookInput {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 128))]
    pub transaction_id: String,
    /// "completed" or "failed".
    #[validate(length(min = 1, max = 30))]
    pub status: String,
    pub amount: Decimal,
}

/// Checkout and payment boundary: prices the order, persists the
/// snapshot, and kicks off dispatch for the flows that need it early.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    fees: FeeCalculator,
    event_sender: EventSender,
    bus: Arc<dyn NotificationBus>,
    dispatch: Arc<DispatchEngine>,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        fees: FeeCalculator,
        event_sender: EventSender,
        bus: Arc<dyn NotificationBus>,
        dispatch: Arc<DispatchEngine>,
    ) -> Self {
        Self {
            db,
            fees,
            event_sender,
            bus,
            dispatch,
        }
    }

    /// Creates an order from the customer's cart selection.
    #[instrument(skip(self, input), fields(customer_id = %actor.id, restaurant_id = %input.restaurant_id))]
    pub async fn create_order(
        &self,
        actor: Actor,
        input: CreateOrderInput,
    ) -> Result<CreatedOrder, ServiceError> {
        if actor.role != ActorRole::Customer {
            return Err(ServiceError::Forbidden(
                "only customers create orders".to_string(),
            ));
        }
        input.validate()?;
        for item in &input.items {
            item.validate()?;
            if item.unit_price < Decimal::ZERO {
                return Err(ServiceError::Validation(format!(
                    "item '{}' has a negative unit price",
                    item.name
                )));
            }
        }
        let dropoff = Coordinates::validated(input.delivery_latitude, input.delivery_longitude)?;
        let tip = round_money(input.tip.unwrap_or(Decimal::ZERO).max(Decimal::ZERO));

        let restaurant = RestaurantEntity::find_by_id(input.restaurant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Restaurant {} not found", input.restaurant_id))
            })?;

        let now = Utc::now();
        let dist = distance_km(
            Coordinates::new(restaurant.latitude, restaurant.longitude),
            dropoff,
        );
        let subtotal = round_money(
            input
                .items
                .iter()
                .map(|i| i.unit_price * Decimal::from(i.quantity))
                .sum(),
        );

        let (active_orders, available_drivers) = self.demand_snapshot().await?;
        let quote = self.fees.quote(FeeInput {
            restaurant: &restaurant,
            delivery_city: &input.delivery_city,
            delivery_sub_city: input.delivery_sub_city.as_deref(),
            distance_km: dist,
            subtotal,
            now,
            active_orders,
            available_drivers,
        });

        let total = round_money(
            subtotal - quote.discount + quote.delivery_fee + quote.service_fee + tip,
        );
        let flow_type = if restaurant.is_partnered {
            OrderFlowType::Partnered
        } else {
            OrderFlowType::NonPartnered
        };

        let order_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        let created = order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(actor.id),
            restaurant_id: Set(restaurant.id),
            driver_id: Set(None),
            status: Set(OrderStatus::Pending.to_string()),
            payment_status: Set(PaymentStatus::Pending.to_string()),
            payment_method: Set(input.payment_method.to_lowercase()),
            flow_type: Set(flow_type.to_string()),
            delivery_street: Set(input.delivery_street.clone()),
            delivery_city: Set(input.delivery_city.clone()),
            delivery_sub_city: Set(input.delivery_sub_city.clone()),
            delivery_latitude: Set(dropoff.latitude),
            delivery_longitude: Set(dropoff.longitude),
            subtotal: Set(subtotal),
            discount: Set(quote.discount),
            delivery_fee: Set(quote.delivery_fee),
            service_fee: Set(quote.service_fee),
            tip: Set(tip),
            total_amount: Set(total),
            cancellation_reason: Set(None),
            verification_code: Set(None),
            verification_expires_at: Set(None),
            verification_attempts: Set(0),
            verified_at: Set(None),
            receipt_amount: Set(None),
            receipt_image_ref: Set(None),
            confirmed_at: Set(None),
            delivered_at: Set(None),
            cancelled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let line = round_money(item.unit_price * Decimal::from(item.quantity));
            let persisted = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                name: Set(item.name.clone()),
                unit_price: Set(item.unit_price),
                quantity: Set(item.quantity),
                subtotal: Set(line),
            }
            .insert(&txn)
            .await?;
            items.push(persisted);
        }

        order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            old_status: Set(None),
            new_status: Set(OrderStatus::Pending.to_string()),
            actor_role: Set(actor.role.to_string()),
            actor_id: Set(Some(actor.id)),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(order_id = %order_id, total = %total, flow = %flow_type, "order created");

        emit_best_effort(
            &self.bus,
            Room::Restaurant(restaurant.id),
            RoomMessage::new(
                "order_created",
                json!({ "order_id": order_id, "total": total, "items": items.len() }),
            ),
        )
        .await;
        if let Err(e) = self.event_sender.send(Event::OrderCreated(order_id)).await {
            warn!(order_id = %order_id, error = %e, "failed to send order event");
        }

        // Non-partnered flow: the driver fronts the payment at the
        // counter, so dispatch starts at creation rather than readiness.
        if flow_type == OrderFlowType::NonPartnered {
            if let Err(e) = self.dispatch.auto_assign_driver(order_id).await {
                warn!(order_id = %order_id, error = %e, "early dispatch did not assign a driver");
            }
        }

        Ok(CreatedOrder {
            order: created,
            items,
            quote,
        })
    }

    /// Active-order and available-driver counts feeding the surge ratio.
    async fn demand_snapshot(&self) -> Result<(u64, u64), ServiceError> {
        let active_statuses = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::PickedUp,
            OrderStatus::InTransit,
        ]
        .map(|s| s.to_string());

        let active_orders = OrderEntity::find()
            .filter(order::Column::Status.is_in(active_statuses))
            .count(&*self.db)
            .await?;
        let available_drivers = DriverEntity::find()
            .filter(
                Condition::all()
                    .add(driver::Column::IsAvailable.eq(true))
                    .add(driver::Column::IsActive.eq(true))
                    .add(driver::Column::VerificationStatus.eq("approved")),
            )
            .count(&*self.db)
            .await?;
        Ok((active_orders, available_drivers))
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    pub async fn get_order_detail(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = self.get_order(order_id).await?;
        let items = self.get_order_items(order_id).await?;
        Ok(OrderDetail { order, items })
    }

    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    /// Applies a payment provider webhook: marks the order paid or
    /// failed and pushes the tracking bump to the customer.
    #[instrument(skip(self, input), fields(order_id = %input.order_id, status = %input.status))]
    pub async fn apply_payment_webhook(
        &self,
        input: PaymentWebhookInput,
    ) -> Result<order::Model, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let order = self.get_order(input.order_id).await?;

        let new_status = match input.status.as_str() {
            "completed" => PaymentStatus::Completed,
            "failed" => PaymentStatus::Failed,
            other => {
                return Err(ServiceError::Validation(format!(
                    "unsupported payment webhook status '{}'",
                    other
                )))
            }
        };
        if new_status == PaymentStatus::Completed && input.amount != order.total_amount {
            warn!(
                order_id = %order.id,
                expected = %order.total_amount,
                received = %input.amount,
                transaction_id = %input.transaction_id,
                "payment amount differs from order total"
            );
        }

        let order_id = order.id;
        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(new_status.to_string());
        active.updated_at = Set(Some(now));
        let updated = active.update(&*self.db).await?;

        let stage = project_stage_from_strings(&updated.status, &updated.payment_status);
        emit_best_effort(
            &self.bus,
            Room::Order(order_id),
            RoomMessage::new(
                "payment_update",
                json!({
                    "order_id": order_id,
                    "payment_status": new_status.to_string(),
                    "tracking_stage": stage.number(),
                    "tracking_stage_name": stage.to_string(),
                }),
            ),
        )
        .await;

        let event = match new_status {
            PaymentStatus::Completed => Event::PaymentCompleted(order_id),
            _ => Event::PaymentFailed(order_id),
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(order_id = %order_id, error = %e, "failed to send payment event");
        }

        Ok(updated)
    }
}
