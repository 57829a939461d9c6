use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{Display, EnumString};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    actor::{Actor, ActorRole},
    db::DbPool,
    entities::delivery::{self, Entity as DeliveryEntity},
    entities::order::{self, Entity as OrderEntity},
    entities::order_status_history::{self, Entity as HistoryEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{emit_best_effort, NotificationBus, Room, RoomMessage},
    services::dispatch::DispatchEngine,
    services::tracking,
};

/// Canonical order states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderFlowType {
    Partnered,
    NonPartnered,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    PickedUp,
    InTransit,
    Delivered,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Offered,
    Accepted,
    Rejected,
    Expired,
}

/// Parses a persisted status string, mapping garbage to a validation error.
pub fn parse_order_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    raw.parse()
        .map_err(|_| ServiceError::Validation(format!("unsupported order status '{}'", raw)))
}

pub fn parse_payment_status(raw: &str) -> Result<PaymentStatus, ServiceError> {
    raw.parse()
        .map_err(|_| ServiceError::Validation(format!("unsupported payment status '{}'", raw)))
}

/// The actor-scoped allowed-transition table.
///
/// Customers may only cancel early; restaurants advance food preparation
/// and may cancel early; drivers advance the delivery leg; admins hold
/// the union plus the ready-stage cancel; internal flows (`System`) may
/// move between any non-terminal states, which covers dispatch claims
/// and the pool-release reset to `ready`.
pub fn transition_allowed(role: ActorRole, from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    if from.is_terminal() {
        return false;
    }

    match role {
        ActorRole::Customer => to == Cancelled && matches!(from, Pending | Confirmed),
        ActorRole::Restaurant => matches!(
            (from, to),
            (Pending, Confirmed)
                | (Confirmed, Preparing)
                | (Preparing, Ready)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        ),
        ActorRole::Driver => matches!(
            (from, to),
            (Ready, PickedUp) | (PickedUp, InTransit) | (InTransit, Delivered)
        ),
        ActorRole::Admin => {
            transition_allowed(ActorRole::Restaurant, from, to)
                || transition_allowed(ActorRole::Driver, from, to)
                || (to == Cancelled && matches!(from, Pending | Confirmed | Ready))
        }
        ActorRole::System => !to.is_terminal() || transition_allowed(ActorRole::Admin, from, to),
    }
}

/// Applies a validated transition on an open connection: mutates the
/// order row, stamps side-effect timestamps, and appends the history row.
/// The caller owns the transaction and the post-commit fan-out.
pub async fn apply_transition<C: ConnectionTrait>(
    conn: &C,
    current: order::Model,
    new_status: OrderStatus,
    actor: Actor,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<order::Model, ServiceError> {
    let old_status = current.status.clone();
    let order_id = current.id;
    let is_cash = current.payment_method.eq_ignore_ascii_case("cash");

    let mut active: order::ActiveModel = current.into();
    active.status = Set(new_status.to_string());
    active.updated_at = Set(Some(now));
    match new_status {
        OrderStatus::Confirmed => {
            active.confirmed_at = Set(Some(now));
        }
        OrderStatus::Delivered => {
            active.delivered_at = Set(Some(now));
            // Cash settles on handoff.
            if is_cash {
                active.payment_status = Set(PaymentStatus::Completed.to_string());
            }
        }
        OrderStatus::Cancelled => {
            active.cancelled_at = Set(Some(now));
            active.cancellation_reason = Set(reason);
        }
        _ => {}
    }

    let updated = active.update(conn).await?;

    // The delivery leg keeps its own record; driver-side transitions
    // mirror onto it so the live view reads from one consistent pair.
    if let Some(delivery_status) = match new_status {
        OrderStatus::PickedUp => Some(DeliveryStatus::PickedUp),
        OrderStatus::InTransit => Some(DeliveryStatus::InTransit),
        OrderStatus::Delivered => Some(DeliveryStatus::Delivered),
        _ => None,
    } {
        let mut sync = DeliveryEntity::update_many().col_expr(
            delivery::Column::Status,
            Expr::value(delivery_status.to_string()),
        );
        match delivery_status {
            DeliveryStatus::PickedUp => {
                sync = sync.col_expr(delivery::Column::PickedUpAt, Expr::value(now));
            }
            DeliveryStatus::Delivered => {
                sync = sync.col_expr(delivery::Column::DeliveredAt, Expr::value(now));
            }
            DeliveryStatus::InTransit => {}
        }
        sync.filter(delivery::Column::OrderId.eq(order_id))
            .exec(conn)
            .await?;
    }

    order_status_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        old_status: Set(Some(old_status)),
        new_status: Set(new_status.to_string()),
        actor_role: Set(actor.role.to_string()),
        actor_id: Set((actor.role != ActorRole::System).then_some(actor.id)),
        created_at: Set(now),
    }
    .insert(conn)
    .await?;

    Ok(updated)
}

/// Owns the canonical order status: validates actor and transition,
/// mutates atomically, appends history, then fans out tracking and
/// notifications.
#[derive(Clone)]
pub struct OrderLifecycleService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    bus: Arc<dyn NotificationBus>,
    dispatch: Arc<DispatchEngine>,
}

impl OrderLifecycleService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        bus: Arc<dyn NotificationBus>,
        dispatch: Arc<DispatchEngine>,
    ) -> Self {
        Self {
            db,
            event_sender,
            bus,
            dispatch,
        }
    }

    fn check_ownership(&self, order: &order::Model, actor: Actor) -> Result<(), ServiceError> {
        match actor.role {
            ActorRole::Customer if order.customer_id != actor.id => {
                Err(ServiceError::Forbidden(format!(
                    "customer {} does not own order {}",
                    actor.id, order.id
                )))
            }
            ActorRole::Restaurant if order.restaurant_id != actor.id => {
                Err(ServiceError::Forbidden(format!(
                    "restaurant {} does not own order {}",
                    actor.id, order.id
                )))
            }
            ActorRole::Driver if order.driver_id != Some(actor.id) => {
                Err(ServiceError::Forbidden(format!(
                    "driver {} is not assigned to order {}",
                    actor.id, order.id
                )))
            }
            _ => Ok(()),
        }
    }

    /// Transitions an order to `new_status` on behalf of `actor`.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status, actor_role = %actor.role))]
    pub async fn transition(
        &self,
        order_id: Uuid,
        actor: Actor,
        new_status: OrderStatus,
        reason: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        // Re-validate against the freshly loaded row, never a cached copy.
        let current = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        self.check_ownership(&current, actor)?;

        let from = parse_order_status(&current.status)?;
        if !transition_allowed(actor.role, from, new_status) {
            return Err(ServiceError::PreconditionFailed(format!(
                "order {} cannot move from '{}' to '{}' as {}",
                order_id, from, new_status, actor.role
            )));
        }

        let updated = apply_transition(&txn, current, new_status, actor, reason.clone(), now).await?;
        txn.commit().await?;

        info!(order_id = %order_id, from = %from, to = %new_status, "order transitioned");

        self.after_transition(&updated, from, new_status, reason).await;
        Ok(updated)
    }

    /// Cancels an order with a free-text reason; blocked once past `ready`.
    pub async fn cancel(
        &self,
        order_id: Uuid,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        self.transition(order_id, actor, OrderStatus::Cancelled, reason)
            .await
    }

    /// Post-commit fan-out: tracking recompute, room notification, domain
    /// event, and the automatic dispatch trigger on `ready`.
    pub async fn after_transition(
        &self,
        updated: &order::Model,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<String>,
    ) {
        let stage = tracking::project_stage_from_strings(&updated.status, &updated.payment_status);
        emit_best_effort(
            &self.bus,
            Room::Order(updated.id),
            RoomMessage::new(
                "status_changed",
                json!({
                    "order_id": updated.id,
                    "old_status": from.to_string(),
                    "new_status": to.to_string(),
                    "tracking_stage": stage.number(),
                    "tracking_stage_name": stage.to_string(),
                }),
            ),
        )
        .await;

        let event = match to {
            OrderStatus::Cancelled => Event::OrderCancelled {
                order_id: updated.id,
                reason,
            },
            OrderStatus::Delivered => Event::OrderDelivered(updated.id),
            _ => Event::OrderStatusChanged {
                order_id: updated.id,
                old_status: from.to_string(),
                new_status: to.to_string(),
            },
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(order_id = %updated.id, error = %e, "failed to send lifecycle event");
        }

        // Ready is the dispatch moment: unclaimed orders go out for an
        // offer, pre-reserved ones get their delivery artifacts.
        if to == OrderStatus::Ready {
            let result = if updated.driver_id.is_none() {
                self.dispatch.auto_assign_driver(updated.id).await.map(|_| ())
            } else {
                self.dispatch.finalize_reserved_claim(updated.id).await
            };
            if let Err(e) = result {
                warn!(order_id = %updated.id, error = %e, "automatic dispatch did not complete");
            }
        }
    }

    /// The append-only transition log for an order, oldest first.
    pub async fn history(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_status_history::Model>, ServiceError> {
        let rows = HistoryEntity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_history::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customers_may_only_cancel_early() {
        use OrderStatus::*;
        assert!(transition_allowed(ActorRole::Customer, Pending, Cancelled));
        assert!(transition_allowed(ActorRole::Customer, Confirmed, Cancelled));
        assert!(!transition_allowed(ActorRole::Customer, Ready, Cancelled));
        assert!(!transition_allowed(ActorRole::Customer, Pending, Confirmed));
        assert!(!transition_allowed(ActorRole::Customer, PickedUp, Cancelled));
    }

    #[test]
    fn restaurants_advance_preparation() {
        use OrderStatus::*;
        assert!(transition_allowed(ActorRole::Restaurant, Pending, Confirmed));
        assert!(transition_allowed(ActorRole::Restaurant, Confirmed, Preparing));
        assert!(transition_allowed(ActorRole::Restaurant, Preparing, Ready));
        assert!(transition_allowed(ActorRole::Restaurant, Pending, Cancelled));
        assert!(!transition_allowed(ActorRole::Restaurant, Ready, PickedUp));
        assert!(!transition_allowed(ActorRole::Restaurant, Preparing, Cancelled));
    }

    #[test]
    fn drivers_advance_the_delivery_leg() {
        use OrderStatus::*;
        assert!(transition_allowed(ActorRole::Driver, Ready, PickedUp));
        assert!(transition_allowed(ActorRole::Driver, PickedUp, InTransit));
        assert!(transition_allowed(ActorRole::Driver, InTransit, Delivered));
        assert!(!transition_allowed(ActorRole::Driver, Pending, Confirmed));
        assert!(!transition_allowed(ActorRole::Driver, Ready, Cancelled));
    }

    #[test]
    fn terminal_states_admit_no_exit() {
        use OrderStatus::*;
        for role in [
            ActorRole::Customer,
            ActorRole::Restaurant,
            ActorRole::Driver,
            ActorRole::Admin,
            ActorRole::System,
        ] {
            for to in [Pending, Confirmed, Ready, Cancelled, Delivered] {
                assert!(!transition_allowed(role, Delivered, to));
                assert!(!transition_allowed(role, Cancelled, to));
            }
        }
    }

    #[test]
    fn admin_may_cancel_at_ready_but_not_later() {
        use OrderStatus::*;
        assert!(transition_allowed(ActorRole::Admin, Ready, Cancelled));
        assert!(!transition_allowed(ActorRole::Admin, PickedUp, Cancelled));
        assert!(!transition_allowed(ActorRole::Admin, InTransit, Cancelled));
    }

    #[test]
    fn system_may_reset_for_pool_release() {
        use OrderStatus::*;
        assert!(transition_allowed(ActorRole::System, PickedUp, Ready));
        assert!(transition_allowed(ActorRole::System, InTransit, Ready));
        assert!(transition_allowed(ActorRole::System, Ready, PickedUp));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::PickedUp,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(parse_order_status(&status.to_string()).unwrap(), status);
        }
        assert!(parse_order_status("bogus").is_err());
    }
}
