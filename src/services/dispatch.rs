use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    EntityTrait, ModelTrait, QueryFilter, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    actor::{Actor, ActorRole},
    config::DispatchConfig,
    db::DbPool,
    entities::delivery::{self, Entity as DeliveryEntity},
    entities::driver::{self, Entity as DriverEntity},
    entities::driver_assignment::{self, Entity as AssignmentEntity},
    entities::order::{self, Entity as OrderEntity},
    entities::restaurant::{self, Entity as RestaurantEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{emit_best_effort, NotificationBus, Room, RoomMessage},
    services::geo::{distance_km, Coordinates},
    services::lifecycle::{
        apply_transition, parse_order_status, AssignmentStatus, DeliveryStatus, OrderFlowType,
        OrderStatus,
    },
    services::verification::VerificationGate,
};

const DISTANCE_WEIGHT: f64 = 0.8;
const RATING_WEIGHT: f64 = 0.2;
const MAX_RATING: f64 = 5.0;

/// One driver in the ranked candidate list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankedCandidate {
    pub driver_id: Uuid,
    pub driver_name: String,
    pub distance_km: f64,
    pub rating: f64,
    pub score: f64,
}

/// Matches ready orders to drivers via a single time-boxed offer or a
/// first-come-first-served pool claim.
#[derive(Clone)]
pub struct DispatchEngine {
    db: Arc<DbPool>,
    config: DispatchConfig,
    event_sender: EventSender,
    bus: Arc<dyn NotificationBus>,
    verification: Arc<VerificationGate>,
}

impl DispatchEngine {
    pub fn new(
        db: Arc<DbPool>,
        config: DispatchConfig,
        event_sender: EventSender,
        bus: Arc<dyn NotificationBus>,
        verification: Arc<VerificationGate>,
    ) -> Self {
        Self {
            db,
            config,
            event_sender,
            bus,
            verification,
        }
    }

    fn score(distance_km: f64, rating: f64) -> f64 {
        DISTANCE_WEIGHT * distance_km + RATING_WEIGHT * (MAX_RATING - rating)
    }

    fn driver_is_dispatchable(d: &driver::Model) -> bool {
        d.is_available && d.is_active && d.verification_status == "approved"
    }

    /// Non-partnered orders dispatch straight from `pending` because the
    /// driver pays the restaurant in person and needs the lead time.
    fn offerable_statuses(order: &order::Model) -> Vec<OrderStatus> {
        if order.flow_type == OrderFlowType::NonPartnered.to_string() {
            vec![OrderStatus::Pending, OrderStatus::Ready]
        } else {
            vec![OrderStatus::Ready]
        }
    }

    /// Ranks eligible drivers around the restaurant: lower score wins,
    /// distance breaks ties, capped at the configured candidate count.
    #[instrument(skip(self, exclude))]
    pub async fn rank_candidates(
        &self,
        pickup: Coordinates,
        exclude: &[Uuid],
    ) -> Result<Vec<RankedCandidate>, ServiceError> {
        let drivers = DriverEntity::find()
            .filter(driver::Column::IsAvailable.eq(true))
            .filter(driver::Column::IsActive.eq(true))
            .filter(driver::Column::VerificationStatus.eq("approved"))
            .all(&*self.db)
            .await?;

        let mut candidates: Vec<RankedCandidate> = drivers
            .into_iter()
            .filter(|d| !exclude.contains(&d.id))
            .filter_map(|d| {
                let (lat, lng) = (d.current_latitude?, d.current_longitude?);
                let dist = distance_km(Coordinates::new(lat, lng), pickup);
                (dist <= self.config.delivery_radius_km).then(|| RankedCandidate {
                    driver_id: d.id,
                    driver_name: d.name,
                    distance_km: dist,
                    rating: d.rating,
                    score: Self::score(dist, d.rating),
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then(a.distance_km.total_cmp(&b.distance_km))
        });
        candidates.truncate(self.config.max_candidates);
        Ok(candidates)
    }

    /// Offers the order to the single best-ranked driver. Fails with a
    /// conflict while an unexpired offer is outstanding; a lapsed offer
    /// is expired here, on the read path, rather than by a timer.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn auto_assign_driver(
        &self,
        order_id: Uuid,
    ) -> Result<driver_assignment::Model, ServiceError> {
        let now = Utc::now();
        let order = self.load_order(order_id).await?;
        self.ensure_dispatchable(&order, &Self::offerable_statuses(&order))?;

        let prior = self.settle_prior_assignments(order_id, now).await?;

        let restaurant = self.load_restaurant(order.restaurant_id).await?;
        let pickup = Coordinates::new(restaurant.latitude, restaurant.longitude);
        let already_tried: Vec<Uuid> = prior.iter().map(|a| a.driver_id).collect();

        let candidates = self.rank_candidates(pickup, &already_tried).await?;
        let top = candidates.first().ok_or_else(|| {
            ServiceError::NotFound(format!(
                "no eligible driver within {} km for order {}",
                self.config.delivery_radius_km, order_id
            ))
        })?;

        let assignment = driver_assignment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            driver_id: Set(top.driver_id),
            status: Set(AssignmentStatus::Offered.to_string()),
            offered_at: Set(now),
            responded_at: Set(None),
        }
        .insert(&*self.db)
        .await?;

        info!(order_id = %order_id, driver_id = %top.driver_id, score = top.score, "offered order to driver");

        emit_best_effort(
            &self.bus,
            Room::Driver(top.driver_id),
            RoomMessage::new(
                "assignment_offer",
                json!({
                    "order_id": order_id,
                    "assignment_id": assignment.id,
                    "pickup_address": restaurant.street,
                    "distance_km": top.distance_km,
                    "expires_in_secs": self.config.offer_timeout_secs,
                }),
            ),
        )
        .await;
        self.send_event(Event::DriverOffered {
            order_id,
            driver_id: top.driver_id,
            assignment_id: assignment.id,
        })
        .await;

        Ok(assignment)
    }

    /// Operator-selected assignment: skips ranking and the accept step,
    /// immediately binding the driver and creating the delivery.
    #[instrument(skip(self), fields(order_id = %order_id, driver_id = %driver_id))]
    pub async fn manual_assign_driver(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let now = Utc::now();
        let order = self.load_order(order_id).await?;
        self.ensure_dispatchable(&order, &[OrderStatus::Ready])?;

        let driver = DriverEntity::find_by_id(driver_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Driver {} not found", driver_id)))?;
        if !Self::driver_is_dispatchable(&driver) {
            return Err(ServiceError::PreconditionFailed(format!(
                "driver {} is not available, active and approved",
                driver_id
            )));
        }

        let updated = self
            .bind_driver(order_id, driver_id, AssignmentStatus::Accepted, now)
            .await?;
        self.announce_assignment(&updated, driver_id).await;
        Ok(updated)
    }

    /// A driver answers their outstanding offer. Accepting binds the
    /// driver and creates the delivery; rejecting records the refusal so
    /// the next assign call skips them.
    #[instrument(skip(self), fields(order_id = %order_id, driver_id = %actor.id, accept))]
    pub async fn respond_to_offer(
        &self,
        order_id: Uuid,
        actor: Actor,
        accept: bool,
    ) -> Result<Option<order::Model>, ServiceError> {
        let now = Utc::now();
        let assignment = AssignmentEntity::find()
            .filter(driver_assignment::Column::OrderId.eq(order_id))
            .filter(driver_assignment::Column::DriverId.eq(actor.id))
            .filter(driver_assignment::Column::Status.eq(AssignmentStatus::Offered.to_string()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "no outstanding offer on order {} for driver {}",
                    order_id, actor.id
                ))
            })?;

        if now - assignment.offered_at > Duration::seconds(self.config.offer_timeout_secs) {
            self.mark_assignment(&*self.db, assignment, AssignmentStatus::Expired, now)
                .await?;
            self.send_event(Event::OfferExpired {
                order_id,
                driver_id: actor.id,
            })
            .await;
            return Err(ServiceError::PreconditionFailed(format!(
                "offer on order {} has expired",
                order_id
            )));
        }

        if !accept {
            self.mark_assignment(&*self.db, assignment, AssignmentStatus::Rejected, now)
                .await?;
            info!(order_id = %order_id, driver_id = %actor.id, "driver rejected offer");
            return Ok(None);
        }

        // Claim, acceptance mark, and dispatch artifacts commit together.
        let driver_id = assignment.driver_id;
        let txn = self.db.begin().await?;
        let claimed = self.claim_order_slot(&txn, order_id, driver_id, now).await?;
        self.mark_assignment(&txn, assignment, AssignmentStatus::Accepted, now)
            .await?;
        let (updated, dispatched) = self.maybe_finalize(&txn, claimed, driver_id, now).await?;
        txn.commit().await?;

        if dispatched {
            self.issue_verification(order_id).await?;
        }
        self.announce_assignment(&updated, driver_id).await;
        self.send_event(Event::AssignmentAccepted {
            order_id,
            driver_id,
        })
        .await;
        Ok(Some(updated))
    }

    /// First-come-first-served claim on an unassigned preparing/ready
    /// order. Losing the race is a conflict, never a silent success.
    #[instrument(skip(self), fields(order_id = %order_id, driver_id = %actor.id))]
    pub async fn accept_from_pool(
        &self,
        order_id: Uuid,
        actor: Actor,
    ) -> Result<order::Model, ServiceError> {
        let now = Utc::now();

        let driver = DriverEntity::find_by_id(actor.id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Driver {} not found", actor.id)))?;
        if !Self::driver_is_dispatchable(&driver) {
            return Err(ServiceError::PreconditionFailed(format!(
                "driver {} is not available, active and approved",
                actor.id
            )));
        }

        let order = self.load_order(order_id).await?;
        self.ensure_dispatchable(&order, &[OrderStatus::Preparing, OrderStatus::Ready])?;

        let updated = self
            .bind_driver(order_id, actor.id, AssignmentStatus::Accepted, now)
            .await?;

        self.announce_assignment(&updated, actor.id).await;
        self.send_event(Event::AssignmentAccepted {
            order_id,
            driver_id: actor.id,
        })
        .await;
        Ok(updated)
    }

    /// A driver hands an assignment back: the driver slot is cleared, the
    /// delivery is deleted, and the order returns to `ready` so the pool
    /// reopens.
    #[instrument(skip(self), fields(order_id = %order_id, driver_id = %actor.id))]
    pub async fn release_assignment(
        &self,
        order_id: Uuid,
        actor: Actor,
    ) -> Result<order::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if actor.role == ActorRole::Driver && order.driver_id != Some(actor.id) {
            return Err(ServiceError::Forbidden(format!(
                "driver {} does not hold the assignment on order {}",
                actor.id, order_id
            )));
        }
        let Some(driver_id) = order.driver_id else {
            return Err(ServiceError::PreconditionFailed(format!(
                "order {} has no driver to release",
                order_id
            )));
        };

        let status = parse_order_status(&order.status)?;
        let releasable = matches!(
            status,
            OrderStatus::Preparing
                | OrderStatus::Ready
                | OrderStatus::PickedUp
                | OrderStatus::InTransit
        );
        if !releasable {
            return Err(ServiceError::PreconditionFailed(format!(
                "order {} is {} and its assignment can no longer be released",
                order_id, status
            )));
        }

        if let Some(assignment) = AssignmentEntity::find()
            .filter(driver_assignment::Column::OrderId.eq(order_id))
            .filter(driver_assignment::Column::DriverId.eq(driver_id))
            .filter(driver_assignment::Column::Status.eq(AssignmentStatus::Accepted.to_string()))
            .one(&txn)
            .await?
        {
            let mut active: driver_assignment::ActiveModel = assignment.into();
            active.status = Set(AssignmentStatus::Rejected.to_string());
            active.responded_at = Set(Some(now));
            active.update(&txn).await?;
        }

        if let Some(d) = DeliveryEntity::find()
            .filter(delivery::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?
        {
            d.delete(&txn).await?;
        }

        let mut active: order::ActiveModel = order.clone().into();
        active.driver_id = Set(None);
        active.updated_at = Set(Some(now));
        let cleared = active.update(&txn).await?;

        let updated = if status != OrderStatus::Ready {
            apply_transition(&txn, cleared, OrderStatus::Ready, Actor::system(), None, now).await?
        } else {
            cleared
        };
        txn.commit().await?;

        info!(order_id = %order_id, driver_id = %driver_id, from = %status, "assignment released, order back in pool");

        emit_best_effort(
            &self.bus,
            Room::Drivers,
            RoomMessage::new("order_available", json!({ "order_id": order_id })),
        )
        .await;
        emit_best_effort(
            &self.bus,
            Room::Order(order_id),
            RoomMessage::new(
                "driver_released",
                json!({ "order_id": order_id, "driver_id": driver_id }),
            ),
        )
        .await;
        self.send_event(Event::AssignmentReleased {
            order_id,
            driver_id,
        })
        .await;

        Ok(updated)
    }

    /// Completes a claim reserved while the food was still preparing:
    /// once the order is ready with a bound driver but no delivery yet,
    /// moves it to `picked_up` and creates the delivery artifacts.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn finalize_reserved_claim(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let now = Utc::now();
        let order = self.load_order(order_id).await?;
        let Some(driver_id) = order.driver_id else {
            return Ok(());
        };
        if parse_order_status(&order.status)? != OrderStatus::Ready {
            return Ok(());
        }
        let existing = DeliveryEntity::find()
            .filter(delivery::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let txn = self.db.begin().await?;
        self.finalize_dispatch(&txn, &order, driver_id, now).await?;
        txn.commit().await?;
        self.issue_verification(order_id).await?;
        Ok(())
    }

    /// Lazily settles this order's prior assignment rows: lapsed offers
    /// flip to expired; an unexpired offer blocks a new one.
    async fn settle_prior_assignments(
        &self,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<driver_assignment::Model>, ServiceError> {
        let rows = AssignmentEntity::find()
            .filter(driver_assignment::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        let timeout = Duration::seconds(self.config.offer_timeout_secs);
        let mut settled = Vec::with_capacity(rows.len());
        for row in rows {
            if row.status == AssignmentStatus::Offered.to_string() {
                if now - row.offered_at > timeout {
                    let driver_id = row.driver_id;
                    let expired = self
                        .mark_assignment(&*self.db, row, AssignmentStatus::Expired, now)
                        .await?;
                    self.send_event(Event::OfferExpired {
                        order_id,
                        driver_id,
                    })
                    .await;
                    settled.push(expired);
                } else {
                    return Err(ServiceError::Conflict(format!(
                        "order {} already has an outstanding offer for driver {}",
                        order_id, row.driver_id
                    )));
                }
            } else {
                settled.push(row);
            }
        }
        Ok(settled)
    }

    async fn mark_assignment<C: ConnectionTrait>(
        &self,
        conn: &C,
        assignment: driver_assignment::Model,
        status: AssignmentStatus,
        now: DateTime<Utc>,
    ) -> Result<driver_assignment::Model, ServiceError> {
        let mut active: driver_assignment::ActiveModel = assignment.into();
        active.status = Set(status.to_string());
        active.responded_at = Set(Some(now));
        Ok(active.update(conn).await?)
    }

    /// Race-safe driver binding: a conditional update that only matches
    /// while `driver_id` is still null, so exactly one concurrent claim
    /// wins and the rest see a conflict.
    async fn claim_order_slot<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
        driver_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<order::Model, ServiceError> {
        let result = OrderEntity::update_many()
            .col_expr(order::Column::DriverId, Expr::value(driver_id))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(
                Condition::all()
                    .add(order::Column::Id.eq(order_id))
                    .add(order::Column::DriverId.is_null()),
            )
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "order {} was claimed by another driver",
                order_id
            )));
        }

        OrderEntity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Pool-claim and offer-accept both funnel through here: one
    /// transaction binds the driver with the conditional update, records
    /// the accepted assignment row, and finishes dispatch if the food is
    /// already ready, so no partial binding survives an error.
    async fn bind_driver(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
        status: AssignmentStatus,
        now: DateTime<Utc>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let claimed = self.claim_order_slot(&txn, order_id, driver_id, now).await?;

        driver_assignment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            driver_id: Set(driver_id),
            status: Set(status.to_string()),
            offered_at: Set(now),
            responded_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        let (updated, dispatched) = self.maybe_finalize(&txn, claimed, driver_id, now).await?;
        txn.commit().await?;

        if dispatched {
            self.issue_verification(order_id).await?;
        }
        Ok(updated)
    }

    /// Delivery artifacts only exist from `ready` onwards; a driver bound
    /// earlier waits for the ready event. Returns whether dispatch was
    /// finished here.
    async fn maybe_finalize<C: ConnectionTrait>(
        &self,
        conn: &C,
        claimed: order::Model,
        driver_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(order::Model, bool), ServiceError> {
        if parse_order_status(&claimed.status)? == OrderStatus::Ready {
            let updated = self.finalize_dispatch(conn, &claimed, driver_id, now).await?;
            Ok((updated, true))
        } else {
            Ok((claimed, false))
        }
    }

    /// Moves a ready, driver-bound order to `picked_up` and creates the
    /// delivery row. Runs on the caller's transaction; the verification
    /// code is issued after that transaction commits.
    async fn finalize_dispatch<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: &order::Model,
        driver_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<order::Model, ServiceError> {
        let restaurant = RestaurantEntity::find_by_id(order.restaurant_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Restaurant {} not found", order.restaurant_id))
            })?;
        let dist = distance_km(
            Coordinates::new(restaurant.latitude, restaurant.longitude),
            Coordinates::new(order.delivery_latitude, order.delivery_longitude),
        );

        let fresh = OrderEntity::find_by_id(order.id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order.id)))?;

        let updated = if parse_order_status(&fresh.status)? == OrderStatus::Ready {
            apply_transition(
                conn,
                fresh,
                OrderStatus::PickedUp,
                Actor::driver(driver_id),
                None,
                now,
            )
            .await?
        } else {
            fresh
        };

        delivery::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            driver_id: Set(driver_id),
            status: Set(DeliveryStatus::PickedUp.to_string()),
            pickup_address: Set(restaurant.street.clone()),
            pickup_latitude: Set(restaurant.latitude),
            pickup_longitude: Set(restaurant.longitude),
            dropoff_address: Set(order.delivery_street.clone()),
            dropoff_latitude: Set(order.delivery_latitude),
            dropoff_longitude: Set(order.delivery_longitude),
            distance_km: Set(dist),
            proof_of_delivery_ref: Set(None),
            assigned_at: Set(now),
            picked_up_at: Set(Some(now)),
            delivered_at: Set(None),
        }
        .insert(conn)
        .await?;

        Ok(updated)
    }

    async fn issue_verification(&self, order_id: Uuid) -> Result<(), ServiceError> {
        self.verification.generate_code(order_id).await?;
        if let Err(e) = self.verification.send_code(order_id).await {
            warn!(order_id = %order_id, error = %e, "failed to push verification code");
        }
        Ok(())
    }

    /// Post-dispatch fan-out: the winning driver, the shared pool view,
    /// and the order room each hear about the match.
    async fn announce_assignment(&self, order: &order::Model, driver_id: Uuid) {
        emit_best_effort(
            &self.bus,
            Room::Driver(driver_id),
            RoomMessage::new(
                "assignment_confirmed",
                json!({ "order_id": order.id, "status": order.status }),
            ),
        )
        .await;
        emit_best_effort(
            &self.bus,
            Room::Drivers,
            RoomMessage::new("order_claimed", json!({ "order_id": order.id })),
        )
        .await;
        emit_best_effort(
            &self.bus,
            Room::Order(order.id),
            RoomMessage::new(
                "driver_assigned",
                json!({ "order_id": order.id, "driver_id": driver_id }),
            ),
        )
        .await;
    }

    fn ensure_dispatchable(
        &self,
        order: &order::Model,
        allowed: &[OrderStatus],
    ) -> Result<(), ServiceError> {
        if order.driver_id.is_some() {
            return Err(ServiceError::Conflict(format!(
                "order {} already has a driver assigned",
                order.id
            )));
        }
        let status = parse_order_status(&order.status)?;
        if !allowed.contains(&status) {
            return Err(ServiceError::PreconditionFailed(format!(
                "order {} is {} and not eligible for dispatch",
                order.id, status
            )));
        }
        Ok(())
    }

    async fn load_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn load_restaurant(
        &self,
        restaurant_id: Uuid,
    ) -> Result<restaurant::Model, ServiceError> {
        RestaurantEntity::find_by_id(restaurant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Restaurant {} not found", restaurant_id))
            })
    }

    async fn send_event(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "failed to send dispatch event");
        }
    }
}
