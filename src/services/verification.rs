use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, EntityTrait, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    actor::{Actor, ActorRole},
    config::VerificationConfig,
    db::DbPool,
    entities::order::{self, Entity as OrderEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{
        emit_best_effort, send_sms_placeholder, NotificationBus, Room, RoomMessage,
    },
    services::lifecycle::{apply_transition, parse_order_status, OrderStatus},
    services::tracking::project_stage_from_strings,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CodeIssue {
    pub order_id: Uuid,
    pub expires_at: DateTime<Utc>,
    /// True when an unexpired code already existed and was returned as-is.
    pub reused_existing: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VerifyOutcome {
    pub order_id: Uuid,
    pub verified_at: DateTime<Utc>,
    /// True when the order had already been verified before this call.
    pub already_verified: bool,
}

/// Issues and checks the one-time delivery confirmation code, enforcing
/// expiry and the wrong-attempt budget. A correct submission drives the
/// order to `delivered` as a side effect.
#[derive(Clone)]
pub struct VerificationGate {
    db: Arc<DbPool>,
    config: VerificationConfig,
    event_sender: EventSender,
    bus: Arc<dyn NotificationBus>,
}

impl VerificationGate {
    pub fn new(
        db: Arc<DbPool>,
        config: VerificationConfig,
        event_sender: EventSender,
        bus: Arc<dyn NotificationBus>,
    ) -> Self {
        Self {
            db,
            config,
            event_sender,
            bus,
        }
    }

    fn fresh_code() -> String {
        rand::thread_rng().gen_range(100_000..=999_999).to_string()
    }

    async fn load_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Ensures the order carries a live code. Idempotent: an unexpired
    /// code is returned unchanged; an expired or absent one is replaced
    /// and the attempt counter reset.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn generate_code(&self, order_id: Uuid) -> Result<CodeIssue, ServiceError> {
        let now = Utc::now();
        let order = self.load_order(order_id).await?;

        let status = parse_order_status(&order.status)?;
        if status.is_terminal() {
            return Err(ServiceError::PreconditionFailed(format!(
                "order {} is {} and no longer accepts a verification code",
                order_id, status
            )));
        }

        if let (Some(_), Some(expires_at)) =
            (&order.verification_code, order.verification_expires_at)
        {
            if expires_at > now {
                return Ok(CodeIssue {
                    order_id,
                    expires_at,
                    reused_existing: true,
                });
            }
        }

        self.issue_fresh(order, now).await
    }

    /// Replaces the current code regardless of its remaining lifetime and
    /// pushes the new one out. Used when a driver or customer asks for a
    /// resend they cannot recover.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn regenerate_code(&self, order_id: Uuid) -> Result<CodeIssue, ServiceError> {
        let now = Utc::now();
        let order = self.load_order(order_id).await?;

        let status = parse_order_status(&order.status)?;
        if status.is_terminal() {
            return Err(ServiceError::PreconditionFailed(format!(
                "order {} is {} and no longer accepts a verification code",
                order_id, status
            )));
        }

        let issue = self.issue_fresh(order, now).await?;
        self.send_code(order_id).await?;
        Ok(issue)
    }

    async fn issue_fresh(
        &self,
        order: order::Model,
        now: DateTime<Utc>,
    ) -> Result<CodeIssue, ServiceError> {
        let order_id = order.id;
        let expires_at = now + Duration::seconds(self.config.code_ttl_secs);

        let mut active: order::ActiveModel = order.into();
        active.verification_code = Set(Some(Self::fresh_code()));
        active.verification_expires_at = Set(Some(expires_at));
        active.verification_attempts = Set(0);
        active.updated_at = Set(Some(now));
        active.update(&*self.db).await?;

        info!(order_id = %order_id, %expires_at, "issued delivery verification code");

        if let Err(e) = self
            .event_sender
            .send(Event::VerificationCodeGenerated {
                order_id,
                expires_at,
            })
            .await
        {
            warn!(order_id = %order_id, error = %e, "failed to send verification event");
        }

        Ok(CodeIssue {
            order_id,
            expires_at,
            reused_existing: false,
        })
    }

    /// Pushes the current code to the customer room and the assigned
    /// driver room. Safe to call repeatedly, e.g. on reassignment.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn send_code(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self.load_order(order_id).await?;
        let code = order.verification_code.clone().ok_or_else(|| {
            ServiceError::PreconditionFailed(format!(
                "order {} has no verification code to send",
                order_id
            ))
        })?;

        let payload = json!({
            "order_id": order_id,
            "code": code,
            "expires_at": order.verification_expires_at,
        });
        emit_best_effort(
            &self.bus,
            Room::Order(order_id),
            RoomMessage::new("verification_code", payload.clone()),
        )
        .await;
        if let Some(driver_id) = order.driver_id {
            emit_best_effort(
                &self.bus,
                Room::Driver(driver_id),
                RoomMessage::new("verification_code", payload),
            )
            .await;
        }
        send_sms_placeholder(
            &format!("customer:{}", order.customer_id),
            &format!("Your delivery confirmation code is {}", code),
        );
        Ok(())
    }

    /// Checks a submitted code. Only the assigned driver may submit; a
    /// match stamps `verified_at` and drives the order to `delivered`.
    #[instrument(skip(self, submitted), fields(order_id = %order_id, driver_id = %actor.id))]
    pub async fn verify_code(
        &self,
        order_id: Uuid,
        actor: Actor,
        submitted: &str,
    ) -> Result<VerifyOutcome, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if actor.role != ActorRole::Driver || order.driver_id != Some(actor.id) {
            return Err(ServiceError::Forbidden(format!(
                "only the assigned driver may verify order {}",
                order_id
            )));
        }

        if let Some(verified_at) = order.verified_at {
            // Idempotent: re-submitting after success reports the fact.
            return Ok(VerifyOutcome {
                order_id,
                verified_at,
                already_verified: true,
            });
        }

        let code = order.verification_code.clone().ok_or_else(|| {
            ServiceError::PreconditionFailed(format!(
                "no verification code was generated for order {}",
                order_id
            ))
        })?;
        let expires_at = order.verification_expires_at.ok_or_else(|| {
            ServiceError::PreconditionFailed(format!(
                "no verification code was generated for order {}",
                order_id
            ))
        })?;

        if now >= expires_at {
            return Err(ServiceError::CodeExpired(format!(
                "verification code for order {} expired at {}",
                order_id, expires_at
            )));
        }
        // The budget gates even a correct late submission.
        if order.verification_attempts >= self.config.max_attempts {
            return Err(ServiceError::AttemptsExhausted(format!(
                "verification attempts exhausted for order {} ({} of {})",
                order_id, order.verification_attempts, self.config.max_attempts
            )));
        }

        if submitted != code {
            let attempts = order.verification_attempts + 1;
            let remaining = (self.config.max_attempts - attempts).max(0);
            let mut active: order::ActiveModel = order.into();
            active.verification_attempts = Set(attempts);
            active.updated_at = Set(Some(now));
            active.update(&txn).await?;
            txn.commit().await?;
            return Err(ServiceError::Validation(format!(
                "incorrect verification code for order {}; {} attempt(s) remaining",
                order_id, remaining
            )));
        }

        // Correct code: stamp verification, then deliver.
        let from = parse_order_status(&order.status)?;
        let mut active: order::ActiveModel = order.into();
        active.verification_attempts = Set(0);
        active.verified_at = Set(Some(now));
        let stamped = active.update(&txn).await?;

        // The transition mirrors `delivered` onto the delivery row too.
        let updated = apply_transition(
            &txn,
            stamped,
            OrderStatus::Delivered,
            actor,
            None,
            now,
        )
        .await?;

        txn.commit().await?;
        info!(order_id = %order_id, driver_id = %actor.id, "delivery verified");

        let stage = project_stage_from_strings(&updated.status, &updated.payment_status);
        emit_best_effort(
            &self.bus,
            Room::Order(order_id),
            RoomMessage::new(
                "status_changed",
                json!({
                    "order_id": order_id,
                    "old_status": from.to_string(),
                    "new_status": OrderStatus::Delivered.to_string(),
                    "tracking_stage": stage.number(),
                    "tracking_stage_name": stage.to_string(),
                }),
            ),
        )
        .await;

        let events = [
            Event::VerificationSucceeded {
                order_id,
                driver_id: actor.id,
            },
            Event::OrderDelivered(order_id),
        ];
        for event in events {
            if let Err(e) = self.event_sender.send(event).await {
                warn!(order_id = %order_id, error = %e, "failed to send verification event");
            }
        }

        Ok(VerifyOutcome {
            order_id,
            verified_at: now,
            already_verified: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_codes_are_six_digit_numeric() {
        for _ in 0..200 {
            let code = VerificationGate::fresh_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }
}
