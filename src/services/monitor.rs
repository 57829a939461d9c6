use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, Condition, EntityTrait, QueryFilter,
};
use tracing::{info, instrument, warn};

use crate::{
    config::MonitorConfig,
    db::DbPool,
    entities::driver::{self, Entity as DriverEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Background sweep flipping to unavailable any driver whose heartbeat
/// is older than the threshold or was never recorded. Idempotent: a
/// sweep with nothing stale is a no-op.
#[derive(Clone)]
pub struct DriverStalenessMonitor {
    db: Arc<DbPool>,
    config: MonitorConfig,
    event_sender: EventSender,
}

impl DriverStalenessMonitor {
    pub fn new(db: Arc<DbPool>, config: MonitorConfig, event_sender: EventSender) -> Self {
        Self {
            db,
            config,
            event_sender,
        }
    }

    /// One pass; returns how many drivers were flipped.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - Duration::seconds(self.config.heartbeat_stale_secs);

        let result = DriverEntity::update_many()
            .col_expr(driver::Column::IsAvailable, Expr::value(false))
            .filter(
                Condition::all()
                    .add(driver::Column::IsAvailable.eq(true))
                    .add(
                        Condition::any()
                            .add(driver::Column::LastSeenAt.is_null())
                            .add(driver::Column::LastSeenAt.lt(cutoff)),
                    ),
            )
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            info!(flipped = result.rows_affected, "flipped stale drivers to unavailable");
            if let Err(e) = self
                .event_sender
                .send(Event::StaleDriversSwept {
                    flipped: result.rows_affected,
                })
                .await
            {
                warn!(error = %e, "failed to send staleness sweep event");
            }
        }
        Ok(result.rows_affected)
    }

    /// Runs the sweep on the configured interval until shutdown.
    pub async fn run(self) {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.config.interval_secs,
            stale_secs = self.config.heartbeat_stale_secs,
            "starting driver staleness monitor"
        );
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once().await {
                warn!(error = %e, "driver staleness sweep failed");
            }
        }
    }
}
