pub mod dispatch;
pub mod drivers;
pub mod orders;
pub mod payments;
pub mod tracking;
pub mod verification;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    notifications::NotificationBus,
    services::{
        dispatch::DispatchEngine,
        drivers::DriverService,
        fees::FeeCalculator,
        lifecycle::OrderLifecycleService,
        monitor::DriverStalenessMonitor,
        orders::OrderService,
        tracking::{TrackingProjector, VehicleSpeeds},
        verification::VerificationGate,
    },
};

pub use crate::AppState;

/// Business-logic services used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub lifecycle: Arc<OrderLifecycleService>,
    pub dispatch: Arc<DispatchEngine>,
    pub tracking: Arc<TrackingProjector>,
    pub verification: Arc<VerificationGate>,
    pub drivers: Arc<DriverService>,
    pub monitor: DriverStalenessMonitor,
}

impl AppServices {
    /// Wires the service graph: verification feeds dispatch, dispatch
    /// feeds the lifecycle and checkout triggers.
    pub fn build(
        db: Arc<DbPool>,
        config: &AppConfig,
        event_sender: EventSender,
        bus: Arc<dyn NotificationBus>,
    ) -> Self {
        let verification = Arc::new(VerificationGate::new(
            db.clone(),
            config.verification.clone(),
            event_sender.clone(),
            bus.clone(),
        ));
        let dispatch = Arc::new(DispatchEngine::new(
            db.clone(),
            config.dispatch.clone(),
            event_sender.clone(),
            bus.clone(),
            verification.clone(),
        ));
        let lifecycle = Arc::new(OrderLifecycleService::new(
            db.clone(),
            event_sender.clone(),
            bus.clone(),
            dispatch.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            db.clone(),
            FeeCalculator::new(config.fees.clone()),
            event_sender.clone(),
            bus.clone(),
            dispatch.clone(),
        ));
        let tracking = Arc::new(TrackingProjector::new(
            db.clone(),
            VehicleSpeeds::from_config(config),
        ));
        let drivers = Arc::new(DriverService::new(
            db.clone(),
            event_sender.clone(),
            bus,
        ));
        let monitor = DriverStalenessMonitor::new(db, config.monitor.clone(), event_sender);

        Self {
            orders,
            lifecycle,
            dispatch,
            tracking,
            verification,
            drivers,
            monitor,
        }
    }
}
