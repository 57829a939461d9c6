use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Handle for pushing domain events into the async processing loop.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Domain events emitted after a state change commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order lifecycle
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled {
        order_id: Uuid,
        reason: Option<String>,
    },
    OrderDelivered(Uuid),

    // Dispatch
    DriverOffered {
        order_id: Uuid,
        driver_id: Uuid,
        assignment_id: Uuid,
    },
    AssignmentAccepted {
        order_id: Uuid,
        driver_id: Uuid,
    },
    AssignmentReleased {
        order_id: Uuid,
        driver_id: Uuid,
    },
    OfferExpired {
        order_id: Uuid,
        driver_id: Uuid,
    },

    // Verification
    VerificationCodeGenerated {
        order_id: Uuid,
        expires_at: DateTime<Utc>,
    },
    VerificationSucceeded {
        order_id: Uuid,
        driver_id: Uuid,
    },

    // Payment boundary
    PaymentCompleted(Uuid),
    PaymentFailed(Uuid),

    // Drivers
    DriverAvailabilityChanged {
        driver_id: Uuid,
        is_available: bool,
    },
    StaleDriversSwept {
        flipped: u64,
    },
}

/// Drains the event channel, logging each event. Downstream consumers
/// (analytics, settlement) hook in here.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "order status changed"
                );
            }
            Event::AssignmentAccepted {
                order_id,
                driver_id,
            } => {
                info!(order_id = %order_id, driver_id = %driver_id, "assignment accepted");
            }
            Event::VerificationSucceeded {
                order_id,
                driver_id,
            } => {
                info!(order_id = %order_id, driver_id = %driver_id, "delivery verified");
            }
            other => {
                debug!(event = ?other, "event processed");
            }
        }
    }

    info!("Event channel closed; processing loop exiting");
}
