//! Event handlers. Each handler matches the variants it subscribes to and
//! treats anything else as a wiring bug.

pub mod charge;
pub mod payment_flow;
pub mod recovery_flow;
pub mod result;
pub mod wallet_flow;

mod observers;

pub use observers::{AuditHandler, MetricsHandler, NotificationHandler};

use bus::HandlerError;
use domain::PaymentEvent;

pub(crate) fn unexpected(event: &PaymentEvent) -> HandlerError {
    format!("unexpected event type: {}", event.name()).into()
}
