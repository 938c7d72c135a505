//! Side-channel handlers: audit trail, user notifications, and event
//! counters. None of them participate in the saga's control flow.

use std::sync::Arc;

use bus::HandlerError;
use domain::PaymentEvent;
use tokio_util::sync::CancellationToken;

use crate::audit::AuditService;
use crate::notification::NotificationService;

use super::unexpected;

/// Records every observed event to the audit trail.
pub struct AuditHandler {
    audit: Arc<AuditService>,
}

impl AuditHandler {
    pub fn new(audit: Arc<AuditService>) -> Self {
        Self { audit }
    }

    pub async fn on_any(
        &self,
        _ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let fields = serde_json::to_value(&event)
            .map_err(|err| format!("encode audit fields: {err}"))?;
        self.audit.record(event.name(), fields);
        Ok(())
    }
}

/// Counts every observed event under `bus_events_total{event=…}`.
pub struct MetricsHandler;

impl MetricsHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn on_any(
        &self,
        _ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        metrics::counter!("bus_events_total", "event" => event.name()).increment(1);
        Ok(())
    }
}

impl Default for MetricsHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Tells the user how their payment ended.
pub struct NotificationHandler {
    notifications: Arc<NotificationService>,
}

impl NotificationHandler {
    pub fn new(notifications: Arc<NotificationService>) -> Self {
        Self { notifications }
    }

    pub async fn on_payment_succeeded(
        &self,
        _ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::PaymentSucceeded(e) = event else {
            return Err(unexpected(&event));
        };
        self.notifications.notify(&e.user_id, "payment completed");
        Ok(())
    }

    pub async fn on_payment_failed(
        &self,
        _ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::PaymentFailed(e) = event else {
            return Err(unexpected(&event));
        };
        self.notifications.notify(&e.user_id, "payment failed");
        Ok(())
    }
}
