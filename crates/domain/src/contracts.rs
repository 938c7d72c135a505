//! Capability traits injected into the domain services, with their
//! canonical implementations.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::events::PaymentEvent;

/// Publishes events onto the in-process bus.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Enqueues one delivery per subscriber. The returned vector is
    /// non-empty only for enqueue failures.
    async fn publish(&self, ctx: &CancellationToken, event: PaymentEvent) -> Vec<bus::BusError>;
}

#[async_trait]
impl Publisher for bus::Bus<PaymentEvent> {
    async fn publish(&self, ctx: &CancellationToken, event: PaymentEvent) -> Vec<bus::BusError> {
        bus::Bus::publish(self, ctx, event).await
    }
}

/// Appends events to the durable journal.
pub trait Journal: Send + Sync {
    fn append(&self, aggregate_id: &str, event: &PaymentEvent) -> common::Result<()>;
}

impl Journal for journal::EventJournal {
    fn append(&self, aggregate_id: &str, event: &PaymentEvent) -> common::Result<()> {
        journal::EventJournal::append(self, aggregate_id, event)
    }
}
