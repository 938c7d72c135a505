use std::sync::Arc;

use chrono::Utc;
use common::Result;
use tokio_util::sync::CancellationToken;

use crate::contracts::{Journal, Publisher};
use crate::events::{
    PaymentEvent, PaymentFailedData, PaymentPendingData, PaymentRejectedData, PaymentSucceededData,
};

use super::model::{CreateRequest, Payment, Status, validate_create_request};
use super::repository::PaymentRepository;

/// Drives the payment state machine and emits its lifecycle events.
///
/// Every transition loads the aggregate, mutates it, saves it, appends the
/// lifecycle event to the journal, and publishes it to the bus. A payment
/// already in a terminal status is never transitioned again; such calls
/// are idempotent no-ops.
pub struct PaymentService {
    repo: Arc<dyn PaymentRepository>,
    journal: Arc<dyn Journal>,
    publisher: Arc<dyn Publisher>,
}

impl PaymentService {
    pub fn new(
        repo: Arc<dyn PaymentRepository>,
        journal: Arc<dyn Journal>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            repo,
            journal,
            publisher,
        }
    }

    /// Validates and persists a new payment in `initialized` status.
    ///
    /// The `payment.created` / `payment.initialized` events are emitted by
    /// the create path, not here.
    pub async fn initialize(&self, request: CreateRequest) -> Result<Payment> {
        validate_create_request(&request).inspect_err(|error| {
            tracing::warn!(
                payment_id = request.payment_id,
                user_id = request.user_id,
                amount = request.amount,
                %error,
                "payment validation failed"
            );
        })?;

        let payment = Payment {
            payment_id: request.payment_id,
            user_id: request.user_id,
            amount: request.amount,
            service: request.service,
            status: Status::Initialized,
            reason: None,
            gateway_id: None,
        };
        self.repo.save(&payment).await?;
        Ok(payment)
    }

    pub async fn mark_pending(&self, ctx: &CancellationToken, payment_id: &str) -> Result<()> {
        let Some(mut payment) = self.load_transitionable(payment_id).await? else {
            return Ok(());
        };
        payment.status = Status::Pending;
        self.repo.save(&payment).await?;

        let event = PaymentEvent::PaymentPending(PaymentPendingData {
            payment_id: payment.payment_id.clone(),
            user_id: payment.user_id.clone(),
            at: Utc::now(),
        });
        self.record(ctx, &payment.payment_id, event).await;
        Ok(())
    }

    pub async fn mark_rejected(
        &self,
        ctx: &CancellationToken,
        payment_id: &str,
        reason: &str,
    ) -> Result<()> {
        let Some(mut payment) = self.load_transitionable(payment_id).await? else {
            return Ok(());
        };
        payment.status = Status::Rejected;
        payment.reason = Some(reason.to_string());
        self.repo.save(&payment).await?;

        let event = PaymentEvent::PaymentRejected(PaymentRejectedData {
            payment_id: payment.payment_id.clone(),
            user_id: payment.user_id.clone(),
            reason: reason.to_string(),
            at: Utc::now(),
        });
        self.record(ctx, &payment.payment_id, event).await;
        Ok(())
    }

    pub async fn mark_succeeded(
        &self,
        ctx: &CancellationToken,
        payment_id: &str,
        gateway_id: &str,
    ) -> Result<()> {
        let Some(mut payment) = self.load_transitionable(payment_id).await? else {
            return Ok(());
        };
        payment.status = Status::Succeeded;
        payment.gateway_id = Some(gateway_id.to_string());
        self.repo.save(&payment).await?;

        let event = PaymentEvent::PaymentSucceeded(PaymentSucceededData {
            payment_id: payment.payment_id.clone(),
            user_id: payment.user_id.clone(),
            gateway_id: gateway_id.to_string(),
            at: Utc::now(),
        });
        self.record(ctx, &payment.payment_id, event).await;
        metrics::counter!("payments_succeeded_total").increment(1);
        Ok(())
    }

    pub async fn mark_failed(
        &self,
        ctx: &CancellationToken,
        payment_id: &str,
        reason: &str,
    ) -> Result<()> {
        let Some(mut payment) = self.load_transitionable(payment_id).await? else {
            return Ok(());
        };
        payment.status = Status::Failed;
        payment.reason = Some(reason.to_string());
        self.repo.save(&payment).await?;

        let event = PaymentEvent::PaymentFailed(PaymentFailedData {
            payment_id: payment.payment_id.clone(),
            user_id: payment.user_id.clone(),
            reason: reason.to_string(),
            at: Utc::now(),
        });
        self.record(ctx, &payment.payment_id, event).await;
        metrics::counter!("payments_failed_total").increment(1);
        Ok(())
    }

    pub async fn get(&self, payment_id: &str) -> Result<Payment> {
        self.repo.get(payment_id).await
    }

    /// Loads the payment, returning `None` when it is already terminal.
    async fn load_transitionable(&self, payment_id: &str) -> Result<Option<Payment>> {
        let payment = self.repo.get(payment_id).await.inspect_err(|error| {
            tracing::warn!(payment_id, %error, "payment load failed");
        })?;
        if payment.status.is_terminal() {
            tracing::debug!(
                payment_id,
                status = %payment.status,
                "transition skipped, payment is terminal"
            );
            return Ok(None);
        }
        Ok(Some(payment))
    }

    /// Journal-append then publish. Append failures are logged; the
    /// transition itself has already been persisted.
    async fn record(&self, ctx: &CancellationToken, aggregate_id: &str, event: PaymentEvent) {
        if let Err(error) = self.journal.append(aggregate_id, &event) {
            tracing::warn!(aggregate_id, event = event.name(), %error, "journal append failed");
        }
        self.publisher.publish(ctx, event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::InMemoryPaymentRepository;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<PaymentEvent>>,
    }

    impl RecordingPublisher {
        fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(|e| e.name()).collect()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(
            &self,
            _ctx: &CancellationToken,
            event: PaymentEvent,
        ) -> Vec<bus::BusError> {
            self.events.lock().unwrap().push(event);
            Vec::new()
        }
    }

    fn service() -> (PaymentService, Arc<RecordingPublisher>, Arc<journal::EventJournal>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let journal = Arc::new(journal::EventJournal::new());
        let service = PaymentService::new(
            Arc::new(InMemoryPaymentRepository::new()),
            journal.clone(),
            publisher.clone(),
        );
        (service, publisher, journal)
    }

    fn request(id: &str) -> CreateRequest {
        CreateRequest {
            payment_id: id.to_string(),
            user_id: "u1".into(),
            amount: 10,
            service: "internet".into(),
        }
    }

    #[tokio::test]
    async fn initialize_persists_with_initialized_status() {
        let (service, publisher, _) = service();
        let payment = service.initialize(request("p1")).await.unwrap();
        assert_eq!(payment.status, Status::Initialized);
        assert_eq!(service.get("p1").await.unwrap().payment_id, "p1");
        // Initialize itself emits nothing; the create path does.
        assert!(publisher.names().is_empty());
    }

    #[tokio::test]
    async fn initialize_rejects_invalid_requests() {
        let (service, _, _) = service();
        let err = service
            .initialize(CreateRequest {
                amount: 0,
                ..request("p1")
            })
            .await
            .unwrap_err();
        assert!(err.is_invalid());
    }

    #[tokio::test]
    async fn mark_pending_emits_event_and_journals_it() {
        let (service, publisher, journal) = service();
        let ctx = CancellationToken::new();
        service.initialize(request("p1")).await.unwrap();
        service.mark_pending(&ctx, "p1").await.unwrap();

        assert_eq!(service.get("p1").await.unwrap().status, Status::Pending);
        assert_eq!(publisher.names(), vec!["payment.pending"]);

        let records = journal.load("p1");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_name, "payment.pending");
    }

    #[tokio::test]
    async fn mark_succeeded_sets_gateway_id() {
        let (service, publisher, _) = service();
        let ctx = CancellationToken::new();
        service.initialize(request("p1")).await.unwrap();
        service.mark_pending(&ctx, "p1").await.unwrap();
        service.mark_succeeded(&ctx, "p1", "gw_p1").await.unwrap();

        let payment = service.get("p1").await.unwrap();
        assert_eq!(payment.status, Status::Succeeded);
        assert_eq!(payment.gateway_id.as_deref(), Some("gw_p1"));
        assert_eq!(payment.reason, None);
        assert_eq!(publisher.names(), vec!["payment.pending", "payment.completed"]);
    }

    #[tokio::test]
    async fn terminal_payment_is_never_transitioned_again() {
        let (service, publisher, _) = service();
        let ctx = CancellationToken::new();
        service.initialize(request("p1")).await.unwrap();
        service.mark_rejected(&ctx, "p1", "insufficient funds").await.unwrap();

        // Subsequent transitions are idempotent no-ops.
        service.mark_pending(&ctx, "p1").await.unwrap();
        service.mark_failed(&ctx, "p1", "late failure").await.unwrap();
        service.mark_succeeded(&ctx, "p1", "gw_p1").await.unwrap();

        let payment = service.get("p1").await.unwrap();
        assert_eq!(payment.status, Status::Rejected);
        assert_eq!(payment.reason.as_deref(), Some("insufficient funds"));
        assert_eq!(payment.gateway_id, None);
        assert_eq!(publisher.names(), vec!["payment.rejected"]);
    }

    #[tokio::test]
    async fn transitions_on_missing_payments_fail_with_not_found() {
        let (service, _, _) = service();
        let ctx = CancellationToken::new();
        let err = service.mark_pending(&ctx, "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
