use std::sync::Arc;
use std::time::Duration;

use bus::HandlerError;
use chrono::Utc;
use domain::events::{
    PaymentChargeFailedData, PaymentChargeSucceededData, RecoveryRequestedData,
};
use domain::{Journal, PaymentEvent, Publisher};
use gateway::{Gateway, GatewayError};
use tokio_util::sync::CancellationToken;

use crate::recovery::RecoveryService;

use super::unexpected;

/// Per-attempt deadline for one gateway call.
const ATTEMPT_TIMEOUT: Duration = Duration::from_millis(200);
/// In-handler retry budget; attempt 5 hands over to the recovery pipeline.
const MAX_ATTEMPTS: u32 = 5;
/// Linear in-handler back-off unit: 50 ms times the attempt number.
const BACKOFF_UNIT: Duration = Duration::from_millis(50);

/// Calls the external gateway for `payment.charge_requested` events,
/// retrying transient failures in place.
///
/// Retryable failures (timeout, 5xx, exceeded deadline, open circuit) are
/// retried up to attempt 5; at exactly 5 the event is recorded to the DLQ
/// and handed to the recovery pipeline. Client errors, and retryable
/// failures arriving past the budget, fail the charge terminally.
pub struct ChargeHandler {
    publisher: Arc<dyn Publisher>,
    gateway: Arc<dyn Gateway>,
    recovery: Arc<RecoveryService>,
    journal: Arc<dyn Journal>,
}

impl ChargeHandler {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        gateway: Arc<dyn Gateway>,
        recovery: Arc<RecoveryService>,
        journal: Arc<dyn Journal>,
    ) -> Self {
        Self {
            publisher,
            gateway,
            recovery,
            journal,
        }
    }

    pub async fn on_charge_requested(
        &self,
        ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::PaymentChargeRequested(e) = event else {
            return Err(unexpected(&event));
        };

        let mut attempt = e.attempt;
        loop {
            match self.charge_once(ctx, &e.payment_id, e.amount).await {
                Ok(gateway_id) => {
                    tracing::info!(
                        payment_id = e.payment_id,
                        gateway_id,
                        attempt,
                        "gateway charge succeeded"
                    );
                    self.publisher
                        .publish(
                            ctx,
                            PaymentEvent::PaymentChargeSucceeded(PaymentChargeSucceededData {
                                payment_id: e.payment_id,
                                user_id: e.user_id,
                                gateway_id,
                                at: Utc::now(),
                            }),
                        )
                        .await;
                    return Ok(());
                }
                Err(error) => {
                    let retryable = matches!(
                        error,
                        GatewayError::Timeout
                            | GatewayError::Server
                            | GatewayError::DeadlineExceeded
                            | GatewayError::CircuitOpen
                    );
                    let error_code = error_code(&error);
                    let reason = error.to_string();

                    if retryable && attempt < MAX_ATTEMPTS {
                        let backoff = BACKOFF_UNIT * attempt;
                        tracing::info!(
                            payment_id = e.payment_id,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            error_code,
                            "gateway retrying"
                        );
                        crate::handlers::recovery_flow::sleep_ctx(ctx, backoff).await?;
                        attempt += 1;
                        continue;
                    }

                    if error == GatewayError::Client {
                        tracing::error!(
                            payment_id = e.payment_id,
                            attempt,
                            reason,
                            "gateway charge failed, client error"
                        );
                        self.fail(ctx, &e, &reason, error_code).await;
                        return Ok(());
                    }

                    if retryable && attempt == MAX_ATTEMPTS {
                        tracing::error!(
                            payment_id = e.payment_id,
                            attempts = attempt,
                            reason,
                            error_code,
                            "gateway retries exhausted, sending to recovery"
                        );
                        let request = PaymentEvent::RecoveryRequested(RecoveryRequestedData {
                            payment_id: e.payment_id.clone(),
                            user_id: e.user_id.clone(),
                            action: "payment.charge".to_string(),
                            reason: reason.clone(),
                            error_code: error_code.to_string(),
                            attempts: attempt,
                            at: Utc::now(),
                        });
                        self.recovery.send_to_dlq(
                            request.name(),
                            &reason,
                            &PaymentEvent::PaymentChargeRequested(e.clone()),
                        );
                        if let Err(error) = self.journal.append(&e.payment_id, &request) {
                            tracing::warn!(
                                payment_id = e.payment_id,
                                %error,
                                "journal append failed for recovery request"
                            );
                        }
                        self.publisher.publish(ctx, request).await;
                        return Ok(());
                    }

                    // Retryable but past the budget: terminal, through the
                    // same failure path as a client error.
                    tracing::error!(
                        payment_id = e.payment_id,
                        attempt,
                        reason,
                        "gateway charge failed"
                    );
                    self.fail(ctx, &e, &reason, error_code).await;
                    return Ok(());
                }
            }
        }
    }

    /// One gateway call under the per-attempt deadline. The deadline
    /// cancels the call's context rather than dropping the call, so the
    /// circuit breaker always observes the outcome.
    async fn charge_once(
        &self,
        ctx: &CancellationToken,
        payment_id: &str,
        amount: i64,
    ) -> Result<String, GatewayError> {
        let call_ctx = ctx.child_token();
        let deadline = {
            let token = call_ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(ATTEMPT_TIMEOUT).await;
                token.cancel();
            })
        };
        let result = self.gateway.charge(&call_ctx, payment_id, amount).await;
        deadline.abort();
        result
    }

    async fn fail(
        &self,
        ctx: &CancellationToken,
        e: &domain::events::PaymentChargeRequestedData,
        reason: &str,
        error_code: &str,
    ) {
        self.publisher
            .publish(
                ctx,
                PaymentEvent::PaymentChargeFailed(PaymentChargeFailedData {
                    payment_id: e.payment_id.clone(),
                    user_id: e.user_id.clone(),
                    reason: reason.to_string(),
                    retryable: false,
                    error_code: error_code.to_string(),
                    at: Utc::now(),
                }),
            )
            .await;
    }
}

fn error_code(error: &GatewayError) -> &'static str {
    match error {
        GatewayError::CircuitOpen => "cb_open",
        GatewayError::Timeout | GatewayError::DeadlineExceeded => "408",
        GatewayError::Server => "5xx",
        GatewayError::Client => "4xx",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::support::{RecordingPublisher, ScriptedGateway};

    fn charge_requested(amount: i64, attempt: u32) -> PaymentEvent {
        PaymentEvent::PaymentChargeRequested(domain::events::PaymentChargeRequestedData {
            payment_id: "p1".into(),
            user_id: "u1".into(),
            amount,
            service: "internet".into(),
            attempt,
            at: Utc::now(),
        })
    }

    fn setup(
        gateway: Arc<ScriptedGateway>,
    ) -> (ChargeHandler, Arc<RecordingPublisher>, Arc<journal::EventJournal>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let journal = Arc::new(journal::EventJournal::new());
        let handler = ChargeHandler::new(
            publisher.clone(),
            gateway,
            Arc::new(RecoveryService::new()),
            journal.clone(),
        );
        (handler, publisher, journal)
    }

    #[tokio::test]
    async fn success_publishes_charge_succeeded() {
        let gateway = ScriptedGateway::new(Vec::new());
        let (handler, publisher, _journal) = setup(gateway.clone());
        let ctx = CancellationToken::new();

        handler
            .on_charge_requested(&ctx, charge_requested(1, 1))
            .await
            .unwrap();

        let events = publisher.events();
        let PaymentEvent::PaymentChargeSucceeded(e) = &events[0] else {
            panic!("expected charge_succeeded");
        };
        assert_eq!(e.gateway_id, "gw_p1");
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn client_error_fails_immediately_without_retry() {
        let gateway = ScriptedGateway::always(Err(GatewayError::Client));
        let (handler, publisher, _journal) = setup(gateway.clone());
        let ctx = CancellationToken::new();

        handler
            .on_charge_requested(&ctx, charge_requested(11, 1))
            .await
            .unwrap();

        let events = publisher.events();
        let PaymentEvent::PaymentChargeFailed(e) = &events[0] else {
            panic!("expected charge_failed");
        };
        assert!(!e.retryable);
        assert_eq!(e.error_code, "4xx");
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn transient_failure_retries_in_place_then_succeeds() {
        let gateway = ScriptedGateway::new(vec![
            Err(GatewayError::Server),
            Ok("gw_p1".to_string()),
        ]);
        let (handler, publisher, _journal) = setup(gateway.clone());
        let ctx = CancellationToken::new();

        handler
            .on_charge_requested(&ctx, charge_requested(7, 1))
            .await
            .unwrap();

        assert_eq!(publisher.names(), vec!["payment.charge_succeeded"]);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn attempt_five_timeout_goes_to_recovery() {
        let gateway = ScriptedGateway::always(Err(GatewayError::Timeout));
        let (handler, publisher, journal) = setup(gateway.clone());
        let ctx = CancellationToken::new();

        handler
            .on_charge_requested(&ctx, charge_requested(5, 5))
            .await
            .unwrap();

        let events = publisher.events();
        let PaymentEvent::RecoveryRequested(e) = &events[0] else {
            panic!("expected recovery.requested");
        };
        assert_eq!(e.action, "payment.charge");
        assert_eq!(e.attempts, 5);
        assert_eq!(e.error_code, "408");
        // Arriving at attempt 5 means a single call, then hand-over.
        assert_eq!(gateway.calls(), 1);
        // The hand-over is journaled for replay and inspection.
        let records = journal.load("p1");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_name, "recovery.requested");
    }

    #[tokio::test]
    async fn retryable_past_the_budget_fails_terminally() {
        let gateway = ScriptedGateway::always(Err(GatewayError::Timeout));
        let (handler, publisher, _journal) = setup(gateway.clone());
        let ctx = CancellationToken::new();

        handler
            .on_charge_requested(&ctx, charge_requested(5, 6))
            .await
            .unwrap();

        let events = publisher.events();
        let PaymentEvent::PaymentChargeFailed(e) = &events[0] else {
            panic!("expected charge_failed");
        };
        assert!(!e.retryable);
        assert_eq!(e.error_code, "408");
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn circuit_open_maps_to_cb_open() {
        let gateway = ScriptedGateway::always(Err(GatewayError::CircuitOpen));
        let (handler, publisher, _journal) = setup(gateway);
        let ctx = CancellationToken::new();

        handler
            .on_charge_requested(&ctx, charge_requested(3, 6))
            .await
            .unwrap();

        let events = publisher.events();
        let PaymentEvent::PaymentChargeFailed(e) = &events[0] else {
            panic!("expected charge_failed");
        };
        assert_eq!(e.error_code, "cb_open");
    }

    #[tokio::test]
    async fn retries_walk_from_the_event_attempt_to_recovery() {
        let gateway = ScriptedGateway::always(Err(GatewayError::Server));
        let (handler, publisher, _journal) = setup(gateway.clone());
        let ctx = CancellationToken::new();

        handler
            .on_charge_requested(&ctx, charge_requested(7, 3))
            .await
            .unwrap();

        // Attempts 3, 4, and the hand-over at 5.
        assert_eq!(gateway.calls(), 3);
        let events = publisher.events();
        let PaymentEvent::RecoveryRequested(e) = &events[0] else {
            panic!("expected recovery.requested");
        };
        assert_eq!(e.attempts, 5);
        assert_eq!(e.error_code, "5xx");
    }

    #[tokio::test]
    async fn unexpected_event_types_are_errors() {
        let (handler, _, _) = setup(ScriptedGateway::new(Vec::new()));
        let ctx = CancellationToken::new();
        let wrong = PaymentEvent::PaymentPending(domain::events::PaymentPendingData {
            payment_id: "p1".into(),
            user_id: "u1".into(),
            at: Utc::now(),
        });
        assert!(handler.on_charge_requested(&ctx, wrong).await.is_err());
    }
}
