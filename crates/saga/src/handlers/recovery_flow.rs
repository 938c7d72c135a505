use std::sync::Arc;
use std::time::Duration;

use bus::HandlerError;
use chrono::Utc;
use domain::events::{PaymentChargeRequestedData, WalletDebitRequestedData};
use domain::{PaymentEvent, PaymentService, Publisher};
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::unexpected;

/// Cancellation-aware sleep, injectable so tests run without waiting.
pub type SleepFn =
    Arc<dyn Fn(CancellationToken, Duration) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Sleeps for `duration` unless the context is cancelled first, in which
/// case the cancellation surfaces as the handler error.
pub(crate) async fn sleep_ctx(
    ctx: &CancellationToken,
    duration: Duration,
) -> Result<(), HandlerError> {
    tokio::select! {
        _ = ctx.cancelled() => Err("cancelled while sleeping".into()),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// The default [`SleepFn`], backed by [`sleep_ctx`].
pub fn default_sleep() -> SleepFn {
    Arc::new(|ctx, duration| Box::pin(async move { sleep_ctx(&ctx, duration).await }))
}

/// Replays a request event after a bounded delay, crossing the
/// retry-exhaustion boundary without blocking the original worker on a
/// long sleep.
pub struct RecoveryHandler {
    publisher: Arc<dyn Publisher>,
    payment: Arc<PaymentService>,
    delay: Duration,
    sleep: SleepFn,
}

impl RecoveryHandler {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        payment: Arc<PaymentService>,
        delay: Duration,
        sleep: Option<SleepFn>,
    ) -> Self {
        Self {
            publisher,
            payment,
            delay,
            sleep: sleep.unwrap_or_else(default_sleep),
        }
    }

    pub async fn on_recovery_requested(
        &self,
        ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::RecoveryRequested(e) = event else {
            return Err(unexpected(&event));
        };

        tracing::info!(
            payment_id = e.payment_id,
            delay_ms = self.delay.as_millis() as u64,
            action = e.action,
            error_code = e.error_code,
            attempts = e.attempts,
            "recovery scheduled"
        );

        (self.sleep)(ctx.clone(), self.delay).await?;

        let payment = self.payment.get(&e.payment_id).await?;
        match e.action.as_str() {
            "payment.charge" => {
                self.publisher
                    .publish(
                        ctx,
                        PaymentEvent::PaymentChargeRequested(PaymentChargeRequestedData {
                            payment_id: payment.payment_id,
                            user_id: payment.user_id,
                            amount: payment.amount,
                            service: payment.service,
                            attempt: e.attempts + 1,
                            at: Utc::now(),
                        }),
                    )
                    .await;
                Ok(())
            }
            "wallet.debit" => {
                self.publisher
                    .publish(
                        ctx,
                        PaymentEvent::WalletDebitRequested(WalletDebitRequestedData {
                            payment_id: payment.payment_id,
                            user_id: payment.user_id,
                            amount: payment.amount,
                            attempt: e.attempts + 1,
                            at: Utc::now(),
                        }),
                    )
                    .await;
                Ok(())
            }
            other => Err(format!("unknown recovery action: {other}").into()),
        }
    }
}
