use std::sync::Arc;

use bus::HandlerError;
use chrono::Utc;
use domain::events::PaymentChargeRequestedData;
use domain::{PaymentEvent, PaymentService, Publisher};
use tokio_util::sync::CancellationToken;

use super::unexpected;

/// Advances the payment state machine off wallet outcomes.
pub struct PaymentFlowHandler {
    publisher: Arc<dyn Publisher>,
    payment: Arc<PaymentService>,
}

impl PaymentFlowHandler {
    pub fn new(publisher: Arc<dyn Publisher>, payment: Arc<PaymentService>) -> Self {
        Self { publisher, payment }
    }

    /// `wallet.debited` → mark pending, then request the first charge.
    pub async fn on_wallet_debited(
        &self,
        ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::WalletDebited(e) = event else {
            return Err(unexpected(&event));
        };

        self.payment.mark_pending(ctx, &e.payment_id).await?;
        let payment = self.payment.get(&e.payment_id).await?;

        self.publisher
            .publish(
                ctx,
                PaymentEvent::PaymentChargeRequested(PaymentChargeRequestedData {
                    payment_id: payment.payment_id,
                    user_id: payment.user_id,
                    amount: payment.amount,
                    service: payment.service,
                    attempt: 1,
                    at: Utc::now(),
                }),
            )
            .await;
        Ok(())
    }

    /// `wallet.debit_rejected` → terminal rejection.
    pub async fn on_debit_rejected(
        &self,
        ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::WalletDebitRejected(e) = event else {
            return Err(unexpected(&event));
        };
        self.payment
            .mark_rejected(ctx, &e.payment_id, &e.reason)
            .await?;
        Ok(())
    }
}
