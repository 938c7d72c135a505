use std::sync::Arc;

use bus::HandlerError;
use chrono::Utc;
use domain::events::WalletRefundRequestedData;
use domain::{PaymentEvent, PaymentService, Publisher};
use tokio_util::sync::CancellationToken;

use super::unexpected;

/// Applies gateway outcomes to the payment, compensating the wallet on
/// failure.
pub struct ResultHandler {
    publisher: Arc<dyn Publisher>,
    payment: Arc<PaymentService>,
}

impl ResultHandler {
    pub fn new(publisher: Arc<dyn Publisher>, payment: Arc<PaymentService>) -> Self {
        Self { publisher, payment }
    }

    /// `payment.charge_succeeded` → terminal success.
    pub async fn on_charge_succeeded(
        &self,
        ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::PaymentChargeSucceeded(e) = event else {
            return Err(unexpected(&event));
        };
        self.payment
            .mark_succeeded(ctx, &e.payment_id, &e.gateway_id)
            .await?;
        Ok(())
    }

    /// `payment.charge_failed` → terminal failure, then ask the wallet to
    /// give the money back.
    pub async fn on_charge_failed(
        &self,
        ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::PaymentChargeFailed(e) = event else {
            return Err(unexpected(&event));
        };

        self.payment
            .mark_failed(ctx, &e.payment_id, &e.reason)
            .await?;
        let payment = self.payment.get(&e.payment_id).await?;

        self.publisher
            .publish(
                ctx,
                PaymentEvent::WalletRefundRequested(WalletRefundRequestedData {
                    payment_id: payment.payment_id,
                    user_id: payment.user_id,
                    amount: payment.amount,
                    at: Utc::now(),
                }),
            )
            .await;
        Ok(())
    }
}
