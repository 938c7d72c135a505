use std::sync::Arc;

use bus::HandlerError;
use chrono::Utc;
use domain::events::{
    RecoveryRequestedData, WalletDebitRejectedData, WalletDebitRequestedData, WalletDebitedData,
    WalletRefundedData,
};
use domain::{PaymentEvent, Publisher, WalletService};
use tokio_util::sync::CancellationToken;

use super::unexpected;

/// Drives the wallet side of the saga: requesting, performing, and
/// compensating debits.
pub struct WalletFlowHandler {
    publisher: Arc<dyn Publisher>,
    wallet: Arc<WalletService>,
}

impl WalletFlowHandler {
    pub fn new(publisher: Arc<dyn Publisher>, wallet: Arc<WalletService>) -> Self {
        Self { publisher, wallet }
    }

    /// `payment.initialized` → request the first debit attempt.
    pub async fn on_payment_initialized(
        &self,
        ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::PaymentInitialized(e) = event else {
            return Err(unexpected(&event));
        };

        self.publisher
            .publish(
                ctx,
                PaymentEvent::WalletDebitRequested(WalletDebitRequestedData {
                    payment_id: e.payment_id,
                    user_id: e.user_id,
                    amount: e.amount,
                    attempt: 1,
                    at: Utc::now(),
                }),
            )
            .await;
        Ok(())
    }

    /// `wallet.debit_requested` → attempt the conditional debit.
    ///
    /// An internal failure on the first attempt escapes into the recovery
    /// pipeline; any other failure rejects the debit. Both outcomes are
    /// terminal for this delivery, so the handler returns Ok.
    pub async fn on_debit_requested(
        &self,
        ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::WalletDebitRequested(e) = event else {
            return Err(unexpected(&event));
        };

        if let Err(error) = self.wallet.debit(&e.user_id, e.amount).await {
            if error.is_internal() && e.attempt == 1 {
                self.publisher
                    .publish(
                        ctx,
                        PaymentEvent::RecoveryRequested(RecoveryRequestedData {
                            payment_id: e.payment_id,
                            user_id: e.user_id,
                            action: "wallet.debit".to_string(),
                            reason: error.to_string(),
                            error_code: "db_internal".to_string(),
                            attempts: e.attempt,
                            at: Utc::now(),
                        }),
                    )
                    .await;
                return Ok(());
            }

            self.publisher
                .publish(
                    ctx,
                    PaymentEvent::WalletDebitRejected(WalletDebitRejectedData {
                        payment_id: e.payment_id,
                        user_id: e.user_id,
                        reason: error.to_string(),
                        at: Utc::now(),
                    }),
                )
                .await;
            return Ok(());
        }

        self.publisher
            .publish(
                ctx,
                PaymentEvent::WalletDebited(WalletDebitedData {
                    payment_id: e.payment_id,
                    user_id: e.user_id,
                    amount: e.amount,
                    at: Utc::now(),
                }),
            )
            .await;
        Ok(())
    }

    /// `wallet.refund_requested` → compensate a failed payment.
    pub async fn on_refund_requested(
        &self,
        ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::WalletRefundRequested(e) = event else {
            return Err(unexpected(&event));
        };

        self.wallet.refund(&e.user_id, e.amount).await?;
        self.publisher
            .publish(
                ctx,
                PaymentEvent::WalletRefunded(WalletRefundedData {
                    payment_id: e.payment_id,
                    user_id: e.user_id,
                    amount: e.amount,
                    at: Utc::now(),
                }),
            )
            .await;
        Ok(())
    }

    pub async fn on_debited(
        &self,
        _ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::WalletDebited(e) = event else {
            return Err(unexpected(&event));
        };
        tracing::info!(
            payment_id = e.payment_id,
            user_id = e.user_id,
            amount = e.amount,
            "wallet debited"
        );
        Ok(())
    }

    pub async fn on_refunded(
        &self,
        _ctx: &CancellationToken,
        event: PaymentEvent,
    ) -> Result<(), HandlerError> {
        let PaymentEvent::WalletRefunded(e) = event else {
            return Err(unexpected(&event));
        };
        tracing::info!(
            payment_id = e.payment_id,
            user_id = e.user_id,
            amount = e.amount,
            "wallet refunded"
        );
        Ok(())
    }
}
