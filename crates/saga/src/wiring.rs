//! Subscription wiring: which handler listens to which event name.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bus::{Bus, DeliveryMode, HandlerError, handler, with_mode};
use domain::events::names;
use domain::{Journal, PaymentEvent, PaymentService, Publisher, WalletService};
use gateway::Gateway;
use tokio_util::sync::CancellationToken;

use crate::audit::AuditService;
use crate::handlers::charge::ChargeHandler;
use crate::handlers::payment_flow::PaymentFlowHandler;
use crate::handlers::recovery_flow::{RecoveryHandler, SleepFn};
use crate::handlers::result::ResultHandler;
use crate::handlers::wallet_flow::WalletFlowHandler;
use crate::handlers::{AuditHandler, MetricsHandler, NotificationHandler};
use crate::notification::NotificationService;
use crate::recovery::RecoveryService;

/// Everything the saga handlers are built from.
pub struct HandlerSet {
    pub payment: Arc<PaymentService>,
    pub wallet: Arc<WalletService>,
    pub gateway: Arc<dyn Gateway>,
    pub journal: Arc<dyn Journal>,
    pub recovery: Arc<RecoveryService>,
    pub audit: Arc<AuditService>,
    pub notifications: Arc<NotificationService>,
    /// How long the recovery handler waits before replaying a request.
    pub recovery_delay: Duration,
    /// Injectable sleep for the recovery handler; `None` uses the real one.
    pub sleep: Option<SleepFn>,
    /// Delivery mode applied to every subscription.
    pub mode: DeliveryMode,
}

fn subscribe<H, F, Fut>(
    bus: &Arc<Bus<PaymentEvent>>,
    mode: DeliveryMode,
    event_name: &'static str,
    target: Arc<H>,
    method: F,
) where
    H: Send + Sync + 'static,
    F: Fn(Arc<H>, CancellationToken, PaymentEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    bus.subscribe(
        event_name,
        with_mode(
            mode,
            handler(move |ctx, event| method(target.clone(), ctx, event)),
        ),
    );
}

/// Builds the saga handlers and subscribes them to the bus, mirroring the
/// full consumer topology: the core saga, the audit trail, event
/// counters, and notifications.
pub fn register_handlers(bus: &Arc<Bus<PaymentEvent>>, set: HandlerSet) {
    let publisher: Arc<dyn Publisher> = bus.clone();
    let mode = set.mode;

    let charge = Arc::new(ChargeHandler::new(
        publisher.clone(),
        set.gateway,
        set.recovery,
        set.journal,
    ));
    let result = Arc::new(ResultHandler::new(publisher.clone(), set.payment.clone()));
    let payment_flow = Arc::new(PaymentFlowHandler::new(
        publisher.clone(),
        set.payment.clone(),
    ));
    let wallet_flow = Arc::new(WalletFlowHandler::new(publisher.clone(), set.wallet));
    let recovery_flow = Arc::new(RecoveryHandler::new(
        publisher,
        set.payment,
        set.recovery_delay,
        set.sleep,
    ));
    let audit = Arc::new(AuditHandler::new(set.audit));
    let counters = Arc::new(MetricsHandler::new());
    let notifications = Arc::new(NotificationHandler::new(set.notifications));

    // Core saga.
    subscribe(bus, mode, names::PAYMENT_CHARGE_REQUESTED, charge, |h, ctx, e| async move {
        h.on_charge_requested(&ctx, e).await
    });
    subscribe(bus, mode, names::PAYMENT_CHARGE_SUCCEEDED, result.clone(), |h, ctx, e| async move {
        h.on_charge_succeeded(&ctx, e).await
    });
    subscribe(bus, mode, names::PAYMENT_CHARGE_FAILED, result, |h, ctx, e| async move {
        h.on_charge_failed(&ctx, e).await
    });
    subscribe(bus, mode, names::RECOVERY_REQUESTED, recovery_flow, |h, ctx, e| async move {
        h.on_recovery_requested(&ctx, e).await
    });

    subscribe(bus, mode, names::PAYMENT_INITIALIZED, wallet_flow.clone(), |h, ctx, e| async move {
        h.on_payment_initialized(&ctx, e).await
    });
    subscribe(bus, mode, names::WALLET_DEBIT_REQUESTED, wallet_flow.clone(), |h, ctx, e| async move {
        h.on_debit_requested(&ctx, e).await
    });
    subscribe(bus, mode, names::WALLET_DEBIT_REJECTED, payment_flow.clone(), |h, ctx, e| async move {
        h.on_debit_rejected(&ctx, e).await
    });
    subscribe(bus, mode, names::WALLET_DEBITED, payment_flow, |h, ctx, e| async move {
        h.on_wallet_debited(&ctx, e).await
    });
    subscribe(bus, mode, names::WALLET_REFUND_REQUESTED, wallet_flow.clone(), |h, ctx, e| async move {
        h.on_refund_requested(&ctx, e).await
    });

    // Audit trail.
    for event_name in [
        names::PAYMENT_CREATED,
        names::PAYMENT_INITIALIZED,
        names::PAYMENT_PENDING,
        names::WALLET_DEBITED,
        names::WALLET_REFUNDED,
        names::RECOVERY_REQUESTED,
        names::PAYMENT_SUCCEEDED,
        names::PAYMENT_FAILED,
    ] {
        subscribe(bus, mode, event_name, audit.clone(), |h, ctx, e| async move {
            h.on_any(&ctx, e).await
        });
    }

    // Event counters.
    for event_name in [
        names::PAYMENT_CREATED,
        names::WALLET_DEBITED,
        names::WALLET_REFUNDED,
        names::PAYMENT_SUCCEEDED,
        names::PAYMENT_FAILED,
    ] {
        subscribe(bus, mode, event_name, counters.clone(), |h, ctx, e| async move {
            h.on_any(&ctx, e).await
        });
    }

    // Notifications.
    subscribe(bus, mode, names::PAYMENT_SUCCEEDED, notifications.clone(), |h, ctx, e| async move {
        h.on_payment_succeeded(&ctx, e).await
    });
    subscribe(bus, mode, names::PAYMENT_FAILED, notifications, |h, ctx, e| async move {
        h.on_payment_failed(&ctx, e).await
    });

    // Observational wallet logging.
    subscribe(bus, mode, names::WALLET_DEBITED, wallet_flow.clone(), |h, ctx, e| async move {
        h.on_debited(&ctx, e).await
    });
    subscribe(bus, mode, names::WALLET_REFUNDED, wallet_flow, |h, ctx, e| async move {
        h.on_refunded(&ctx, e).await
    });
}
