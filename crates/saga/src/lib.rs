//! The orchestration saga: stateless handlers binding events to effects.
//!
//! Handlers run on bus shard workers and are re-entrant; all state lives
//! in the thread-safe services they are constructed with. A handler
//! decides what is fatal by publishing a terminal event and returning Ok;
//! a returned error hands the delivery back to the bus retry loop.

mod audit;
mod handlers;
mod notification;
mod recovery;
mod wiring;

pub use audit::AuditService;
pub use handlers::charge::ChargeHandler;
pub use handlers::payment_flow::PaymentFlowHandler;
pub use handlers::recovery_flow::{RecoveryHandler, SleepFn, default_sleep};
pub use handlers::result::ResultHandler;
pub use handlers::wallet_flow::WalletFlowHandler;
pub use handlers::{AuditHandler, MetricsHandler, NotificationHandler};
pub use notification::NotificationService;
pub use recovery::RecoveryService;
pub use wiring::{HandlerSet, register_handlers};
