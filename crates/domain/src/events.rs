//! The event catalog: the closed set of events flowing through the bus
//! and the journal.
//!
//! Event names are the public contract of the system; the JSON payload of
//! an event is the bare data struct (the enum serializes untagged), so the
//! journal's durable lines carry exactly the fields below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public event name strings, used for subscriptions and journal records.
pub mod names {
    pub const PAYMENT_CREATED: &str = "payment.created";
    pub const PAYMENT_INITIALIZED: &str = "payment.initialized";
    pub const PAYMENT_PENDING: &str = "payment.pending";
    pub const PAYMENT_REJECTED: &str = "payment.rejected";
    pub const PAYMENT_CHARGE_REQUESTED: &str = "payment.charge_requested";
    pub const PAYMENT_CHARGE_SUCCEEDED: &str = "payment.charge_succeeded";
    pub const PAYMENT_CHARGE_FAILED: &str = "payment.charge_failed";
    pub const PAYMENT_SUCCEEDED: &str = "payment.completed";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const WALLET_DEBIT_REQUESTED: &str = "wallet.debit_requested";
    pub const WALLET_DEBITED: &str = "wallet.debited";
    pub const WALLET_DEBIT_REJECTED: &str = "wallet.debit_rejected";
    pub const WALLET_REFUND_REQUESTED: &str = "wallet.refund_requested";
    pub const WALLET_REFUNDED: &str = "wallet.refunded";
    pub const WALLET_CREDITED: &str = "wallet.credited";
    pub const RECOVERY_REQUESTED: &str = "recovery.requested";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCreatedData {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub service: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitializedData {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub service: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPendingData {
    pub payment_id: String,
    pub user_id: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRejectedData {
    pub payment_id: String,
    pub user_id: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentChargeRequestedData {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub service: String,
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentChargeSucceededData {
    pub payment_id: String,
    pub user_id: String,
    pub gateway_id: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentChargeFailedData {
    pub payment_id: String,
    pub user_id: String,
    pub reason: String,
    pub retryable: bool,
    pub error_code: String,
    pub at: DateTime<Utc>,
}

/// Terminal success. Note the public name is `payment.completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSucceededData {
    pub payment_id: String,
    pub user_id: String,
    pub gateway_id: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub payment_id: String,
    pub user_id: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDebitRequestedData {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDebitedData {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDebitRejectedData {
    pub payment_id: String,
    pub user_id: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRefundRequestedData {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRefundedData {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub at: DateTime<Utc>,
}

/// Credits partition by user, not payment: a credit is not tied to any
/// payment's saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletCreditedData {
    pub user_id: String,
    pub amount: i64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRequestedData {
    pub payment_id: String,
    pub user_id: String,
    pub action: String,
    pub reason: String,
    pub error_code: String,
    pub attempts: u32,
    pub at: DateTime<Utc>,
}

/// Every event the orchestrator publishes.
///
/// Serialization is untagged: the wire payload is the variant's data
/// struct alone, with the event name carried out of band (bus subscription
/// name, journal `event_name`).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PaymentEvent {
    PaymentCreated(PaymentCreatedData),
    PaymentInitialized(PaymentInitializedData),
    PaymentPending(PaymentPendingData),
    PaymentRejected(PaymentRejectedData),
    PaymentChargeRequested(PaymentChargeRequestedData),
    PaymentChargeSucceeded(PaymentChargeSucceededData),
    PaymentChargeFailed(PaymentChargeFailedData),
    PaymentSucceeded(PaymentSucceededData),
    PaymentFailed(PaymentFailedData),
    WalletDebitRequested(WalletDebitRequestedData),
    WalletDebited(WalletDebitedData),
    WalletDebitRejected(WalletDebitRejectedData),
    WalletRefundRequested(WalletRefundRequestedData),
    WalletRefunded(WalletRefundedData),
    WalletCredited(WalletCreditedData),
    RecoveryRequested(RecoveryRequestedData),
}

impl PaymentEvent {
    /// The event's stable public name.
    pub fn name(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentCreated(_) => names::PAYMENT_CREATED,
            PaymentEvent::PaymentInitialized(_) => names::PAYMENT_INITIALIZED,
            PaymentEvent::PaymentPending(_) => names::PAYMENT_PENDING,
            PaymentEvent::PaymentRejected(_) => names::PAYMENT_REJECTED,
            PaymentEvent::PaymentChargeRequested(_) => names::PAYMENT_CHARGE_REQUESTED,
            PaymentEvent::PaymentChargeSucceeded(_) => names::PAYMENT_CHARGE_SUCCEEDED,
            PaymentEvent::PaymentChargeFailed(_) => names::PAYMENT_CHARGE_FAILED,
            PaymentEvent::PaymentSucceeded(_) => names::PAYMENT_SUCCEEDED,
            PaymentEvent::PaymentFailed(_) => names::PAYMENT_FAILED,
            PaymentEvent::WalletDebitRequested(_) => names::WALLET_DEBIT_REQUESTED,
            PaymentEvent::WalletDebited(_) => names::WALLET_DEBITED,
            PaymentEvent::WalletDebitRejected(_) => names::WALLET_DEBIT_REJECTED,
            PaymentEvent::WalletRefundRequested(_) => names::WALLET_REFUND_REQUESTED,
            PaymentEvent::WalletRefunded(_) => names::WALLET_REFUNDED,
            PaymentEvent::WalletCredited(_) => names::WALLET_CREDITED,
            PaymentEvent::RecoveryRequested(_) => names::RECOVERY_REQUESTED,
        }
    }

    /// The ordering key: the payment id for saga events, the user id for
    /// credits.
    pub fn partition_key(&self) -> String {
        match self {
            PaymentEvent::PaymentCreated(e) => e.payment_id.clone(),
            PaymentEvent::PaymentInitialized(e) => e.payment_id.clone(),
            PaymentEvent::PaymentPending(e) => e.payment_id.clone(),
            PaymentEvent::PaymentRejected(e) => e.payment_id.clone(),
            PaymentEvent::PaymentChargeRequested(e) => e.payment_id.clone(),
            PaymentEvent::PaymentChargeSucceeded(e) => e.payment_id.clone(),
            PaymentEvent::PaymentChargeFailed(e) => e.payment_id.clone(),
            PaymentEvent::PaymentSucceeded(e) => e.payment_id.clone(),
            PaymentEvent::PaymentFailed(e) => e.payment_id.clone(),
            PaymentEvent::WalletDebitRequested(e) => e.payment_id.clone(),
            PaymentEvent::WalletDebited(e) => e.payment_id.clone(),
            PaymentEvent::WalletDebitRejected(e) => e.payment_id.clone(),
            PaymentEvent::WalletRefundRequested(e) => e.payment_id.clone(),
            PaymentEvent::WalletRefunded(e) => e.payment_id.clone(),
            PaymentEvent::WalletCredited(e) => e.user_id.clone(),
            PaymentEvent::RecoveryRequested(e) => e.payment_id.clone(),
        }
    }
}

impl bus::Event for PaymentEvent {
    fn name(&self) -> &'static str {
        PaymentEvent::name(self)
    }

    fn partition_key(&self) -> String {
        PaymentEvent::partition_key(self)
    }
}
