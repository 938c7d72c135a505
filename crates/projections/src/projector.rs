use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CoreError, Result};
use domain::Status;
use domain::events::{
    self, PaymentCreatedData, PaymentEvent, PaymentFailedData, PaymentInitializedData,
    PaymentPendingData, PaymentRejectedData, PaymentSucceededData, WalletCreditedData,
    WalletDebitedData, WalletRefundedData,
};
use journal::{EventJournal, JournalRecord};
use tokio::sync::RwLock;

/// Current state of one payment, as seen by readers.
#[derive(Debug, Clone)]
pub struct PaymentView {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub service: String,
    pub status: Status,
    pub reason: Option<String>,
    pub gateway_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentView {
    fn blank(payment_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            payment_id: payment_id.to_string(),
            user_id: String::new(),
            amount: 0,
            service: String::new(),
            status: Status::Initialized,
            reason: None,
            gateway_id: None,
            updated_at: at,
        }
    }
}

/// Current balance of one wallet, as seen by readers.
#[derive(Debug, Clone)]
pub struct WalletView {
    pub user_id: String,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct ViewMaps {
    payments: HashMap<String, PaymentView>,
    wallets: HashMap<String, WalletView>,
}

impl ViewMaps {
    fn payment_entry(&mut self, payment_id: &str, at: DateTime<Utc>) -> &mut PaymentView {
        self.payments
            .entry(payment_id.to_string())
            .or_insert_with(|| PaymentView::blank(payment_id, at))
    }

    fn wallet_entry(&mut self, user_id: &str, at: DateTime<Utc>) -> &mut WalletView {
        self.wallets
            .entry(user_id.to_string())
            .or_insert_with(|| WalletView {
                user_id: user_id.to_string(),
                balance: 0,
                updated_at: at,
            })
    }
}

/// Deterministic fold of the event stream into queryable views.
#[derive(Default)]
pub struct Projector {
    views: RwLock<ViewMaps>,
}

impl Projector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one live event from the bus.
    pub async fn apply(&self, event: &PaymentEvent) -> Result<()> {
        let mut views = self.views.write().await;
        match event {
            PaymentEvent::PaymentCreated(e) => apply_created(&mut views, e),
            PaymentEvent::PaymentInitialized(e) => apply_initialized(&mut views, e),
            PaymentEvent::PaymentPending(e) => apply_pending(&mut views, e),
            PaymentEvent::PaymentRejected(e) => apply_rejected(&mut views, e),
            PaymentEvent::PaymentSucceeded(e) => apply_succeeded(&mut views, e),
            PaymentEvent::PaymentFailed(e) => apply_failed(&mut views, e),
            PaymentEvent::WalletCredited(e) => apply_credited(&mut views, e),
            PaymentEvent::WalletDebited(e) => apply_debited(&mut views, e),
            PaymentEvent::WalletRefunded(e) => apply_refunded(&mut views, e),
            _ => {}
        }
        Ok(())
    }

    /// Applies one journal record by decoding its payload per event name.
    /// Records with names the projector does not fold are skipped.
    pub async fn apply_record(&self, record: &JournalRecord) -> Result<()> {
        let mut views = self.views.write().await;
        match record.event_name.as_str() {
            events::names::PAYMENT_CREATED => {
                apply_created(&mut views, &decode(record)?);
            }
            events::names::PAYMENT_INITIALIZED => {
                apply_initialized(&mut views, &decode(record)?);
            }
            events::names::PAYMENT_PENDING => {
                apply_pending(&mut views, &decode(record)?);
            }
            events::names::PAYMENT_REJECTED => {
                apply_rejected(&mut views, &decode(record)?);
            }
            events::names::PAYMENT_SUCCEEDED => {
                apply_succeeded(&mut views, &decode(record)?);
            }
            events::names::PAYMENT_FAILED => {
                apply_failed(&mut views, &decode(record)?);
            }
            events::names::WALLET_CREDITED => {
                apply_credited(&mut views, &decode(record)?);
            }
            events::names::WALLET_DEBITED => {
                apply_debited(&mut views, &decode(record)?);
            }
            events::names::WALLET_REFUNDED => {
                apply_refunded(&mut views, &decode(record)?);
            }
            _ => {}
        }
        Ok(())
    }

    /// Rebuilds the views from the journal's global log, in append order.
    pub async fn replay(&self, journal: &EventJournal) -> Result<()> {
        for record in journal.all() {
            self.apply_record(&record).await?;
        }
        Ok(())
    }

    pub async fn get_payment(&self, payment_id: &str) -> Option<PaymentView> {
        self.views.read().await.payments.get(payment_id).cloned()
    }

    pub async fn get_wallet(&self, user_id: &str) -> Option<WalletView> {
        self.views.read().await.wallets.get(user_id).cloned()
    }
}

fn decode<T: serde::de::DeserializeOwned>(record: &JournalRecord) -> Result<T> {
    serde_json::from_str(record.payload.get()).map_err(|err| {
        CoreError::internal(format!("decode {} payload", record.event_name)).with_source(err)
    })
}

fn apply_created(views: &mut ViewMaps, e: &PaymentCreatedData) {
    let view = views.payment_entry(&e.payment_id, e.at);
    view.user_id = e.user_id.clone();
    view.amount = e.amount;
    view.service = e.service.clone();
    view.updated_at = e.at;
}

fn apply_initialized(views: &mut ViewMaps, e: &PaymentInitializedData) {
    let view = views.payment_entry(&e.payment_id, e.at);
    view.user_id = e.user_id.clone();
    view.amount = e.amount;
    view.service = e.service.clone();
    view.status = Status::Initialized;
    view.updated_at = e.at;
}

fn apply_pending(views: &mut ViewMaps, e: &PaymentPendingData) {
    let view = views.payment_entry(&e.payment_id, e.at);
    view.user_id = e.user_id.clone();
    view.status = Status::Pending;
    view.updated_at = e.at;
}

fn apply_rejected(views: &mut ViewMaps, e: &PaymentRejectedData) {
    let view = views.payment_entry(&e.payment_id, e.at);
    view.user_id = e.user_id.clone();
    view.status = Status::Rejected;
    view.reason = Some(e.reason.clone());
    view.updated_at = e.at;
}

fn apply_succeeded(views: &mut ViewMaps, e: &PaymentSucceededData) {
    let view = views.payment_entry(&e.payment_id, e.at);
    view.user_id = e.user_id.clone();
    view.status = Status::Succeeded;
    view.gateway_id = Some(e.gateway_id.clone());
    view.updated_at = e.at;
}

fn apply_failed(views: &mut ViewMaps, e: &PaymentFailedData) {
    let view = views.payment_entry(&e.payment_id, e.at);
    view.user_id = e.user_id.clone();
    view.status = Status::Failed;
    view.reason = Some(e.reason.clone());
    view.updated_at = e.at;
}

fn apply_credited(views: &mut ViewMaps, e: &WalletCreditedData) {
    let view = views.wallet_entry(&e.user_id, e.at);
    view.balance += e.amount;
    view.updated_at = e.at;
}

fn apply_debited(views: &mut ViewMaps, e: &WalletDebitedData) {
    let view = views.wallet_entry(&e.user_id, e.at);
    view.balance -= e.amount;
    view.updated_at = e.at;
}

fn apply_refunded(views: &mut ViewMaps, e: &WalletRefundedData) {
    let view = views.wallet_entry(&e.user_id, e.at);
    view.balance += e.amount;
    view.updated_at = e.at;
}
