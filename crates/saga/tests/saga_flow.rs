//! End-to-end saga runs over a real bus: happy path, insufficient funds,
//! terminal gateway failure with compensation, and the recovery pipeline.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bus::{Bus, BusConfig, DeliveryMode};
use chrono::Utc;
use domain::events::PaymentInitializedData;
use domain::{
    CreateRequest, InMemoryPaymentRepository, InMemoryWalletRepository, PaymentEvent,
    PaymentService, Status, WalletService,
};
use gateway::{Gateway, GatewayError};
use saga::{AuditService, HandlerSet, NotificationService, RecoveryService};
use tokio_util::sync::CancellationToken;

struct ScriptedGateway {
    script: Mutex<Vec<Result<String, GatewayError>>>,
}

impl ScriptedGateway {
    fn new(script: Vec<Result<String, GatewayError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
        })
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn charge(
        &self,
        _ctx: &CancellationToken,
        payment_id: &str,
        _amount: i64,
    ) -> Result<String, GatewayError> {
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Ok(format!("gw_{payment_id}"));
        }
        if script.len() == 1 {
            return script[0].clone();
        }
        script.remove(0)
    }
}

struct Fixture {
    bus: Arc<Bus<PaymentEvent>>,
    payment: Arc<PaymentService>,
    wallet: Arc<WalletService>,
    journal: Arc<journal::EventJournal>,
    ctx: CancellationToken,
}

fn fixture(gateway: Arc<dyn Gateway>) -> Fixture {
    let bus = Arc::new(Bus::with_config(BusConfig {
        shard_count: 4,
        ..BusConfig::default()
    }));
    let journal = Arc::new(journal::EventJournal::new());
    let payment = Arc::new(PaymentService::new(
        Arc::new(InMemoryPaymentRepository::new()),
        journal.clone(),
        bus.clone(),
    ));
    let wallet = Arc::new(WalletService::new(Arc::new(InMemoryWalletRepository::new())));

    saga::register_handlers(
        &bus,
        HandlerSet {
            payment: payment.clone(),
            wallet: wallet.clone(),
            gateway,
            journal: journal.clone(),
            recovery: Arc::new(RecoveryService::new()),
            audit: Arc::new(AuditService::new()),
            notifications: Arc::new(NotificationService::new()),
            recovery_delay: Duration::from_millis(10),
            sleep: None,
            mode: DeliveryMode::Queued,
        },
    );

    Fixture {
        bus,
        payment,
        wallet,
        journal,
        ctx: CancellationToken::new(),
    }
}

async fn start_payment(fixture: &Fixture, payment_id: &str, amount: i64) {
    fixture
        .payment
        .initialize(CreateRequest {
            payment_id: payment_id.into(),
            user_id: "u1".into(),
            amount,
            service: "internet".into(),
        })
        .await
        .unwrap();
    fixture
        .bus
        .publish(
            &fixture.ctx,
            PaymentEvent::PaymentInitialized(PaymentInitializedData {
                payment_id: payment_id.into(),
                user_id: "u1".into(),
                amount,
                service: "internet".into(),
                at: Utc::now(),
            }),
        )
        .await;
}

async fn await_terminal(fixture: &Fixture, payment_id: &str, deadline: Duration) -> Status {
    let start = tokio::time::Instant::now();
    loop {
        let payment = fixture.payment.get(payment_id).await.unwrap();
        if payment.status.is_terminal() {
            return payment.status;
        }
        assert!(
            start.elapsed() < deadline,
            "payment {payment_id} did not reach a terminal status"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn await_balance(fixture: &Fixture, user_id: &str, expected: i64, deadline: Duration) {
    let start = tokio::time::Instant::now();
    loop {
        if fixture.wallet.balance(user_id).await.unwrap() == expected {
            return;
        }
        assert!(
            start.elapsed() < deadline,
            "wallet {user_id} never reached balance {expected}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn happy_path_debits_and_succeeds() {
    let fixture = fixture(ScriptedGateway::new(Vec::new()));
    fixture.wallet.credit("u1", 20).await.unwrap();

    start_payment(&fixture, "p1", 10).await;

    let status = await_terminal(&fixture, "p1", Duration::from_secs(5)).await;
    assert_eq!(status, Status::Succeeded);

    let payment = fixture.payment.get("p1").await.unwrap();
    assert_eq!(payment.gateway_id.as_deref(), Some("gw_p1"));
    assert_eq!(fixture.wallet.balance("u1").await.unwrap(), 10);

    fixture.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn insufficient_funds_rejects_without_charging() {
    let fixture = fixture(ScriptedGateway::new(Vec::new()));

    start_payment(&fixture, "p2", 10).await;

    let status = await_terminal(&fixture, "p2", Duration::from_secs(5)).await;
    assert_eq!(status, Status::Rejected);

    let payment = fixture.payment.get("p2").await.unwrap();
    assert_eq!(payment.reason.as_deref(), Some("insufficient funds"));
    assert_eq!(fixture.wallet.balance("u1").await.unwrap(), 0);

    fixture.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn client_error_fails_and_refunds_the_wallet() {
    let fixture = fixture(ScriptedGateway::new(vec![Err(GatewayError::Client)]));
    fixture.wallet.credit("u1", 20).await.unwrap();

    start_payment(&fixture, "p3", 11).await;

    let status = await_terminal(&fixture, "p3", Duration::from_secs(5)).await;
    assert_eq!(status, Status::Failed);

    // Compensation restores the original balance.
    await_balance(&fixture, "u1", 20, Duration::from_secs(5)).await;

    fixture.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_retries_cross_recovery_then_fail() {
    let fixture = fixture(ScriptedGateway::new(vec![Err(GatewayError::Timeout)]));
    fixture.wallet.credit("u1", 100).await.unwrap();

    start_payment(&fixture, "p4", 5).await;

    // In-handler retries (1..5), DLQ + recovery at 5, one more attempt at
    // 6, then terminal failure and refund.
    let status = await_terminal(&fixture, "p4", Duration::from_secs(10)).await;
    assert_eq!(status, Status::Failed);
    await_balance(&fixture, "u1", 100, Duration::from_secs(5)).await;

    // The retry-exhaustion hand-over left a journal trace.
    let recovery: Vec<_> = fixture
        .journal
        .load("p4")
        .into_iter()
        .filter(|r| r.event_name == "recovery.requested")
        .collect();
    assert_eq!(recovery.len(), 1);
    let payload: serde_json::Value = serde_json::from_str(recovery[0].payload.get()).unwrap();
    assert_eq!(payload["action"], "payment.charge");
    assert_eq!(payload["attempts"], 5);

    fixture.bus.close().await;
}
