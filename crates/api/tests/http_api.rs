//! End-to-end tests for the HTTP surface, driving the full pipeline
//! (router → services → bus → saga → projector) in memory.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::{AppOptions, AppState, build_state, create_app};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::CoreError;
use gateway::{CircuitBreaker, CircuitBreakerConfig, FakeGateway, Gateway, GatewayError};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

/// Gateway that always charges successfully, in the fake's id format.
struct SucceedingGateway;

#[async_trait]
impl Gateway for SucceedingGateway {
    async fn charge(
        &self,
        _ctx: &CancellationToken,
        payment_id: &str,
        _amount: i64,
    ) -> Result<String, GatewayError> {
        Ok(format!("gw_{payment_id}"))
    }
}

/// Wallet repository that is hard down, for the readiness path.
struct BrokenWalletRepository;

#[async_trait]
impl domain::WalletRepository for BrokenWalletRepository {
    async fn get_balance(&self, _user_id: &str) -> common::Result<i64> {
        Err(CoreError::internal("wallet backend down"))
    }

    async fn set_balance(&self, _user_id: &str, _amount: i64) -> common::Result<()> {
        Err(CoreError::internal("wallet backend down"))
    }

    async fn debit_if_sufficient_funds(&self, _user_id: &str, _amount: i64) -> common::Result<()> {
        Err(CoreError::internal("wallet backend down"))
    }
}

async fn setup_with(gateway: Arc<dyn Gateway>) -> (Router, Arc<AppState>) {
    let state = build_state(AppOptions::in_memory(gateway))
        .await
        .expect("state");
    let app = create_app(state.clone(), metrics_handle());
    (app, state)
}

async fn setup_fake() -> (Router, Arc<AppState>) {
    let gateway = Arc::new(CircuitBreaker::new(
        Arc::new(FakeGateway::new()),
        CircuitBreakerConfig::default(),
    ));
    setup_with(gateway).await
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(value) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

/// Polls GET on `uri` until `done` accepts the body.
async fn await_view(
    app: &Router,
    uri: &str,
    deadline: Duration,
    done: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    let start = tokio::time::Instant::now();
    loop {
        let (status, body) = send(app, "GET", uri, None).await;
        if status == StatusCode::OK && done(&body) {
            return body;
        }
        assert!(
            start.elapsed() < deadline,
            "view at {uri} never converged, last body: {body}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn terminal(body: &serde_json::Value) -> bool {
    matches!(
        body["status"].as_str(),
        Some("succeeded") | Some("rejected") | Some("failed")
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn happy_path_converges_to_succeeded() {
    let (app, state) = setup_with(Arc::new(SucceedingGateway)).await;

    let (status, _) = send(
        &app,
        "POST",
        "/wallet/credit",
        Some(serde_json::json!({"user_id": "u1", "amount": 20})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        &app,
        "POST",
        "/payments",
        Some(serde_json::json!({
            "payment_id": "p1", "user_id": "u1", "amount": 10, "service": "internet"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["payment_id"], "p1");
    assert_eq!(body["status"], "initialized");

    let view = await_view(&app, "/payments/p1", Duration::from_secs(5), terminal).await;
    assert_eq!(view["status"], "succeeded");
    assert_eq!(view["gateway_id"], "gw_p1");

    let wallet = await_view(&app, "/wallet/u1", Duration::from_secs(5), |body| {
        body["balance"] == 10
    })
    .await;
    assert_eq!(wallet["user_id"], "u1");

    state.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn insufficient_funds_rejects_the_payment() {
    let (app, state) = setup_with(Arc::new(SucceedingGateway)).await;

    let (status, _) = send(
        &app,
        "POST",
        "/payments",
        Some(serde_json::json!({
            "payment_id": "p2", "user_id": "u2", "amount": 10, "service": "internet"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let view = await_view(&app, "/payments/p2", Duration::from_secs(5), terminal).await;
    assert_eq!(view["status"], "rejected");
    assert_eq!(view["reason"], "insufficient funds");

    let (_, wallet) = send(&app, "GET", "/wallet/u2", None).await;
    assert_eq!(wallet["balance"], 0);

    state.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn gateway_client_error_fails_and_refunds() {
    let (app, state) = setup_fake().await;

    send(
        &app,
        "POST",
        "/wallet/credit",
        Some(serde_json::json!({"user_id": "u3", "amount": 20})),
    )
    .await;

    // 11 classifies as a 4xx in the fake gateway.
    let (status, _) = send(
        &app,
        "POST",
        "/payments",
        Some(serde_json::json!({
            "payment_id": "p3", "user_id": "u3", "amount": 11, "service": "internet"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let view = await_view(&app, "/payments/p3", Duration::from_secs(5), terminal).await;
    assert_eq!(view["status"], "failed");

    // The refund restores the original balance.
    await_view(&app, "/wallet/u3", Duration::from_secs(5), |body| {
        body["balance"] == 20
    })
    .await;

    state.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_bodies_are_rejected() {
    let (app, state) = setup_with(Arc::new(SucceedingGateway)).await;

    // Not JSON at all.
    let request = Request::builder()
        .method("POST")
        .uri("/payments")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown fields.
    let (status, _) = send(
        &app,
        "POST",
        "/payments",
        Some(serde_json::json!({
            "payment_id": "p9", "user_id": "u9", "amount": 1,
            "service": "internet", "extra": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Structurally valid but semantically invalid.
    let (status, _) = send(
        &app,
        "POST",
        "/payments",
        Some(serde_json::json!({
            "payment_id": "p9", "user_id": "u9", "amount": 0, "service": "internet"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/wallet/credit",
        Some(serde_json::json!({"user_id": "", "amount": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    state.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_payment_is_not_found() {
    let (app, state) = setup_with(Arc::new(SucceedingGateway)).await;
    let (status, _) = send(&app, "GET", "/payments/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    state.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_wallet_reads_zero_balance() {
    let (app, state) = setup_with(Arc::new(SucceedingGateway)).await;
    let (status, body) = send(&app, "GET", "/wallet/nobody", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 0);
    state.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_probe_status() {
    let (app, state) = setup_with(Arc::new(SucceedingGateway)).await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["checks"]["db"], "ok");
    assert_eq!(body["checks"]["gateway"], "ok");
    state.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn create_refuses_work_when_a_probe_is_down() {
    let mut options = AppOptions::in_memory(Arc::new(SucceedingGateway));
    options.wallet_repo = Arc::new(BrokenWalletRepository);
    let state = build_state(options).await.expect("state");
    let app = create_app(state.clone(), metrics_handle());

    let (status, body) = send(
        &app,
        "POST",
        "/payments",
        Some(serde_json::json!({
            "payment_id": "p5", "user_id": "u5", "amount": 3, "service": "internet"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "down");
    assert_eq!(body["checks"]["db"], "wallet backend down");

    state.bus.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn metrics_endpoint_renders() {
    let (app, state) = setup_with(Arc::new(SucceedingGateway)).await;
    let request = Request::builder()
        .method("GET")
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    state.bus.close().await;
}
