//! HTTP surface and process wiring for the payment orchestrator.
//!
//! Builds the bus, services, projector, saga handlers, and health sampler
//! into a shared [`AppState`], and exposes them through a small Axum
//! router with structured logging and Prometheus metrics.

pub mod config;
pub mod error;
pub mod health;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use bus::{Bus, BusConfig, DeliveryMode};
use domain::events::names;
use domain::{
    PaymentEvent, PaymentRepository, PaymentService, WalletRepository, WalletService,
};
use gateway::Gateway;
use journal::EventJournal;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::Projector;
use saga::{AuditService, HandlerSet, NotificationService, RecoveryService};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use health::{CheckFn, HealthService};

/// Event names folded into the read model.
const PROJECTED_EVENTS: [&str; 9] = [
    names::PAYMENT_CREATED,
    names::PAYMENT_INITIALIZED,
    names::PAYMENT_PENDING,
    names::PAYMENT_REJECTED,
    names::PAYMENT_SUCCEEDED,
    names::PAYMENT_FAILED,
    names::WALLET_CREDITED,
    names::WALLET_DEBITED,
    names::WALLET_REFUNDED,
];

/// Deadline for the gateway health probe.
const GATEWAY_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Shared application state behind every route handler.
pub struct AppState {
    pub bus: Arc<Bus<PaymentEvent>>,
    pub journal: Arc<EventJournal>,
    pub payments: Arc<PaymentService>,
    pub wallets: Arc<WalletService>,
    pub projector: Arc<Projector>,
    pub health: Arc<HealthService>,
    /// Root cancellation context handed to publishes from request handlers.
    pub ctx: CancellationToken,
}

/// Everything [`build_state`] assembles the process from.
pub struct AppOptions {
    pub bus_config: BusConfig,
    pub journal: Arc<EventJournal>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub wallet_repo: Arc<dyn WalletRepository>,
    pub gateway: Arc<dyn Gateway>,
    pub audit: Arc<AuditService>,
    pub recovery_delay: Duration,
    pub delivery_mode: DeliveryMode,
    pub health_ttl: Duration,
}

impl AppOptions {
    /// In-memory wiring around the given gateway, used by tests and local
    /// experiments.
    pub fn in_memory(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            bus_config: BusConfig::default(),
            journal: Arc::new(EventJournal::new()),
            payment_repo: Arc::new(domain::InMemoryPaymentRepository::new()),
            wallet_repo: Arc::new(domain::InMemoryWalletRepository::new()),
            gateway,
            audit: Arc::new(AuditService::new()),
            recovery_delay: Duration::from_millis(100),
            delivery_mode: DeliveryMode::Queued,
            health_ttl: Duration::from_secs(2),
        }
    }
}

/// Builds the full processing pipeline: bus, services, saga handlers,
/// read model (replayed from the journal), and health probes.
pub async fn build_state(options: AppOptions) -> common::Result<Arc<AppState>> {
    let bus = Arc::new(Bus::with_config(options.bus_config));

    let payments = Arc::new(PaymentService::new(
        options.payment_repo,
        options.journal.clone(),
        bus.clone(),
    ));
    let wallets = Arc::new(WalletService::new(options.wallet_repo.clone()));

    let projector = Arc::new(Projector::new());
    projector.replay(&options.journal).await?;

    saga::register_handlers(
        &bus,
        HandlerSet {
            payment: payments.clone(),
            wallet: wallets.clone(),
            gateway: options.gateway.clone(),
            journal: options.journal.clone(),
            recovery: Arc::new(RecoveryService::new()),
            audit: options.audit,
            notifications: Arc::new(NotificationService::new()),
            recovery_delay: options.recovery_delay,
            sleep: None,
            mode: options.delivery_mode,
        },
    );

    for event_name in PROJECTED_EVENTS {
        let projector = projector.clone();
        bus.subscribe(
            event_name,
            bus::with_mode(
                options.delivery_mode,
                bus::handler(move |_ctx, event: PaymentEvent| {
                    let projector = projector.clone();
                    async move {
                        projector.apply(&event).await?;
                        Ok(())
                    }
                }),
            ),
        );
    }

    let health = Arc::new(HealthService::new(
        options.health_ttl,
        vec![
            ("db".to_string(), wallet_probe(options.wallet_repo)),
            ("gateway".to_string(), gateway_probe(options.gateway)),
        ],
    ));

    Ok(Arc::new(AppState {
        bus,
        journal: options.journal,
        payments,
        wallets,
        projector,
        health,
        ctx: CancellationToken::new(),
    }))
}

fn wallet_probe(repo: Arc<dyn WalletRepository>) -> CheckFn {
    Box::new(move || {
        let repo = repo.clone();
        Box::pin(async move {
            repo.get_balance("__healthcheck__")
                .await
                .map(|_| ())
                .map_err(|err| err.to_string())
        })
    })
}

fn gateway_probe(gateway: Arc<dyn Gateway>) -> CheckFn {
    Box::new(move || {
        let gateway = gateway.clone();
        Box::pin(async move {
            let ctx = CancellationToken::new();
            let deadline = {
                let token = ctx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(GATEWAY_PROBE_TIMEOUT).await;
                    token.cancel();
                })
            };
            let result = gateway.charge(&ctx, "__healthcheck__", 1).await;
            deadline.abort();
            result.map(|_| ()).map_err(|err| err.to_string())
        })
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/payments", post(routes::payments::create))
        .route("/payments/{id}", get(routes::payments::get))
        .route("/wallet/credit", post(routes::wallet::credit))
        .route("/wallet/{user_id}", get(routes::wallet::balance))
        .route("/health", get(routes::health::check))
        .with_state(state)
        .merge(metrics_router)
        .layer(DefaultBodyLimit::max(1 << 20))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
