//! Server entry point: storage, gateway, pipeline, HTTP.

use std::sync::Arc;

use api::config::Config;
use api::{AppOptions, build_state, create_app};
use bus::{BusConfig, DeliveryMode};
use domain::{PaymentRepository, WalletRepository};
use gateway::{CircuitBreaker, CircuitBreakerConfig, FakeGateway};
use journal::EventJournal;
use saga::AuditService;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let cfg = Config::from_env();

    let journal =
        Arc::new(EventJournal::with_file(&cfg.journal_path).expect("failed to open journal"));
    let audit =
        Arc::new(AuditService::with_file(&cfg.audit_path).expect("failed to open audit trail"));

    let (payment_repo, wallet_repo): (Arc<dyn PaymentRepository>, Arc<dyn WalletRepository>) =
        match &cfg.database_url {
            Some(url) => {
                let pool = sqlx::PgPool::connect(url)
                    .await
                    .expect("failed to connect to database");
                tracing::info!("using PostgreSQL repositories");
                (
                    Arc::new(domain::SqlPaymentRepository::new(pool.clone())),
                    Arc::new(domain::SqlWalletRepository::new(pool)),
                )
            }
            None => (
                Arc::new(domain::InMemoryPaymentRepository::new()),
                Arc::new(
                    domain::FileWalletRepository::new(&cfg.wallet_path)
                        .expect("failed to open wallet store"),
                ),
            ),
        };

    let gateway = Arc::new(CircuitBreaker::new(
        Arc::new(FakeGateway::new()),
        CircuitBreakerConfig::default(),
    ));

    let state = build_state(AppOptions {
        bus_config: BusConfig::default(),
        journal,
        payment_repo,
        wallet_repo,
        gateway,
        audit,
        recovery_delay: cfg.recovery_delay,
        delivery_mode: DeliveryMode::Queued,
        health_ttl: std::time::Duration::from_secs(2),
    })
    .await
    .expect("failed to build application state");

    tracing::info!(
        consumer = %cfg.consumer_name,
        shards = state.bus.shard_count(),
        "handlers registered"
    );

    let app = create_app(state.clone(), metrics_handle);

    let addr = cfg.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Drain in-flight deliveries before exiting.
    state.bus.close().await;
    tracing::info!("server shut down gracefully");
}
