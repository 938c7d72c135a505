//! External payment gateway boundary: the `Gateway` capability trait, the
//! circuit breaker wrapping it, and the deterministic fake used in
//! development and tests.

mod breaker;
mod fake;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use fake::FakeGateway;

/// Classified gateway failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway timeout")]
    Timeout,
    #[error("gateway 5xx")]
    Server,
    #[error("gateway 4xx")]
    Client,
    #[error("circuit open")]
    CircuitOpen,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl GatewayError {
    /// Whether a retry may succeed: timeouts, server errors, and exceeded
    /// deadlines are transient; client errors are not. `CircuitOpen` is
    /// handled by callers separately.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout | GatewayError::Server | GatewayError::DeadlineExceeded
        )
    }
}

/// Charge capability of an external payment gateway.
///
/// On success, returns the gateway-assigned charge id. Implementations
/// must honour the cancellation context and return
/// [`GatewayError::DeadlineExceeded`] when it fires mid-call.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn charge(
        &self,
        ctx: &CancellationToken,
        payment_id: &str,
        amount: i64,
    ) -> Result<String, GatewayError>;
}
