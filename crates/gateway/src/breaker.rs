use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{Gateway, GatewayError};

/// Circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive classified failures in `closed` before opening.
    pub failure_threshold: u32,
    /// Consecutive probe successes in `half-open` before closing.
    pub success_threshold: u32,
    /// How long an open circuit rejects before admitting a probe.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            open_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Counters {
    state: State,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
    half_in_flight: bool,
}

type Classifier = Box<dyn Fn(&GatewayError) -> bool + Send + Sync>;

/// Wraps a gateway with a closed / open / half-open circuit.
///
/// The state mutex is held only around the transition bookkeeping, never
/// across the inner call. While half-open, exactly one probe call is in
/// flight; concurrent callers are rejected with `CircuitOpen`.
pub struct CircuitBreaker {
    inner: Arc<dyn Gateway>,
    cfg: CircuitBreakerConfig,
    is_failure: Classifier,
    counters: Mutex<Counters>,
}

impl CircuitBreaker {
    /// Wraps `inner` with the default classifier: timeouts, 5xx, and
    /// exceeded deadlines count as failures; 4xx does not.
    pub fn new(inner: Arc<dyn Gateway>, cfg: CircuitBreakerConfig) -> Self {
        Self::with_classifier(inner, cfg, Box::new(GatewayError::retryable))
    }

    /// Wraps `inner` with a custom failure classifier.
    pub fn with_classifier(
        inner: Arc<dyn Gateway>,
        cfg: CircuitBreakerConfig,
        is_failure: Classifier,
    ) -> Self {
        let cfg = CircuitBreakerConfig {
            failure_threshold: cfg.failure_threshold.max(1),
            success_threshold: cfg.success_threshold.max(1),
            open_timeout: if cfg.open_timeout.is_zero() {
                Duration::from_secs(2)
            } else {
                cfg.open_timeout
            },
        };
        Self {
            inner,
            cfg,
            is_failure,
            counters: Mutex::new(Counters {
                state: State::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
                half_in_flight: false,
            }),
        }
    }

    fn before_call(&self) -> Result<(), GatewayError> {
        let mut counters = self.counters.lock().unwrap();
        match counters.state {
            State::Closed => Ok(()),
            State::Open => {
                let elapsed = counters
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed < self.cfg.open_timeout {
                    return Err(GatewayError::CircuitOpen);
                }
                tracing::info!("circuit half-open, admitting probe");
                counters.state = State::HalfOpen;
                counters.successes = 0;
                counters.half_in_flight = true;
                Ok(())
            }
            State::HalfOpen => {
                if counters.half_in_flight {
                    return Err(GatewayError::CircuitOpen);
                }
                counters.half_in_flight = true;
                Ok(())
            }
        }
    }

    fn after_call(&self, error: Option<&GatewayError>) {
        let mut counters = self.counters.lock().unwrap();
        if counters.state == State::HalfOpen {
            counters.half_in_flight = false;
        }

        let Some(error) = error else {
            match counters.state {
                State::Closed => counters.failures = 0,
                State::HalfOpen => {
                    counters.successes += 1;
                    if counters.successes >= self.cfg.success_threshold {
                        tracing::info!("circuit closed after successful probe");
                        counters.state = State::Closed;
                        counters.failures = 0;
                        counters.successes = 0;
                        counters.opened_at = None;
                    }
                }
                State::Open => {}
            }
            return;
        };

        if !(self.is_failure)(error) {
            return;
        }

        match counters.state {
            State::Closed => {
                counters.failures += 1;
                if counters.failures >= self.cfg.failure_threshold {
                    tracing::warn!(failures = counters.failures, "circuit opened");
                    counters.state = State::Open;
                    counters.opened_at = Some(Instant::now());
                    counters.successes = 0;
                    counters.half_in_flight = false;
                }
            }
            State::HalfOpen => {
                tracing::warn!("probe failed, circuit re-opened");
                counters.state = State::Open;
                counters.opened_at = Some(Instant::now());
                counters.failures = self.cfg.failure_threshold;
                counters.successes = 0;
                counters.half_in_flight = false;
            }
            State::Open => {}
        }
    }
}

#[async_trait]
impl Gateway for CircuitBreaker {
    async fn charge(
        &self,
        ctx: &CancellationToken,
        payment_id: &str,
        amount: i64,
    ) -> Result<String, GatewayError> {
        self.before_call()?;
        let result = self.inner.charge(ctx, payment_id, amount).await;
        self.after_call(result.as_ref().err());
        result
    }
}
