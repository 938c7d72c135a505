use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{Gateway, GatewayError};

/// Deterministic stand-in for a real payment gateway.
///
/// The amount selects the outcome: multiples of 5 time out after 300 ms,
/// multiples of 11 fail with a client error, multiples of 7 with a server
/// error, anything else succeeds as `gw_<payment_id>` after the nominal
/// latency. Every wait races the cancellation context.
#[derive(Debug, Default)]
pub struct FakeGateway;

impl FakeGateway {
    pub fn new() -> Self {
        Self
    }

    async fn wait(ctx: &CancellationToken, latency: Duration) -> Result<(), GatewayError> {
        tokio::select! {
            _ = ctx.cancelled() => Err(GatewayError::DeadlineExceeded),
            _ = tokio::time::sleep(latency) => Ok(()),
        }
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn charge(
        &self,
        ctx: &CancellationToken,
        payment_id: &str,
        amount: i64,
    ) -> Result<String, GatewayError> {
        if amount % 5 == 0 {
            Self::wait(ctx, Duration::from_millis(300)).await?;
            return Err(GatewayError::Timeout);
        }
        if amount % 11 == 0 {
            Self::wait(ctx, Duration::from_millis(50)).await?;
            return Err(GatewayError::Client);
        }
        if amount % 7 == 0 {
            Self::wait(ctx, Duration::from_millis(50)).await?;
            return Err(GatewayError::Server);
        }
        Self::wait(ctx, Duration::from_millis(50)).await?;
        Ok(format!("gw_{payment_id}"))
    }
}
