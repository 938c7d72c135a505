use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// An event that can be published on the bus.
///
/// `name` is the stable, externally visible event name handlers subscribe
/// to. `partition_key` selects the ordering group: all events returning the
/// same key are delivered through the same shard worker, in publish order.
/// An empty key falls back to the event name.
pub trait Event: Clone + Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn partition_key(&self) -> String;
}

/// Error returned by a handler invocation.
///
/// The bus never inspects the error beyond logging it; classification is
/// the handler's responsibility. Any error triggers the worker retry loop.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The boxed future produced by one handler invocation.
pub type HandlerFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// A subscribed handler: a callable from (cancellation context, event) to a
/// completion future.
pub type Handler<E> = Arc<dyn Fn(CancellationToken, E) -> HandlerFuture + Send + Sync>;

/// Wraps an async function or closure into a boxed [`Handler`].
pub fn handler<E, F, Fut>(f: F) -> Handler<E>
where
    E: Event,
    F: Fn(CancellationToken, E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |ctx, event| Box::pin(f(ctx, event)))
}

/// How a subscription's deliveries reach the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Run the handler on the shard worker. Preserves per-key ordering and
    /// the worker's retry-with-back-off loop. This is the default.
    #[default]
    Queued,
    /// Fire-and-forget: dispatch into a fresh background task and report
    /// success immediately. An at-most-once degradation that loses the
    /// bus's retry and ordering guarantees; failures are only logged.
    Detached,
}

/// Wraps a handler so each delivery is dispatched into its own task.
///
/// The spawned task runs under a fresh cancellation token, detached from
/// the publisher's context, mirroring the fire-and-forget semantics of
/// [`DeliveryMode::Detached`].
pub fn detached<E: Event>(inner: Handler<E>) -> Handler<E> {
    Arc::new(move |_ctx, event: E| {
        let inner = inner.clone();
        Box::pin(async move {
            let name = event.name();
            tokio::spawn(async move {
                if let Err(error) = (inner)(CancellationToken::new(), event).await {
                    tracing::error!(event = name, %error, "detached handler failed");
                }
            });
            Ok(())
        })
    })
}

/// Applies a delivery mode to a handler.
pub fn with_mode<E: Event>(mode: DeliveryMode, handler: Handler<E>) -> Handler<E> {
    match mode {
        DeliveryMode::Queued => handler,
        DeliveryMode::Detached => detached(handler),
    }
}
