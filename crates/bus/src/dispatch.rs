use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::event::{Event, Handler, HandlerError};

/// Errors reported by [`Bus::publish`], one entry per failed enqueue.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The bus is closing or closed; the delivery was dropped.
    #[error("bus is closed")]
    Closed,
}

/// Tuning knobs for the bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Number of shard workers. Defaults to host parallelism, floor 1.
    pub shard_count: usize,
    /// Bounded capacity of each shard queue.
    pub queue_capacity: usize,
    /// Initial retry back-off after a handler error.
    pub retry_backoff: Duration,
    /// Back-off cap; doubling stops here.
    pub retry_backoff_max: Duration,
    /// Abandon a delivery after this many attempts. 0 retries until the
    /// bus closes.
    pub max_attempts: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            shard_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            queue_capacity: 256,
            retry_backoff: Duration::from_millis(25),
            retry_backoff_max: Duration::from_secs(2),
            max_attempts: 0,
        }
    }
}

impl BusConfig {
    fn normalized(mut self) -> Self {
        if self.shard_count < 1 {
            self.shard_count = 1;
        }
        if self.queue_capacity < 1 {
            self.queue_capacity = 1;
        }
        if self.retry_backoff.is_zero() {
            self.retry_backoff = Duration::from_millis(25);
        }
        if self.retry_backoff_max.is_zero() {
            self.retry_backoff_max = Duration::from_secs(2);
        }
        self
    }
}

struct Delivery<E> {
    ctx: CancellationToken,
    event: E,
    handler: Handler<E>,
    handler_index: usize,
}

/// Sharded in-process event bus.
///
/// Must be constructed inside a Tokio runtime; each shard spawns one worker
/// task at construction.
pub struct Bus<E: Event> {
    handlers: RwLock<HashMap<&'static str, Vec<Handler<E>>>>,
    shards: Vec<mpsc::Sender<Delivery<E>>>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    cfg: BusConfig,
}

impl<E: Event> Bus<E> {
    /// Creates a bus with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Creates a bus with an explicit configuration.
    pub fn with_config(cfg: BusConfig) -> Self {
        let cfg = cfg.normalized();
        let shutdown = CancellationToken::new();

        let mut shards = Vec::with_capacity(cfg.shard_count);
        let mut workers = Vec::with_capacity(cfg.shard_count);
        for shard in 0..cfg.shard_count {
            let (tx, rx) = mpsc::channel(cfg.queue_capacity);
            shards.push(tx);
            workers.push(spawn_worker(shard, rx, shutdown.clone(), cfg.clone()));
        }

        Self {
            handlers: RwLock::new(HashMap::new()),
            shards,
            shutdown,
            workers: Mutex::new(workers),
            cfg,
        }
    }

    /// Registers a handler for an event name. Many handlers may subscribe
    /// to the same name; registration order is preserved.
    pub fn subscribe(&self, event_name: &'static str, handler: Handler<E>) {
        self.handlers
            .write()
            .unwrap()
            .entry(event_name)
            .or_default()
            .push(handler);
    }

    /// Returns the number of shard workers.
    pub fn shard_count(&self) -> usize {
        self.cfg.shard_count
    }

    /// Enqueues one delivery per subscriber of the event's name.
    ///
    /// The enqueue is non-blocking; on a full shard queue the call blocks
    /// until capacity frees up or the bus closes, in which case the
    /// delivery is dropped and a [`BusError::Closed`] is recorded for that
    /// handler. The returned vector is non-empty only for enqueue failures.
    pub async fn publish(&self, ctx: &CancellationToken, event: E) -> Vec<BusError> {
        let subscribed: Vec<Handler<E>> = {
            let table = self.handlers.read().unwrap();
            table.get(event.name()).cloned().unwrap_or_default()
        };

        let mut errors = Vec::new();
        for (handler_index, handler) in subscribed.into_iter().enumerate() {
            let shard = shard_for_key(&routing_key(&event), self.shards.len());
            let delivery = Delivery {
                ctx: ctx.clone(),
                event: event.clone(),
                handler,
                handler_index,
            };

            if self.shutdown.is_cancelled() {
                errors.push(BusError::Closed);
                continue;
            }

            match self.shards[shard].try_send(delivery) {
                Ok(()) => {}
                Err(TrySendError::Closed(_)) => errors.push(BusError::Closed),
                Err(TrySendError::Full(delivery)) => {
                    // Back-pressure: block until the shard drains or the
                    // bus starts closing.
                    tokio::select! {
                        _ = self.shutdown.cancelled() => errors.push(BusError::Closed),
                        sent = self.shards[shard].send(delivery) => {
                            if sent.is_err() {
                                errors.push(BusError::Closed);
                            }
                        }
                    }
                }
            }
        }
        errors
    }

    /// Signals the workers to stop and waits for the in-flight delivery of
    /// each shard to finish. Once this returns, no handler invocation
    /// begins. Pending queued deliveries are dropped.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().unwrap().drain(..).collect();
        for worker in workers {
            let _ = worker.await;
        }
    }
}

impl<E: Event> Default for Bus<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_worker<E: Event>(
    shard: usize,
    mut rx: mpsc::Receiver<Delivery<E>>,
    shutdown: CancellationToken,
    cfg: BusConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                next = rx.recv() => match next {
                    None => return,
                    Some(delivery) => process_delivery(shard, delivery, &shutdown, &cfg).await,
                },
            }
        }
    })
}

async fn process_delivery<E: Event>(
    shard: usize,
    delivery: Delivery<E>,
    shutdown: &CancellationToken,
    cfg: &BusConfig,
) {
    let mut attempt: u32 = 0;
    let mut backoff = cfg.retry_backoff;

    loop {
        attempt += 1;
        let error = match invoke(&delivery).await {
            Ok(()) => return,
            Err(error) => error,
        };
        tracing::warn!(
            shard,
            event = delivery.event.name(),
            handler_index = delivery.handler_index,
            attempt,
            %error,
            "handler error"
        );

        if cfg.max_attempts > 0 && attempt >= cfg.max_attempts {
            tracing::error!(
                shard,
                event = delivery.event.name(),
                handler_index = delivery.handler_index,
                attempts = attempt,
                "handler abandoned after max attempts"
            );
            return;
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(cfg.retry_backoff_max);
    }
}

/// Invokes the handler inside its own task so a panic unwinds the task,
/// not the shard worker. A panic surfaces as a retryable handler error.
async fn invoke<E: Event>(delivery: &Delivery<E>) -> Result<(), HandlerError> {
    let fut = (delivery.handler)(delivery.ctx.clone(), delivery.event.clone());
    match tokio::spawn(fut).await {
        Ok(result) => result,
        Err(join_error) if join_error.is_panic() => {
            tracing::error!(
                event = delivery.event.name(),
                handler_index = delivery.handler_index,
                "handler panicked"
            );
            Err("handler panicked".into())
        }
        Err(_) => Err("handler task cancelled".into()),
    }
}

fn routing_key<E: Event>(event: &E) -> String {
    let key = event.partition_key();
    if key.is_empty() {
        event.name().to_string()
    } else {
        key
    }
}

fn shard_for_key(key: &str, shards: usize) -> usize {
    if shards <= 1 {
        return 0;
    }
    (fnv1a_32(key) % shards as u32) as usize
}

/// FNV-1a, 32-bit.
fn fnv1a_32(key: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in key.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
