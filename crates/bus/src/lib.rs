//! Sharded in-process event bus.
//!
//! Deliveries are partitioned by key onto a fixed set of shard workers, so
//! all events sharing a partition key are serialized through one worker
//! while different keys run in parallel. Queues are bounded; a full shard
//! exerts back-pressure on publishers. Handler failures are retried with
//! exponential back-off and handler panics are isolated from the worker.

mod dispatch;
mod event;

pub use dispatch::{Bus, BusConfig, BusError};
pub use event::{
    DeliveryMode, Event, Handler, HandlerError, HandlerFuture, detached, handler, with_mode,
};
