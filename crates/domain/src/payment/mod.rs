//! Payment aggregate: model, repositories, and the event-emitting service.

mod model;
mod repository;
mod service;

pub use model::{CreateRequest, Payment, Status};
pub use repository::{InMemoryPaymentRepository, PaymentRepository, SqlPaymentRepository};
pub use service::PaymentService;
