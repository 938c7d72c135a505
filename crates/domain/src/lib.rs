//! Domain model of the payment orchestrator: the event catalog, the
//! payment and wallet services with their repositories, and the capability
//! traits those services are injected with.

mod contracts;
pub mod events;
pub mod payment;
pub mod wallet;

pub use contracts::{Journal, Publisher};
pub use events::PaymentEvent;
pub use payment::{
    CreateRequest, InMemoryPaymentRepository, Payment, PaymentRepository, PaymentService,
    SqlPaymentRepository, Status,
};
pub use wallet::{
    FileWalletRepository, INSUFFICIENT_FUNDS, InMemoryWalletRepository, SqlWalletRepository,
    WalletRepository, WalletService,
};
