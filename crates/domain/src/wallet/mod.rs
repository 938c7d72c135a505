//! Wallet aggregate: balance repositories and the service enforcing the
//! non-negative-balance invariant through conditional debits.

mod repository;
mod service;

pub use repository::{
    FileWalletRepository, InMemoryWalletRepository, SqlWalletRepository, WalletRepository,
};
pub use service::{INSUFFICIENT_FUNDS, WalletService};
