//! Shared error taxonomy for the payment orchestrator.
//!
//! Every fallible operation in the workspace surfaces a [`CoreError`]
//! carrying one of four sentinel [`ErrorKind`]s, so callers can
//! pattern-match by kind without knowing which layer produced the error.

mod error;

pub use error::{CoreError, ErrorKind, Result};
