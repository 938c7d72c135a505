//! Read models built by folding the event stream.
//!
//! The projector maintains the current payment and wallet views. The same
//! pure apply functions serve the online path (events from the bus) and
//! the offline path (journal records decoded by event name), so a replay
//! of the journal yields exactly the state the online fold produced.

mod projector;

pub use projector::{PaymentView, Projector, WalletView};
