//! Append-only event journal.
//!
//! Keeps a per-aggregate stream and a parallel global log in memory, and
//! optionally mirrors every append as one JSON object per line to a
//! durable sink file. On open, an existing sink is replayed back into
//! memory so the in-process state survives restarts.

mod record;
mod store;

pub use record::JournalRecord;
pub use store::EventJournal;
