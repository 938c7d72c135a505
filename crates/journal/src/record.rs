use chrono::{DateTime, Utc};
use serde_json::value::RawValue;

/// One journaled event occurrence.
///
/// The payload is kept as the raw event JSON so that replaying consumers
/// decode it by `event_name` without the journal knowing the catalog.
#[derive(Debug, Clone)]
pub struct JournalRecord {
    /// The aggregate stream this record belongs to.
    pub aggregate_id: String,
    /// The event's stable public name.
    pub event_name: String,
    /// Raw event JSON as emitted at append time.
    pub payload: Box<RawValue>,
    /// When the event was appended, UTC.
    pub occurred_at: DateTime<Utc>,
}
