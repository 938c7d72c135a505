use domain::PaymentEvent;

/// Dead-letter sink for events that exhausted their retry budget.
///
/// A DLQ record is a structured log line plus a counter bump, capturing
/// the abandoned event for operator inspection.
pub struct RecoveryService;

impl RecoveryService {
    pub fn new() -> Self {
        Self
    }

    pub fn send_to_dlq(&self, topic: &str, reason: &str, payload: &PaymentEvent) {
        let payload_json =
            serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);
        tracing::error!(topic, reason, payload = %payload_json, "dlq");
        metrics::counter!("dlq_records_total").increment(1);
    }
}

impl Default for RecoveryService {
    fn default() -> Self {
        Self::new()
    }
}
