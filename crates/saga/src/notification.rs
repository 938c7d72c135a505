/// User-facing notification sink, log-backed.
pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        Self
    }

    pub fn notify(&self, user_id: &str, message: &str) {
        tracing::info!(user_id, message, "notify");
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}
