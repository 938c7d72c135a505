//! Process configuration loaded from environment variables.

use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `8080`)
/// - `CONSUMER_NAME` — name reported for the handler group (default: `"consumers"`)
/// - `JOURNAL_PATH` — durable event journal (default: `"./out/journal.jsonl"`)
/// - `WALLET_PATH` — wallet balance file (default: `"./out/wallets.json"`)
/// - `AUDIT_PATH` — audit trail file (default: `"./out/audit.jsonl"`)
/// - `RECOVERY_DELAY_MS` — recovery replay delay (default: `60000`)
/// - `DATABASE_URL` — PostgreSQL connection string (default: unset, uses file/in-memory stores)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub consumer_name: String,
    pub journal_path: String,
    pub wallet_path: String,
    pub audit_path: String,
    pub recovery_delay: Duration,
    pub database_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            consumer_name: std::env::var("CONSUMER_NAME")
                .ok()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "consumers".to_string()),
            journal_path: std::env::var("JOURNAL_PATH")
                .unwrap_or_else(|_| "./out/journal.jsonl".to_string()),
            wallet_path: std::env::var("WALLET_PATH")
                .unwrap_or_else(|_| "./out/wallets.json".to_string()),
            audit_path: std::env::var("AUDIT_PATH")
                .unwrap_or_else(|_| "./out/audit.jsonl".to_string()),
            recovery_delay: Duration::from_millis(
                std::env::var("RECOVERY_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60_000),
            ),
            database_url: std::env::var("DATABASE_URL").ok(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            consumer_name: "consumers".to_string(),
            journal_path: "./out/journal.jsonl".to_string(),
            wallet_path: "./out/wallets.json".to_string(),
            audit_path: "./out/audit.jsonl".to_string(),
            recovery_delay: Duration::from_secs(60),
            database_url: None,
        }
    }
}
