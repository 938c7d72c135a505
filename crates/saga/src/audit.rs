use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use common::{CoreError, Result};
use serde::Serialize;

/// Append-only audit trail.
///
/// Every record is logged; with a file configured it is also written as
/// one JSON object per line under a file mutex.
pub struct AuditService {
    sink: Mutex<Option<File>>,
}

#[derive(Serialize)]
struct AuditLine<'a> {
    at: chrono::DateTime<Utc>,
    event: &'a str,
    fields: &'a serde_json::Value,
}

impl AuditService {
    /// Log-only audit trail.
    pub fn new() -> Self {
        Self {
            sink: Mutex::new(None),
        }
    }

    /// Audit trail with a durable JSONL file.
    pub fn with_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|err| {
                CoreError::internal(format!("create audit dir {}", parent.display()))
                    .with_source(err)
            })?;
        }
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|err| {
                CoreError::internal(format!("open audit file {}", path.display())).with_source(err)
            })?;
        Ok(Self {
            sink: Mutex::new(Some(file)),
        })
    }

    /// Records one event occurrence. Sink failures are logged and
    /// swallowed; auditing never fails the caller.
    pub fn record(&self, event_name: &str, fields: serde_json::Value) {
        tracing::info!(event = event_name, %fields, "audit");

        let mut sink = self.sink.lock().unwrap();
        let Some(file) = sink.as_mut() else {
            return;
        };
        let line = AuditLine {
            at: Utc::now(),
            event: event_name,
            fields: &fields,
        };
        match serde_json::to_string(&line) {
            Ok(encoded) => {
                if let Err(error) = writeln!(file, "{encoded}") {
                    tracing::error!(event = event_name, %error, "audit write failed");
                }
            }
            Err(error) => {
                tracing::error!(event = event_name, %error, "audit encode failed");
            }
        }
    }
}

impl Default for AuditService {
    fn default() -> Self {
        Self::new()
    }
}
