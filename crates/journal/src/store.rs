use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use common::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::record::JournalRecord;

#[derive(Default)]
#[derive(Debug)]
struct Streams {
    per_aggregate: HashMap<String, Vec<JournalRecord>>,
    log: Vec<JournalRecord>,
}

/// Append-only journal with per-aggregate streams and a global log.
///
/// A single mutex guards the in-memory structures; the durable sink has
/// its own mutex so in-memory readers are never blocked by file I/O.
#[derive(Debug)]
pub struct EventJournal {
    streams: Mutex<Streams>,
    sink: Mutex<Option<File>>,
}

#[derive(Serialize)]
struct SinkLineRef<'a> {
    aggregate_id: &'a str,
    event_name: &'a str,
    payload: &'a RawValue,
    occurred_at: &'a DateTime<Utc>,
}

#[derive(Deserialize)]
struct SinkLine {
    aggregate_id: String,
    event_name: String,
    payload: Box<RawValue>,
    occurred_at: DateTime<Utc>,
}

impl EventJournal {
    /// Creates an in-memory journal without a durable sink.
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(Streams::default()),
            sink: Mutex::new(None),
        }
    }

    /// Opens a journal backed by a JSONL sink file.
    ///
    /// Every existing line is replayed into memory (blank lines skipped),
    /// then the file is positioned at its end for subsequent appends.
    pub fn with_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|err| {
                CoreError::internal(format!("create journal dir {}", parent.display()))
                    .with_source(err)
            })?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|err| {
                CoreError::internal(format!("open journal {}", path.display())).with_source(err)
            })?;

        let journal = Self::new();
        journal.replay_from_sink(&file, path)?;

        file.seek(SeekFrom::End(0)).map_err(|err| {
            CoreError::internal(format!("seek journal {}", path.display())).with_source(err)
        })?;
        *journal.sink.lock().unwrap() = Some(file);
        Ok(journal)
    }

    fn replay_from_sink(&self, file: &File, path: &Path) -> Result<()> {
        let reader = BufReader::new(file);
        let mut streams = self.streams.lock().unwrap();
        for line in reader.lines() {
            let line = line.map_err(|err| {
                CoreError::internal(format!("read journal {}", path.display())).with_source(err)
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: SinkLine = serde_json::from_str(&line).map_err(|err| {
                CoreError::internal(format!("decode journal line in {}", path.display()))
                    .with_source(err)
            })?;
            let record = JournalRecord {
                aggregate_id: parsed.aggregate_id,
                event_name: parsed.event_name,
                payload: parsed.payload,
                occurred_at: parsed.occurred_at,
            };
            streams
                .per_aggregate
                .entry(record.aggregate_id.clone())
                .or_default()
                .push(record.clone());
            streams.log.push(record);
        }
        Ok(())
    }

    /// Appends an event to the aggregate's stream and the global log, then
    /// mirrors it to the sink if one is configured. A sink write failure
    /// is logged but does not fail the append.
    pub fn append<E>(&self, aggregate_id: &str, event: &E) -> Result<()>
    where
        E: bus::Event + Serialize,
    {
        let payload = serde_json::to_string(event)
            .map_err(|err| CoreError::internal("encode event payload").with_source(err))?;
        let payload = RawValue::from_string(payload)
            .map_err(|err| CoreError::internal("encode event payload").with_source(err))?;

        let record = JournalRecord {
            aggregate_id: aggregate_id.to_string(),
            event_name: event.name().to_string(),
            payload,
            occurred_at: Utc::now(),
        };

        {
            let mut streams = self.streams.lock().unwrap();
            streams
                .per_aggregate
                .entry(record.aggregate_id.clone())
                .or_default()
                .push(record.clone());
            streams.log.push(record.clone());
        }

        let mut sink = self.sink.lock().unwrap();
        if let Some(file) = sink.as_mut() {
            let line = SinkLineRef {
                aggregate_id: &record.aggregate_id,
                event_name: &record.event_name,
                payload: &record.payload,
                occurred_at: &record.occurred_at,
            };
            match serde_json::to_string(&line) {
                Ok(encoded) => {
                    if let Err(error) = writeln!(file, "{encoded}") {
                        tracing::error!(
                            aggregate_id,
                            event = record.event_name,
                            %error,
                            "journal sink write failed"
                        );
                    }
                }
                Err(error) => {
                    tracing::error!(
                        aggregate_id,
                        event = record.event_name,
                        %error,
                        "journal sink encode failed"
                    );
                }
            }
        }
        Ok(())
    }

    /// Returns a snapshot copy of one aggregate's stream, in append order.
    pub fn load(&self, aggregate_id: &str) -> Vec<JournalRecord> {
        let streams = self.streams.lock().unwrap();
        streams
            .per_aggregate
            .get(aggregate_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns a snapshot copy of the global log, in append order.
    pub fn all(&self) -> Vec<JournalRecord> {
        self.streams.lock().unwrap().log.clone()
    }
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new()
    }
}
