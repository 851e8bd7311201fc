//! Append-only JSONL transcript file.
//!
//! Every record is the event payload plus `type`, `timestamp` and the
//! `run` id of the process that wrote it, so transcripts of several runs can
//! share one file.

use chorus_application::{ConversationEvent, ConversationLogger};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Transcript logger writing one JSON object per line.
pub struct JsonlConversationLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    run: String,
}

impl JsonlConversationLogger {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            run: chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identifier stamped on every record of this process.
    pub fn run(&self) -> &str {
        &self.run
    }

    fn record(&self, event: ConversationEvent) -> Value {
        let mut record = match event.payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        record.insert("type".to_string(), Value::from(event.event_type));
        record.insert(
            "timestamp".to_string(),
            Value::from(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        );
        record.insert("run".to_string(), Value::from(self.run.as_str()));
        Value::Object(record)
    }
}

impl ConversationLogger for JsonlConversationLogger {
    fn log(&self, event: ConversationEvent) {
        let event_type = event.event_type;
        let line = match serde_json::to_string(&self.record(event)) {
            Ok(line) => line,
            Err(e) => {
                warn!(event_type, error = %e, "unserializable conversation event");
                return;
            }
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        // Flush per line so a crash loses at most the record being written
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!(path = %self.path.display(), error = %e, "conversation log write failed");
        }
    }
}

impl Drop for JsonlConversationLogger {
    fn drop(&mut self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_record_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.jsonl");
        let logger = JsonlConversationLogger::open(&path).unwrap();

        logger.log(ConversationEvent::new(
            "command_accepted",
            json!({"peer": "gpt-4o", "command": "start"}),
        ));
        logger.log(ConversationEvent::new(
            "message_finalized",
            json!({"peer": "gpt-4o", "body": "Hello there"}),
        ));
        let run = logger.run().to_string();
        drop(logger);

        let records = read_lines(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["type"], "command_accepted");
        assert_eq!(records[0]["command"], "start");
        assert_eq!(records[1]["type"], "message_finalized");
        assert_eq!(records[1]["body"], "Hello there");
        for record in &records {
            assert!(record["timestamp"].is_string());
            assert_eq!(record["run"], run.as_str());
        }
    }

    #[test]
    fn test_appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("transcript.jsonl");

        for _ in 0..2 {
            let logger = JsonlConversationLogger::open(&path).unwrap();
            logger.log(ConversationEvent::new("session_started", json!({"peer": "a"})));
        }

        assert_eq!(read_lines(&path).len(), 2);
    }

    #[test]
    fn test_non_object_payload_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.jsonl");
        let logger = JsonlConversationLogger::open(&path).unwrap();

        logger.log(ConversationEvent::new("stream_failed", json!("reset")));
        drop(logger);

        let records = read_lines(&path);
        assert_eq!(records[0]["type"], "stream_failed");
        assert_eq!(records[0]["data"], "reset");
    }

    #[test]
    fn test_open_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        assert!(JsonlConversationLogger::open(blocker.join("log.jsonl")).is_err());
    }
}
