//! Append-only JSONL event log for operator-auditable actions.
//!
//! One JSON object per line: `{ts, level, event, ...data}`. Every record is
//! also forwarded to `tracing` so it shows up in the regular log stream.

use chrono::{DateTime, Duration, Utc};
use postcrew_core::Result;
use postcrew_store::DocumentLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    pub event: String,
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    pub fn emit(&self, level: Level, event: &str, data: serde_json::Value) -> Result<()> {
        self.emit_at(Utc::now(), level, event, data)
    }

    pub fn info(&self, event: &str, data: serde_json::Value) -> Result<()> {
        self.emit(Level::Info, event, data)
    }

    pub fn warn(&self, event: &str, data: serde_json::Value) -> Result<()> {
        self.emit(Level::Warn, event, data)
    }

    pub fn error(&self, event: &str, data: serde_json::Value) -> Result<()> {
        self.emit(Level::Error, event, data)
    }

    /// Append with an explicit timestamp.
    pub fn emit_at(
        &self,
        ts: DateTime<Utc>,
        level: Level,
        event: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let data = match data {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        let entry = LogEvent { ts, level, event: event.to_string(), data };
        let line = serde_json::to_string(&entry)?;

        match level {
            Level::Info => tracing::info!(event, "{line}"),
            Level::Warn => tracing::warn!(event, "{line}"),
            Level::Error => tracing::error!(event, "{line}"),
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _lock = DocumentLock::acquire(&self.lock_path())?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Every parsable record, in file order. Unparsable lines are skipped.
    pub fn read_all(&self) -> Result<Vec<LogEvent>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }

    /// Drop records older than `retention`. Lines that cannot be parsed are
    /// kept. Returns the number of records dropped.
    pub fn purge_older_than(&self, retention: Duration, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - retention;
        let _lock = DocumentLock::acquire(&self.lock_path())?;
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut kept = String::with_capacity(text.len());
        let mut dropped = 0;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<LogEvent>(line) {
                Ok(ev) if ev.ts < cutoff => dropped += 1,
                _ => {
                    kept.push_str(line);
                    kept.push('\n');
                }
            }
        }
        if dropped == 0 {
            return Ok(0);
        }

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(kept.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn records_are_flat_json_lines() {
        let tmp = TempDir::new().unwrap();
        let log = EventLog::new(tmp.path().join("events.jsonl"));
        log.info("agent_healed", json!({"agent": "reviewer"})).unwrap();
        log.warn("agent_stale", json!({"agent": "publisher", "hours": 50})).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["event"], "agent_healed");
        assert_eq!(first["level"], "info");
        assert_eq!(first["agent"], "reviewer");

        let all = log.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].level, Level::Warn);
        assert_eq!(all[1].data["hours"], 50);
    }

    #[test]
    fn scalar_data_is_wrapped() {
        let tmp = TempDir::new().unwrap();
        let log = EventLog::new(tmp.path().join("events.jsonl"));
        log.error("generation_failed", json!("timeout")).unwrap();
        assert_eq!(log.read_all().unwrap()[0].data["value"], "timeout");
    }

    #[test]
    fn purge_drops_only_old_records() {
        let tmp = TempDir::new().unwrap();
        let log = EventLog::new(tmp.path().join("events.jsonl"));
        let now = Utc::now();
        log.emit_at(now - Duration::days(40), Level::Info, "old", json!({})).unwrap();
        log.emit_at(now - Duration::days(29), Level::Info, "recent", json!({})).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .unwrap()
            .write_all(b"not json\n")
            .unwrap();

        assert_eq!(log.purge_older_than(Duration::days(30), now).unwrap(), 1);
        let text = fs::read_to_string(log.path()).unwrap();
        assert!(!text.contains("\"old\""));
        assert!(text.contains("\"recent\""));
        assert!(text.contains("not json"));
        assert_eq!(log.purge_older_than(Duration::days(30), now).unwrap(), 0);
    }

    #[test]
    fn missing_log_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let log = EventLog::new(tmp.path().join("nope.jsonl"));
        assert!(log.read_all().unwrap().is_empty());
        assert_eq!(log.purge_older_than(Duration::days(30), Utc::now()).unwrap(), 0);
    }
}
