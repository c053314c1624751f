use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::Result;

pub type EventPayload = Map<String, Value>;

/// Structured progress log for one session.
///
/// Every event is an object with `type`, `session_id` and `ts`, followed by
/// the caller payload. Reserved keys in the payload are ignored. Events are
/// kept in memory so a shell can render progress, and are appended as one
/// compact JSON line each to `events.jsonl` when a path is configured.
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

#[derive(Debug)]
struct EventLogInner {
    path: Option<PathBuf>,
    session_id: String,
    history: Mutex<Vec<Value>>,
}

const RESERVED_KEYS: [&str; 3] = ["type", "session_id", "ts"];

impl EventLog {
    /// In-memory log; nothing touches the filesystem.
    pub fn in_memory(session_id: impl Into<String>) -> Self {
        Self::build(None, session_id.into())
    }

    pub fn with_file(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self::build(Some(path.into()), session_id.into())
    }

    pub fn new_session_id() -> String {
        format!("session-{}", uuid::Uuid::new_v4().simple())
    }

    fn build(path: Option<PathBuf>, session_id: String) -> Self {
        Self {
            inner: Arc::new(EventLogInner {
                path,
                session_id,
                history: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            event.insert(key, value);
        }
        let event = Value::Object(event);

        // History is kept even when the file append fails.
        let mut history = self.history();
        history.push(event.clone());
        if let Some(path) = &self.inner.path {
            append_line(path, &event)?;
        }
        Ok(event)
    }

    /// Best-effort [`EventLog::emit`] for progress events: a log write
    /// failure must never replace the outcome of the action being logged.
    pub fn record(&self, event_type: &str, payload: EventPayload) {
        let _ = self.emit(event_type, payload);
    }

    fn history(&self) -> MutexGuard<'_, Vec<Value>> {
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every event emitted so far, oldest first.
    pub fn events(&self) -> Vec<Value> {
        self.history().clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| event.get("type").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

fn append_line(path: &Path, event: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(event)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
