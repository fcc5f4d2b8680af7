use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only continuity log (`events.jsonl`).
///
/// - default fields are `type`, `session_id`, `ts`
/// - `scene_id` is added when the event concerns one scene
/// - caller payload is merged last and can override defaults
/// - one compact JSON object per line
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

#[derive(Debug)]
struct EventLogInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventLogInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(
        &self,
        event_type: &str,
        scene_id: Option<&str>,
        payload: EventPayload,
    ) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        if let Some(scene_id) = scene_id {
            event.insert("scene_id".to_string(), Value::String(scene_id.to_string()));
        }
        for (key, value) in payload {
            event.insert(key, value);
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

/// Emits to an optional log. A failed write is reported on stderr and never
/// changes a continuity verdict.
pub fn emit_best_effort(
    log: Option<&EventLog>,
    event_type: &str,
    scene_id: Option<&str>,
    payload: EventPayload,
) -> bool {
    let Some(log) = log else {
        return false;
    };
    match log.emit(event_type, scene_id, payload) {
        Ok(_) => true,
        Err(err) => {
            eprintln!(
                "raccord: event {event_type} not written to {}: {err:#}",
                log.path().display()
            );
            false
        }
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = EventLog::new(&path, "session-1");

        let mut payload = EventPayload::new();
        payload.insert("insights".to_string(), Value::from(2));
        let emitted = log.emit("raccord_analyzed", Some("s2"), payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String("raccord_analyzed".to_string()));
        assert_eq!(parsed["session_id"], Value::String("session-1".to_string()));
        assert_eq!(parsed["scene_id"], Value::String("s2".to_string()));
        assert_eq!(parsed["insights"], Value::from(2));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn scene_id_is_omitted_when_absent() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = EventLog::new(temp.path().join("events.jsonl"), "session-1");
        let emitted = log.emit("retry_decided", None, EventPayload::new())?;
        assert!(emitted.get("scene_id").is_none());
        Ok(())
    }

    #[test]
    fn emit_appends_lines_and_creates_parent() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let log = EventLog::new(&path, "session-1");

        log.emit("one", None, EventPayload::new())?;
        assert!(emit_best_effort(Some(&log), "two", Some("s1"), EventPayload::new()));
        assert!(!emit_best_effort(None, "three", None, EventPayload::new()));

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: Value = serde_json::from_str(lines[1])?;
        assert_eq!(second["type"], Value::String("two".to_string()));
        Ok(())
    }

    #[test]
    fn best_effort_reports_unwritable_log_without_failing() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"not a directory")?;
        let log = EventLog::new(blocker.join("events.jsonl"), "session-1");

        assert!(log.emit("one", None, EventPayload::new()).is_err());
        assert!(!emit_best_effort(Some(&log), "two", None, EventPayload::new()));
        Ok(())
    }
}
