use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::warn;

#[derive(Debug, Serialize)]
struct InvocationRecord<'a> {
    function: &'a str,
    args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: String,
}

/// Append-only JSON-lines record of probe and check invocations.
#[derive(Clone)]
pub struct InvocationLog {
    file: Arc<Mutex<File>>,
}

impl InvocationLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Writes one record. Failures are logged and otherwise ignored.
    pub fn record(&self, function: &str, args: Value, outcome: Result<Value, String>) {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(err) => (None, Some(err)),
        };
        let record = InvocationRecord {
            function,
            args,
            result,
            error,
            timestamp: humantime::format_rfc3339_millis(SystemTime::now()).to_string(),
        };
        if let Err(err) = self.write(&record) {
            warn!(function, error = %err, "failed to write invocation record");
        }
    }

    fn write(&self, record: &InvocationRecord<'_>) -> io::Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "invocation log lock poisoned"))?;
        writeln!(file, "{line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appends_one_json_object_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("invocations.jsonl");
        let log = InvocationLog::open(&path).expect("open log");

        log.record("run_command", json!({"command": "uptime"}), Ok(json!("up 3 days")));
        log.record("memory", json!({}), Err("no MemTotal".to_string()));

        let text = std::fs::read_to_string(&path).expect("read log");
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("valid json"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["function"], "run_command");
        assert_eq!(lines[0]["result"], "up 3 days");
        assert!(lines[0].get("error").is_none());
        assert_eq!(lines[1]["error"], "no MemTotal");
        assert!(lines[1]["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("invocations.jsonl");
        InvocationLog::open(&path)
            .expect("open")
            .record("a", json!({}), Ok(json!(true)));
        InvocationLog::open(&path)
            .expect("reopen")
            .record("b", json!({}), Ok(json!(false)));
        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text.lines().count(), 2);
    }
}
