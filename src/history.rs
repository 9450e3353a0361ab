//! Durable log sink: one structured record per task completion and per
//! significant poll event, in a dated file (`dockhand_YYYYMMDD.log`).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::engine::{Task, TaskId};
use crate::ops::OpKind;

#[derive(Serialize)]
struct TaskRecord<'a> {
    ts: String,
    event: &'static str,
    id: TaskId,
    kind: OpKind,
    target: &'a str,
    state: &'a str,
    exit_code: Option<i32>,
    duration_ms: Option<u64>,
    reason: Option<&'a str>,
}

#[derive(Serialize)]
struct PollRecord<'a> {
    ts: String,
    event: &'static str,
    error: &'a str,
}

pub struct HistoryLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl HistoryLog {
    /// Open (or create) today's log file under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(format!("dockhand_{}.log", Local::now().format("%Y%m%d")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open history log {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_task(&self, task: &Task) {
        let record = TaskRecord {
            ts: timestamp(),
            event: "task",
            id: task.id,
            kind: task.kind(),
            target: &task.target,
            state: task.state.as_str(),
            exit_code: task.exit_code,
            duration_ms: task.duration.map(|d| d.as_millis() as u64),
            reason: task.reason.as_deref(),
        };
        self.append(&record);
    }

    pub fn record_poll_error(&self, error: &str) {
        let record = PollRecord {
            ts: timestamp(),
            event: "poll_error",
            error,
        };
        self.append(&record);
    }

    fn append<T: Serialize>(&self, record: &T) {
        let Ok(line) = serde_json::to_string(record) else {
            return;
        };
        if let Ok(mut file) = self.file.lock()
            && let Err(e) = writeln!(file, "{line}")
        {
            tracing::warn!(error = %e, "failed to append history record");
        }
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaskState;
    use crate::ops::OperationRequest;
    use std::time::Duration;

    fn finished_task() -> Task {
        let mut request = OperationRequest::new(OpKind::Build);
        request.image = Some("demo".into());
        request.tag = Some("v1".into());
        request.context = Some(".".into());
        Task {
            id: TaskId(7),
            request,
            target: "demo:v1".into(),
            state: TaskState::Succeeded,
            output: String::new(),
            exit_code: Some(0),
            failure: None,
            reason: None,
            duration: Some(Duration::from_millis(1250)),
        }
    }

    #[test]
    fn task_records_are_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::open(dir.path()).unwrap();
        log.record_task(&finished_task());
        log.record_poll_error("daemon unreachable");

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let task: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(task["event"], "task");
        assert_eq!(task["kind"], "build");
        assert_eq!(task["target"], "demo:v1");
        assert_eq!(task["state"], "succeeded");
        assert_eq!(task["duration_ms"], 1250);

        let poll: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(poll["event"], "poll_error");
    }

    #[test]
    fn filename_carries_the_date() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::open(dir.path()).unwrap();
        let name = log.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("dockhand_"));
        assert!(name.ends_with(".log"));
    }
}
