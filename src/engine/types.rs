use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::inventory::InventoryDiff;
use crate::ops::{InvalidRequest, OpKind, OperationRequest};

/// Monotonically assigned task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Queued→Running is the only entry into execution; Running→terminal are the
/// only exits. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::TimedOut
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::TimedOut => "timed out",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task ended in `Failed`, distinguishable so front ends can render
/// "docker not available" differently from "command failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The external command ran and exited nonzero (or died to a signal).
    CommandFailed,
    /// The docker binary/daemon could not be reached at all.
    EnvironmentUnavailable,
    /// Terminated on operator request.
    Cancelled,
}

/// Read-only view of one supervised operation. The supervisor owns the live
/// record; front ends only ever see clones.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub request: OperationRequest,
    pub target: String,
    pub state: TaskState,
    /// Tail of the combined stdout/stderr stream.
    pub output: String,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureKind>,
    pub reason: Option<String>,
    pub duration: Option<Duration>,
}

impl Task {
    pub fn kind(&self) -> OpKind {
        self.request.kind
    }
}

/// Transient notification fanned out to subscribers. History that must
/// survive lives in the durable log sink, not here.
#[derive(Debug, Clone)]
pub enum StatusEvent {
    TaskStarted {
        id: TaskId,
        kind: OpKind,
        target: String,
    },
    TaskOutput {
        id: TaskId,
        line: String,
    },
    TaskFinished(Box<Task>),
    InventoryChanged(InventoryDiff),
    PollError(String),
}

/// Synchronous submit-time rejections. No task is created for these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),
    #[error("a {kind} task for `{target}` is already running")]
    Conflict { kind: OpKind, target: String },
}
