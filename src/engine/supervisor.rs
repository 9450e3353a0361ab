use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::docker::{self, CancelToken, OutputLine, ProcessCommand, RunResult};
use crate::history::HistoryLog;
use crate::ops::{OpKind, OperationRequest, translate};

use super::bus::{EventBus, Subscription};
use super::types::{FailureKind, StatusEvent, SubmitError, Task, TaskId, TaskState};

/// Cap on the per-task output buffer; only the tail is kept.
const OUTPUT_TAIL_LIMIT: usize = 64 * 1024;

/// Seam between the supervisor and the process runner, so tests can
/// substitute a stub for the docker binary.
pub trait Launcher: Send + Sync + 'static {
    fn launch(&self, cmd: ProcessCommand, cancel: CancelToken) -> Result<Receiver<OutputLine>>;
}

/// Production launcher: hands the command to the process runner as-is.
pub struct DockerLauncher;

impl Launcher for DockerLauncher {
    fn launch(&self, cmd: ProcessCommand, cancel: CancelToken) -> Result<Receiver<OutputLine>> {
        docker::spawn(cmd, cancel)
    }
}

struct TaskEntry {
    task: Task,
    cancel: CancelToken,
}

struct Inner {
    launcher: Box<dyn Launcher>,
    program: String,
    default_deadline: Duration,
    bus: EventBus,
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
    /// The (kind, target) pairs currently executing. This is the lock that
    /// upholds the at-most-one-concurrent-task-per-target invariant.
    running: Mutex<HashMap<(OpKind, String), TaskId>>,
    next_id: AtomicU64,
    history: Option<Arc<HistoryLog>>,
}

/// Owns the lifecycle of every submitted operation: translates it, runs it
/// under a deadline, classifies the outcome, and emits lifecycle events.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(
        program: impl Into<String>,
        default_deadline: Duration,
        history: Option<Arc<HistoryLog>>,
    ) -> Self {
        Self::with_launcher(Box::new(DockerLauncher), program, default_deadline, history)
    }

    pub fn with_launcher(
        launcher: Box<dyn Launcher>,
        program: impl Into<String>,
        default_deadline: Duration,
        history: Option<Arc<HistoryLog>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                launcher,
                program: program.into(),
                default_deadline,
                bus: EventBus::new(),
                tasks: Mutex::new(HashMap::new()),
                running: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                history,
            }),
        }
    }

    pub fn bus(&self) -> EventBus {
        self.inner.bus.clone()
    }

    pub fn subscribe(&self) -> Subscription {
        self.inner.bus.subscribe()
    }

    /// Validate and start one operation.
    ///
    /// `InvalidRequest` and `Conflict` are rejected here, synchronously,
    /// without creating a task. On success the task runs on its own thread
    /// and reports through the bus.
    pub fn submit(&self, request: OperationRequest) -> Result<TaskId, SubmitError> {
        let plan = translate(&request)?;
        let key = (request.kind, plan.target.clone());

        let id = {
            let mut running = lock(&self.inner.running);
            if running.contains_key(&key) {
                return Err(SubmitError::Conflict {
                    kind: request.kind,
                    target: plan.target,
                });
            }
            let id = TaskId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
            running.insert(key, id);
            id
        };

        let cancel = CancelToken::new();
        let task = Task {
            id,
            target: plan.target.clone(),
            request: request.clone(),
            state: TaskState::Queued,
            output: String::new(),
            exit_code: None,
            failure: None,
            reason: None,
            duration: None,
        };
        lock(&self.inner.tasks).insert(
            id,
            TaskEntry {
                task,
                cancel: cancel.clone(),
            },
        );

        let inner = self.inner.clone();
        std::thread::spawn(move || run_task(inner, id, request, plan.args, plan.target, cancel));
        Ok(id)
    }

    /// Best-effort cancellation. A task that is already terminal is
    /// unaffected; one still running has its process terminated.
    pub fn cancel(&self, id: TaskId) {
        if let Some(entry) = lock(&self.inner.tasks).get(&id)
            && !entry.task.state.is_terminal()
        {
            entry.cancel.cancel();
        }
    }

    /// Read-only snapshot of a task.
    pub fn get(&self, id: TaskId) -> Option<Task> {
        lock(&self.inner.tasks).get(&id).map(|e| e.task.clone())
    }
}

struct Verdict {
    state: TaskState,
    failure: Option<FailureKind>,
    reason: Option<String>,
    exit_code: Option<i32>,
}

fn run_task(
    inner: Arc<Inner>,
    id: TaskId,
    request: OperationRequest,
    args: Vec<String>,
    target: String,
    cancel: CancelToken,
) {
    let kind = request.kind;
    let deadline = request.deadline.unwrap_or(inner.default_deadline);

    if let Some(entry) = lock(&inner.tasks).get_mut(&id) {
        entry.task.state = TaskState::Running;
    }
    inner.bus.publish(StatusEvent::TaskStarted {
        id,
        kind,
        target: target.clone(),
    });
    tracing::info!(task = %id, %kind, %target, "task started");

    let started = Instant::now();
    let verdict = if cancel.is_cancelled() {
        // Cancelled while still queued: never launch the process.
        Verdict {
            state: TaskState::Failed,
            failure: Some(FailureKind::Cancelled),
            reason: Some("cancelled before start".into()),
            exit_code: None,
        }
    } else {
        let cmd = ProcessCommand {
            program: inner.program.clone(),
            args,
            deadline,
        };
        match inner.launcher.launch(cmd, cancel) {
            Err(e) => Verdict {
                state: TaskState::Failed,
                failure: Some(FailureKind::EnvironmentUnavailable),
                reason: Some(format!("docker not available: {e:#}")),
                exit_code: None,
            },
            Ok(rx) => stream_output(&inner, id, rx),
        }
    };
    let duration = started.elapsed();

    let snapshot = {
        let mut tasks = lock(&inner.tasks);
        let Some(entry) = tasks.get_mut(&id) else {
            return;
        };
        entry.task.state = verdict.state;
        entry.task.failure = verdict.failure;
        entry.task.reason = verdict.reason;
        entry.task.exit_code = verdict.exit_code;
        entry.task.duration = Some(duration);
        entry.task.clone()
    };

    // Clear the exclusion slot before announcing completion, so a subscriber
    // reacting to TaskFinished can resubmit the same target immediately.
    lock(&inner.running).remove(&(kind, target.clone()));

    tracing::info!(
        task = %id,
        %kind,
        %target,
        state = %snapshot.state,
        duration_ms = duration.as_millis() as u64,
        "task finished"
    );
    if let Some(history) = &inner.history {
        history.record_task(&snapshot);
    }
    inner.bus.publish(StatusEvent::TaskFinished(Box::new(snapshot)));
}

/// Forward streamed output to the bus and the task buffer until the runner
/// reports the final result.
fn stream_output(inner: &Inner, id: TaskId, rx: Receiver<OutputLine>) -> Verdict {
    for line in rx {
        match line {
            OutputLine::Stdout(l) | OutputLine::Stderr(l) => {
                if let Some(entry) = lock(&inner.tasks).get_mut(&id) {
                    push_tail(&mut entry.task.output, &l);
                }
                inner.bus.publish(StatusEvent::TaskOutput { id, line: l });
            }
            OutputLine::Done(result) => return classify(result),
        }
    }
    Verdict {
        state: TaskState::Failed,
        failure: Some(FailureKind::CommandFailed),
        reason: Some("output stream ended unexpectedly".into()),
        exit_code: None,
    }
}

fn classify(result: RunResult) -> Verdict {
    if result.timed_out {
        Verdict {
            state: TaskState::TimedOut,
            failure: None,
            reason: Some("deadline exceeded, process terminated".into()),
            exit_code: result.exit_code,
        }
    } else if result.cancelled {
        Verdict {
            state: TaskState::Failed,
            failure: Some(FailureKind::Cancelled),
            reason: Some("cancelled by operator".into()),
            exit_code: result.exit_code,
        }
    } else {
        match result.exit_code {
            Some(0) => Verdict {
                state: TaskState::Succeeded,
                failure: None,
                reason: None,
                exit_code: Some(0),
            },
            Some(code) => Verdict {
                state: TaskState::Failed,
                failure: Some(FailureKind::CommandFailed),
                reason: Some(format!("command exited with status {code}")),
                exit_code: Some(code),
            },
            None => Verdict {
                state: TaskState::Failed,
                failure: Some(FailureKind::CommandFailed),
                reason: Some("process terminated by a signal".into()),
                exit_code: None,
            },
        }
    }
}

/// Append a line, keeping only the newest `OUTPUT_TAIL_LIMIT` bytes and
/// trimming on line boundaries.
fn push_tail(buf: &mut String, line: &str) {
    buf.push_str(line);
    buf.push('\n');
    if buf.len() > OUTPUT_TAIL_LIMIT {
        let overflow = buf.len() - OUTPUT_TAIL_LIMIT;
        let cut = buf[overflow..]
            .find('\n')
            .map(|i| overflow + i + 1)
            .unwrap_or(overflow);
        buf.drain(..cut);
    }
}

/// A poisoned lock means a worker panicked mid-update; keep serving the
/// remaining tasks rather than cascading the panic.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    /// Launcher that plays back scripted lines, waits (cancellably), then
    /// reports a fixed result.
    struct StubLauncher {
        lines: Vec<String>,
        result: RunResult,
        delay: Duration,
    }

    impl StubLauncher {
        fn exit(code: i32) -> Self {
            Self {
                lines: Vec::new(),
                result: RunResult {
                    exit_code: Some(code),
                    timed_out: false,
                    cancelled: false,
                    log: String::new(),
                },
                delay: Duration::ZERO,
            }
        }

        fn lines(mut self, lines: &[&str]) -> Self {
            self.lines = lines.iter().map(|s| s.to_string()).collect();
            self
        }

        fn delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl Launcher for StubLauncher {
        fn launch(&self, _cmd: ProcessCommand, cancel: CancelToken) -> Result<Receiver<OutputLine>> {
            let (tx, rx) = mpsc::channel();
            let lines = self.lines.clone();
            let mut result = self.result.clone();
            let delay = self.delay;
            std::thread::spawn(move || {
                for line in lines {
                    let _ = tx.send(OutputLine::Stdout(line));
                }
                let start = Instant::now();
                while start.elapsed() < delay {
                    if cancel.is_cancelled() {
                        result.cancelled = true;
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                let _ = tx.send(OutputLine::Done(result));
            });
            Ok(rx)
        }
    }

    struct NoBinaryLauncher;

    impl Launcher for NoBinaryLauncher {
        fn launch(&self, _cmd: ProcessCommand, _cancel: CancelToken) -> Result<Receiver<OutputLine>> {
            anyhow::bail!("no such binary: docker")
        }
    }

    fn supervisor(launcher: impl Launcher) -> Supervisor {
        Supervisor::with_launcher(
            Box::new(launcher),
            "docker",
            Duration::from_secs(60),
            None,
        )
    }

    fn build_request(tag: &str) -> OperationRequest {
        let mut req = OperationRequest::new(OpKind::Build);
        req.image = Some("demo".into());
        req.tag = Some(tag.into());
        req.context = Some("./ctx".into());
        req
    }

    fn wait_finished(sub: &Subscription, id: TaskId) -> Task {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            match sub.recv_timeout(Duration::from_millis(100)) {
                Some(StatusEvent::TaskFinished(task)) if task.id == id => return *task,
                _ => {}
            }
        }
        panic!("task {id} never finished");
    }

    #[test]
    fn success_emits_started_output_finished_in_order() {
        let sup = supervisor(StubLauncher::exit(0).lines(&["step 1", "step 2"]));
        let sub = sup.subscribe();
        let id = sup.submit(build_request("v1")).unwrap();

        let mut saw_started = false;
        let mut output = Vec::new();
        loop {
            match sub.recv_timeout(Duration::from_secs(5)).expect("event") {
                StatusEvent::TaskStarted { id: ev_id, .. } => {
                    assert_eq!(ev_id, id);
                    assert!(output.is_empty(), "output before TaskStarted");
                    saw_started = true;
                }
                StatusEvent::TaskOutput { line, .. } => {
                    assert!(saw_started, "output before TaskStarted");
                    output.push(line);
                }
                StatusEvent::TaskFinished(task) => {
                    assert!(saw_started);
                    assert_eq!(task.state, TaskState::Succeeded);
                    assert_eq!(task.exit_code, Some(0));
                    break;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(output, vec!["step 1", "step 2"]);
        assert_eq!(sup.get(id).unwrap().state, TaskState::Succeeded);
        assert!(sup.get(id).unwrap().output.contains("step 1\n"));
    }

    #[test]
    fn invalid_request_creates_no_task() {
        let sup = supervisor(StubLauncher::exit(0));
        let err = sup
            .submit(OperationRequest::new(OpKind::Remove))
            .unwrap_err();
        assert!(matches!(err, SubmitError::InvalidRequest(_)));
        assert!(sup.get(TaskId(1)).is_none());
    }

    #[test]
    fn duplicate_in_flight_target_conflicts() {
        let sup = supervisor(StubLauncher::exit(0).delay(Duration::from_millis(300)));
        let sub = sup.subscribe();
        let first = sup.submit(build_request("v1")).unwrap();

        let err = sup.submit(build_request("v1")).unwrap_err();
        assert!(matches!(err, SubmitError::Conflict { .. }));

        // Once the first reaches a terminal state, the target is free again.
        wait_finished(&sub, first);
        assert!(sup.submit(build_request("v1")).is_ok());
    }

    #[test]
    fn distinct_targets_run_concurrently() {
        let sup = supervisor(StubLauncher::exit(0).delay(Duration::from_millis(200)));
        let sub = sup.subscribe();
        let a = sup.submit(build_request("v1")).unwrap();
        let b = sup.submit(build_request("v2")).unwrap();
        assert_ne!(a, b);
        assert_eq!(wait_finished(&sub, a).state, TaskState::Succeeded);
        assert_eq!(wait_finished(&sub, b).state, TaskState::Succeeded);
    }

    #[test]
    fn nonzero_exit_is_a_command_failure() {
        let sup = supervisor(StubLauncher::exit(2).lines(&["boom"]));
        let sub = sup.subscribe();
        let id = sup.submit(build_request("v1")).unwrap();
        let task = wait_finished(&sub, id);
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.failure, Some(FailureKind::CommandFailed));
        assert_eq!(task.exit_code, Some(2));
        assert!(task.reason.unwrap().contains('2'));
    }

    #[test]
    fn spawn_failure_is_environment_unavailable() {
        let sup = supervisor(NoBinaryLauncher);
        let sub = sup.subscribe();
        let id = sup.submit(build_request("v1")).unwrap();
        let task = wait_finished(&sub, id);
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.failure, Some(FailureKind::EnvironmentUnavailable));
        assert!(task.reason.unwrap().contains("docker not available"));
    }

    #[test]
    fn cancel_terminates_a_running_task() {
        let sup = supervisor(StubLauncher::exit(0).delay(Duration::from_secs(30)));
        let sub = sup.subscribe();
        let id = sup.submit(build_request("v1")).unwrap();

        // Wait until it is actually running before cancelling.
        loop {
            if let Some(StatusEvent::TaskStarted { .. }) =
                sub.recv_timeout(Duration::from_secs(5))
            {
                break;
            }
        }
        sup.cancel(id);
        let task = wait_finished(&sub, id);
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.failure, Some(FailureKind::Cancelled));
    }

    #[test]
    fn cancel_after_terminal_state_is_a_no_op() {
        let sup = supervisor(StubLauncher::exit(0));
        let sub = sup.subscribe();
        let id = sup.submit(build_request("v1")).unwrap();
        let task = wait_finished(&sub, id);
        assert_eq!(task.state, TaskState::Succeeded);
        sup.cancel(id);
        assert_eq!(sup.get(id).unwrap().state, TaskState::Succeeded);
    }

    #[test]
    fn task_ids_are_monotonic() {
        let sup = supervisor(StubLauncher::exit(0));
        let a = sup.submit(build_request("v1")).unwrap();
        let b = sup.submit(build_request("v2")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn push_tail_keeps_only_the_newest_bytes() {
        let mut buf = String::new();
        let line = "x".repeat(1024);
        for _ in 0..100 {
            push_tail(&mut buf, &line);
        }
        assert!(buf.len() <= OUTPUT_TAIL_LIMIT);
        assert!(buf.ends_with(&format!("{line}\n")));
        // Trimming happens on line boundaries.
        assert!(buf.starts_with('x'));
    }
}
