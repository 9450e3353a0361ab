use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Wall-clock limit applied when a request does not override it.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Cooperative cancellation token backed by an `AtomicBool`.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// One external-process invocation. `args` is the full argument list passed
/// to `program`; the translator layer is responsible for assembling it.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub deadline: Duration,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

/// Final outcome of one process run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub cancelled: bool,
    pub log: String,
}

impl RunResult {
    pub fn success(&self) -> bool {
        !self.timed_out && !self.cancelled && self.exit_code == Some(0)
    }
}

/// Streamed output from a running process.
#[derive(Debug)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
    Done(RunResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_token_transitions_once() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        // Idempotent — calling again is fine.
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_token_is_visible_across_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn run_result_success_requires_exit_zero() {
        let ok = RunResult {
            exit_code: Some(0),
            timed_out: false,
            cancelled: false,
            log: String::new(),
        };
        assert!(ok.success());

        let failed = RunResult {
            exit_code: Some(2),
            ..ok.clone()
        };
        assert!(!failed.success());

        let timed_out = RunResult {
            timed_out: true,
            ..ok.clone()
        };
        assert!(!timed_out.success());
    }
}
