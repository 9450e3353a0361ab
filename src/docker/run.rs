use std::io::BufRead;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use super::types::{CancelToken, OutputLine, ProcessCommand, RunResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period between asking a process to stop and force-killing it.
const TERM_GRACE: Duration = Duration::from_secs(2);

/// Spawn a process and return a channel that streams its output.
///
/// The caller receives [`OutputLine::Stdout`]/[`Stderr`] as they arrive,
/// followed by exactly one [`OutputLine::Done`] carrying the final result.
/// The child is terminated (and always waited on) when the deadline passes
/// or the cancel token fires; no orphan is left behind.
pub fn spawn(cmd: ProcessCommand, cancel: CancelToken) -> Result<Receiver<OutputLine>> {
    let mut child = Command::new(&cmd.program)
        .args(&cmd.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn `{}`", cmd.program))?;

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        supervise(child, stdout, stderr, tx, cancel, cmd.deadline);
    });

    Ok(rx)
}

fn supervise(
    mut child: Child,
    stdout: std::process::ChildStdout,
    stderr: std::process::ChildStderr,
    tx: Sender<OutputLine>,
    cancel: CancelToken,
    deadline: Duration,
) {
    // Accumulates all output for the final result.
    let log_buf = std::sync::Arc::new(std::sync::Mutex::new(String::new()));

    // --- reader threads ----------------------------------------------------
    let tx_out = tx.clone();
    let buf_out = log_buf.clone();
    let stdout_handle = std::thread::spawn(move || {
        let reader = std::io::BufReader::new(stdout);
        for line in reader.lines() {
            match line {
                Ok(l) => {
                    if let Ok(mut buf) = buf_out.lock() {
                        buf.push_str(&l);
                        buf.push('\n');
                    }
                    // Receiver may be dropped — ignore send errors.
                    let _ = tx_out.send(OutputLine::Stdout(l));
                }
                Err(_) => break,
            }
        }
    });

    let tx_err = tx.clone();
    let buf_err = log_buf.clone();
    let stderr_handle = std::thread::spawn(move || {
        let reader = std::io::BufReader::new(stderr);
        for line in reader.lines() {
            match line {
                Ok(l) => {
                    if let Ok(mut buf) = buf_err.lock() {
                        buf.push_str(&l);
                        buf.push('\n');
                    }
                    let _ = tx_err.send(OutputLine::Stderr(l));
                }
                Err(_) => break,
            }
        }
    });

    // --- wait-or-deadline loop ----------------------------------------------
    let start = Instant::now();
    let mut cancelled = false;
    let mut timed_out = false;

    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(_) => break None,
        }

        if cancel.is_cancelled() {
            cancelled = true;
            break terminate(&mut child);
        }

        if start.elapsed() > deadline {
            timed_out = true;
            break terminate(&mut child);
        }

        std::thread::sleep(POLL_INTERVAL);
    };

    // --- finalize ------------------------------------------------------------
    let _ = stdout_handle.join();
    let _ = stderr_handle.join();

    let exit_code = exit_status.and_then(|s| s.code());
    let log = log_buf.lock().map(|b| b.clone()).unwrap_or_default();

    let _ = tx.send(OutputLine::Done(RunResult {
        exit_code,
        timed_out,
        cancelled,
        log,
    }));
}

/// Stop a child: polite signal first, grace period, then hard kill.
/// Always reaps the process before returning.
fn terminate(child: &mut Child) -> Option<std::process::ExitStatus> {
    #[cfg(unix)]
    {
        // SAFETY: kill() with a valid pid and SIGTERM has no memory effects.
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }
        let waited = Instant::now();
        while waited.elapsed() < TERM_GRACE {
            if let Ok(Some(status)) = child.try_wait() {
                return Some(status);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    let _ = child.kill();
    child.wait().ok()
}
