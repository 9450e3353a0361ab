use std::process::Command;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::docker::CancelToken;
use crate::engine::{EventBus, StatusEvent};
use crate::history::HistoryLog;

use super::parse::{IMAGES_FORMAT, PS_FORMAT, parse_containers, parse_images};
use super::types::{InventorySnapshot, diff};

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Query the current container/image inventory through the docker CLI.
pub fn query_snapshot(program: &str) -> Result<InventorySnapshot> {
    let ps = run_query(program, &["ps", "-a", "--format", PS_FORMAT])?;
    let images = run_query(program, &["images", "--format", IMAGES_FORMAT])?;
    Ok(InventorySnapshot {
        containers: parse_containers(&ps),
        images: parse_images(&images),
    })
}

fn run_query(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to invoke `{program} {}`", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "`{program} {}` exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Background inventory poller.
///
/// Each tick fetches a fresh snapshot, publishes an `InventoryChanged` event
/// when it differs from the previous one, and keeps the latest snapshot
/// available for front-end reads. Query failures publish `PollError` and the
/// loop retries on the next tick; only [`Poller::drop`] stops it.
pub struct Poller {
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
    latest: Arc<Mutex<Arc<InventorySnapshot>>>,
}

impl Poller {
    pub fn start<F>(
        interval: Duration,
        bus: EventBus,
        history: Option<Arc<HistoryLog>>,
        fetch: F,
    ) -> Self
    where
        F: Fn() -> Result<InventorySnapshot> + Send + 'static,
    {
        let cancel = CancelToken::new();
        let latest = Arc::new(Mutex::new(Arc::new(InventorySnapshot::default())));

        let loop_cancel = cancel.clone();
        let loop_latest = latest.clone();
        let handle = std::thread::spawn(move || {
            let mut previous = Arc::new(InventorySnapshot::default());
            while !loop_cancel.is_cancelled() {
                match fetch() {
                    Ok(snapshot) => {
                        let snapshot = Arc::new(snapshot);
                        let changes = diff(&previous, &snapshot);
                        if !changes.is_empty() {
                            bus.publish(StatusEvent::InventoryChanged(changes));
                        }
                        if let Ok(mut slot) = loop_latest.lock() {
                            *slot = snapshot.clone();
                        }
                        previous = snapshot;
                    }
                    Err(e) => {
                        let message = format!("{e:#}");
                        tracing::warn!(error = %message, "inventory poll failed");
                        if let Some(log) = &history {
                            log.record_poll_error(&message);
                        }
                        bus.publish(StatusEvent::PollError(message));
                    }
                }
                sleep_until_cancelled(interval, &loop_cancel);
            }
        });

        Self {
            cancel,
            handle: Some(handle),
            latest,
        }
    }

    /// Most recently observed snapshot. Replaced atomically; readers never
    /// see a half-built inventory.
    pub fn latest(&self) -> Arc<InventorySnapshot> {
        self.latest
            .lock()
            .map(|slot| slot.clone())
            .unwrap_or_default()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Sleep in short slices so shutdown is observed promptly.
fn sleep_until_cancelled(total: Duration, cancel: &CancelToken) {
    let mut remaining = total;
    while !remaining.is_zero() && !cancel.is_cancelled() {
        let slice = remaining.min(SHUTDOWN_POLL);
        std::thread::sleep(slice);
        remaining -= slice;
    }
}
