use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;

use crate::config::Config;
use crate::engine::{StatusEvent, TaskId, TaskState};
use crate::inventory::{ContainerSummary, ImageSummary, InventorySnapshot};
use crate::ops::{OpKind, OperationRequest, PortMapping};

/// Cap on the live output pane buffer.
const LIVE_LOG_LIMIT: usize = 16 * 1024;

/// Which inventory tab is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Images,
    Containers,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Images, Tab::Containers];

    pub fn index(self) -> usize {
        match self {
            Tab::Images => 0,
            Tab::Containers => 1,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

/// Top-level TUI state. Only ever reads engine snapshots and bus events;
/// all mutation goes through the supervisor.
pub struct App {
    pub running: bool,
    pub tab: Tab,
    pub image_index: usize,
    pub container_index: usize,

    /// Latest inventory, replaced wholesale by the poller.
    pub snapshot: Arc<InventorySnapshot>,
    /// Output stream of the most recently started task.
    pub live_log: String,
    /// Status bar message.
    pub status: String,
    /// Task whose cancellation Esc requests.
    pub active_task: Option<TaskId>,
    /// Whether any submitted task is still in flight.
    pub busy: bool,

    pub config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            running: true,
            tab: Tab::Images,
            image_index: 0,
            container_index: 0,
            snapshot: Arc::new(InventorySnapshot::default()),
            live_log: String::new(),
            status: "ready".into(),
            active_task: None,
            busy: false,
            config,
        }
    }

    pub fn clamp_indices(&mut self) {
        self.image_index = self
            .image_index
            .min(self.snapshot.images.len().saturating_sub(1));
        self.container_index = self
            .container_index
            .min(self.snapshot.containers.len().saturating_sub(1));
    }

    pub fn selected_image(&self) -> Option<&ImageSummary> {
        self.snapshot.images.get(self.image_index)
    }

    pub fn selected_container(&self) -> Option<&ContainerSummary> {
        self.snapshot.containers.get(self.container_index)
    }

    pub fn move_selection(&mut self, delta: isize) {
        let index = match self.tab {
            Tab::Images => &mut self.image_index,
            Tab::Containers => &mut self.container_index,
        };
        *index = index.saturating_add_signed(delta);
        self.clamp_indices();
    }

    /// Set the status bar message, stamped with the current time.
    pub fn note(&mut self, message: impl Into<String>) {
        self.status = format!("[{}] {}", Local::now().format("%H:%M:%S"), message.into());
    }

    /// Fold one bus event into the view state.
    pub fn apply_event(&mut self, event: StatusEvent) {
        match event {
            StatusEvent::TaskStarted { id, kind, target } => {
                self.busy = true;
                self.active_task = Some(id);
                self.live_log.clear();
                self.note(format!("{kind} {target} running..."));
            }
            StatusEvent::TaskOutput { line, .. } => {
                self.live_log.push_str(&line);
                self.live_log.push('\n');
                if self.live_log.len() > LIVE_LOG_LIMIT {
                    let cut = self.live_log.len() - LIVE_LOG_LIMIT;
                    let cut = self.live_log[cut..]
                        .find('\n')
                        .map(|i| cut + i + 1)
                        .unwrap_or(cut);
                    self.live_log.drain(..cut);
                }
            }
            StatusEvent::TaskFinished(task) => {
                self.busy = false;
                if self.active_task == Some(task.id) {
                    self.active_task = None;
                }
                match task.state {
                    TaskState::Succeeded => {
                        self.note(format!("{} {} succeeded", task.kind(), task.target));
                    }
                    state => {
                        let reason = task.reason.as_deref().unwrap_or("unknown error");
                        self.note(format!("{} {} {state}: {reason}", task.kind(), task.target));
                        self.live_log.push_str(&format!("\n--- {state}: {reason} ---\n"));
                    }
                }
            }
            StatusEvent::InventoryChanged(_) => {
                // The snapshot itself is re-read from the poller each frame.
                self.clamp_indices();
            }
            StatusEvent::PollError(message) => {
                self.note(format!("inventory poll failed: {message}"));
            }
        }
    }

    // ── Request builders: selection plus configured defaults ─────────────

    pub fn build_request(&self) -> Option<OperationRequest> {
        let mut req = OperationRequest::new(OpKind::Build);
        req.image = Some(self.config.image_name.clone());
        req.tag = Some(self.config.tag_name.clone());
        req.context = Some(PathBuf::from("."));
        Some(req)
    }

    pub fn run_request(&self) -> Option<OperationRequest> {
        let image = self.selected_image()?;
        let mut req = OperationRequest::new(OpKind::Run);
        req.image = Some(image.repository.clone());
        req.tag = Some(image.tag.clone());
        req.container = Some(self.config.container_name.clone());
        if let Ok(port) = self.config.port_mapping.parse::<PortMapping>() {
            req.ports.push(port);
        }
        Some(req)
    }

    pub fn push_request(&self) -> Option<OperationRequest> {
        let image = self.selected_image()?;
        let mut req = OperationRequest::new(OpKind::Push);
        req.image = Some(image.repository.clone());
        req.tag = Some(image.tag.clone());
        Some(req)
    }

    pub fn stop_request(&self) -> Option<OperationRequest> {
        let container = self.selected_container()?;
        let mut req = OperationRequest::new(OpKind::Stop);
        req.container = Some(container.name.clone());
        Some(req)
    }

    /// Remove whatever the focused tab has selected.
    pub fn remove_request(&self) -> Option<OperationRequest> {
        let mut req = OperationRequest::new(OpKind::Remove);
        match self.tab {
            Tab::Images => {
                let image = self.selected_image()?;
                req.image = Some(image.repository.clone());
                req.tag = Some(image.tag.clone());
            }
            Tab::Containers => {
                req.container = Some(self.selected_container()?.name.clone());
            }
        }
        Some(req)
    }

    pub fn commit_request(&self) -> Option<OperationRequest> {
        let container = self.selected_container()?;
        let mut req = OperationRequest::new(OpKind::Commit);
        req.container = Some(container.name.clone());
        req.image = Some(self.config.image_name.clone());
        req.tag = Some(self.config.tag_name.clone());
        Some(req)
    }
}
