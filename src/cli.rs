//! Scripted (non-interactive) mode: run one operation and exit with a code
//! that distinguishes success, failure, timeout, and invalid requests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};

use crate::config::{self, CONFIG_FILE, Config};
use crate::engine::{StatusEvent, Supervisor, TaskState};
use crate::history::HistoryLog;
use crate::ops::{InvalidRequest, OpKind, OperationRequest, PortMapping};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_TIMED_OUT: i32 = 2;
pub const EXIT_INVALID: i32 = 3;

/// Slack allowed past the task deadline before we assume the engine wedged.
const COMPLETION_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "dockhand", version, about)]
pub struct Cli {
    /// Run in scripted mode (implied by --action).
    #[arg(long)]
    pub cli: bool,

    /// Operation to perform.
    #[arg(long, value_enum)]
    pub action: Option<Action>,

    /// Image name.
    #[arg(long)]
    pub image: Option<String>,

    /// Image tag.
    #[arg(long)]
    pub tag: Option<String>,

    /// Container name.
    #[arg(long)]
    pub container: Option<String>,

    /// Port mapping, e.g. 8080:80. Repeatable.
    #[arg(long = "ports", value_name = "HOST:CONTAINER")]
    pub ports: Vec<String>,

    /// Dockerfile context directory for build.
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Extra flags spliced into `docker run`, quoted as one string.
    #[arg(long, allow_hyphen_values = true)]
    pub flags: Option<String>,

    /// Per-task deadline override, in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Configuration file.
    #[arg(long, default_value = CONFIG_FILE)]
    pub config: PathBuf,
}

impl Cli {
    pub fn scripted(&self) -> bool {
        self.cli || self.action.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    Build,
    Run,
    Push,
    Stop,
    Remove,
    Commit,
}

impl From<Action> for OpKind {
    fn from(action: Action) -> Self {
        match action {
            Action::Build => OpKind::Build,
            Action::Run => OpKind::Run,
            Action::Push => OpKind::Push,
            Action::Stop => OpKind::Stop,
            Action::Remove => OpKind::Remove,
            Action::Commit => OpKind::Commit,
        }
    }
}

/// Execute one operation and return the process exit code.
pub fn run(cli: &Cli) -> Result<i32> {
    let cfg = config::load(&cli.config)?;

    let request = match build_request(cli, &cfg) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{e}");
            return Ok(EXIT_INVALID);
        }
    };
    let deadline = request
        .deadline
        .unwrap_or(Duration::from_secs(cfg.task_timeout_secs));

    let history = match HistoryLog::open(&cfg.log_dir) {
        Ok(log) => Some(Arc::new(log)),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "history log unavailable");
            None
        }
    };

    let supervisor = Supervisor::new(
        "docker",
        Duration::from_secs(cfg.task_timeout_secs),
        history,
    );
    let events = supervisor.subscribe();

    let id = match supervisor.submit(request) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{e}");
            return Ok(EXIT_INVALID);
        }
    };

    let give_up = Instant::now() + deadline + COMPLETION_GRACE;
    while Instant::now() < give_up {
        match events.recv_timeout(Duration::from_millis(500)) {
            Some(StatusEvent::TaskOutput { id: ev_id, line }) if ev_id == id => {
                println!("{line}");
            }
            Some(StatusEvent::TaskFinished(task)) if task.id == id => {
                if let Some(reason) = &task.reason {
                    eprintln!("{}: {reason}", task.state);
                }
                return Ok(match task.state {
                    TaskState::Succeeded => EXIT_SUCCESS,
                    TaskState::TimedOut => EXIT_TIMED_OUT,
                    _ => EXIT_FAILURE,
                });
            }
            _ => {}
        }
    }
    bail!("task {id} did not report completion");
}

/// Merge CLI arguments over configuration defaults into a request.
fn build_request(cli: &Cli, cfg: &Config) -> Result<OperationRequest, InvalidRequest> {
    let kind: OpKind = cli
        .action
        .ok_or_else(|| InvalidRequest("--action is required in scripted mode".into()))?
        .into();

    let mut req = OperationRequest::new(kind);
    req.deadline = cli.timeout_secs.map(Duration::from_secs);

    match kind {
        OpKind::Build => {
            req.image = Some(cli.image.clone().unwrap_or_else(|| cfg.image_name.clone()));
            req.tag = Some(cli.tag.clone().unwrap_or_else(|| cfg.tag_name.clone()));
            req.context = Some(cli.context.clone().unwrap_or_else(|| PathBuf::from(".")));
        }
        OpKind::Run => {
            req.image = Some(cli.image.clone().unwrap_or_else(|| cfg.image_name.clone()));
            req.tag = Some(cli.tag.clone().unwrap_or_else(|| cfg.tag_name.clone()));
            req.container = Some(
                cli.container
                    .clone()
                    .unwrap_or_else(|| cfg.container_name.clone()),
            );
            let port_args = if cli.ports.is_empty() {
                std::slice::from_ref(&cfg.port_mapping)
            } else {
                cli.ports.as_slice()
            };
            req.ports = port_args
                .iter()
                .map(|p| p.parse::<PortMapping>())
                .collect::<Result<_, _>>()?;
            if let Some(flags) = &cli.flags {
                req.extra_flags = shell_words::split(flags)
                    .map_err(|e| InvalidRequest(format!("bad --flags value: {e}")))?;
            }
        }
        OpKind::Push => {
            req.image = Some(cli.image.clone().unwrap_or_else(|| cfg.image_name.clone()));
            req.tag = Some(cli.tag.clone().unwrap_or_else(|| cfg.tag_name.clone()));
        }
        OpKind::Stop => {
            req.container = Some(
                cli.container
                    .clone()
                    .unwrap_or_else(|| cfg.container_name.clone()),
            );
        }
        OpKind::Remove => {
            // Destructive: never fall back to configured defaults.
            req.container = cli.container.clone();
            req.image = cli.image.clone();
            req.tag = cli.tag.clone();
        }
        OpKind::Commit => {
            req.container = Some(
                cli.container
                    .clone()
                    .unwrap_or_else(|| cfg.container_name.clone()),
            );
            req.image = Some(cli.image.clone().unwrap_or_else(|| cfg.image_name.clone()));
            req.tag = Some(cli.tag.clone().unwrap_or_else(|| cfg.tag_name.clone()));
        }
    }
    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("dockhand").chain(args.iter().copied()))
    }

    #[test]
    fn action_flag_implies_scripted_mode() {
        assert!(parse(&["--action", "build"]).scripted());
        assert!(parse(&["--cli"]).scripted());
        assert!(!parse(&[]).scripted());
    }

    #[test]
    fn build_request_fills_defaults_from_config() {
        let cli = parse(&["--action", "build"]);
        let cfg = Config::default();
        let req = build_request(&cli, &cfg).unwrap();
        assert_eq!(req.kind, OpKind::Build);
        assert_eq!(req.image.as_deref(), Some("app"));
        assert_eq!(req.tag.as_deref(), Some("latest"));
        assert_eq!(req.context.as_deref(), Some(std::path::Path::new(".")));
    }

    #[test]
    fn explicit_values_win_over_config() {
        let cli = parse(&[
            "--action", "run", "--image", "demo", "--tag", "v2", "--container", "web", "--ports",
            "9000:80",
        ]);
        let req = build_request(&cli, &Config::default()).unwrap();
        assert_eq!(req.image.as_deref(), Some("demo"));
        assert_eq!(req.tag.as_deref(), Some("v2"));
        assert_eq!(req.container.as_deref(), Some("web"));
        assert_eq!(req.ports.len(), 1);
        assert_eq!(req.ports[0].host, 9000);
    }

    #[test]
    fn run_falls_back_to_configured_port_mapping() {
        let cli = parse(&["--action", "run"]);
        let req = build_request(&cli, &Config::default()).unwrap();
        assert_eq!(req.ports[0].to_string(), "8080:80");
    }

    #[test]
    fn bad_port_mapping_is_invalid() {
        let cli = parse(&["--action", "run", "--ports", "eighty"]);
        assert!(build_request(&cli, &Config::default()).is_err());
    }

    #[test]
    fn remove_takes_no_defaults() {
        let cli = parse(&["--action", "remove"]);
        let req = build_request(&cli, &Config::default()).unwrap();
        assert!(req.container.is_none());
        assert!(req.image.is_none());
    }

    #[test]
    fn flags_are_shell_split() {
        let cli = parse(&[
            "--action",
            "run",
            "--flags",
            "--restart always -e 'KEY=some value'",
        ]);
        let req = build_request(&cli, &Config::default()).unwrap();
        assert_eq!(
            req.extra_flags,
            vec!["--restart", "always", "-e", "KEY=some value"]
        );
    }

    #[test]
    fn timeout_override_becomes_the_deadline() {
        let cli = parse(&["--action", "build", "--timeout-secs", "5"]);
        let req = build_request(&cli, &Config::default()).unwrap();
        assert_eq!(req.deadline, Some(Duration::from_secs(5)));
    }
}
