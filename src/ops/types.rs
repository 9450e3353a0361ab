use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A malformed or incomplete request, rejected before any process is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid request: {0}")]
pub struct InvalidRequest(pub String);

/// The six docker-facing operations the engine supervises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Build,
    Run,
    Push,
    Stop,
    Remove,
    Commit,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Build => "build",
            OpKind::Run => "run",
            OpKind::Push => "push",
            OpKind::Stop => "stop",
            OpKind::Remove => "remove",
            OpKind::Commit => "commit",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `HOST:CONTAINER` port pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

impl FromStr for PortMapping {
    type Err = InvalidRequest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || InvalidRequest(format!("port mapping must be HOST:CONTAINER, got `{s}`"));
        let (host, container) = s.split_once(':').ok_or_else(bad)?;
        Ok(PortMapping {
            host: host.trim().parse().map_err(|_| bad())?,
            container: container.trim().parse().map_err(|_| bad())?,
        })
    }
}

/// A user-issued action. Immutable once submitted; which fields are required
/// depends on `kind` and is enforced by [`crate::ops::translate`].
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub kind: OpKind,
    pub image: Option<String>,
    pub tag: Option<String>,
    pub container: Option<String>,
    pub ports: Vec<PortMapping>,
    /// Dockerfile context directory (build only).
    pub context: Option<PathBuf>,
    /// Extra flags spliced into `docker run`.
    pub extra_flags: Vec<String>,
    /// Per-task deadline override.
    pub deadline: Option<Duration>,
}

impl OperationRequest {
    pub fn new(kind: OpKind) -> Self {
        Self {
            kind,
            image: None,
            tag: None,
            container: None,
            ports: Vec::new(),
            context: None,
            extra_flags: Vec::new(),
            deadline: None,
        }
    }
}
