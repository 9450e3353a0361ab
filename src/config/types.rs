use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Operator defaults used to fill in omitted request fields. The engine
/// itself never reads this; front ends consult it when constructing an
/// `OperationRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub image_name: String,
    pub tag_name: String,
    pub container_name: String,
    /// Default `HOST:CONTAINER` pair for `run`.
    pub port_mapping: String,
    /// Registry prefix for the generated Dockerfile base image.
    pub registry: String,
    pub base_image: String,
    pub base_version: String,
    /// Per-task deadline, overridable per request.
    pub task_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Where the dated history log is written.
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_name: "app".to_string(),
            tag_name: "latest".to_string(),
            container_name: "app".to_string(),
            port_mapping: "8080:80".to_string(),
            registry: "docker.io".to_string(),
            base_image: "python".to_string(),
            base_version: "3.12".to_string(),
            task_timeout_secs: 60,
            poll_interval_secs: 5,
            log_dir: PathBuf::from("."),
        }
    }
}
