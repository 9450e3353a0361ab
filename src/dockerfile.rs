//! Dockerfile template rendering for the "generate Dockerfile" action.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Config;

/// Render the default application Dockerfile from configured defaults.
pub fn render(config: &Config) -> String {
    format!(
        "FROM {registry}/{base}:{version}\n\
         \n\
         WORKDIR /app\n\
         \n\
         ENV PYTHONUNBUFFERED=1\n\
         ENV PYTHONDONTWRITEBYTECODE=1\n\
         \n\
         COPY requirements.txt .\n\
         RUN pip install --no-cache-dir -r requirements.txt\n\
         \n\
         COPY . .\n\
         \n\
         EXPOSE 5000\n\
         \n\
         CMD [\"python\", \"app.py\"]\n",
        registry = config.registry,
        base = config.base_image,
        version = config.base_version,
    )
}

/// Write `content` as `Dockerfile` inside `dir` and return the path.
pub fn save(dir: &Path, content: &str) -> Result<PathBuf> {
    let path = dir.join("Dockerfile");
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_uses_configured_base_image() {
        let mut cfg = Config::default();
        cfg.registry = "registry.local".into();
        cfg.base_image = "python".into();
        cfg.base_version = "3.11".into();
        let text = render(&cfg);
        assert!(text.starts_with("FROM registry.local/python:3.11\n"));
        assert!(text.contains("WORKDIR /app"));
    }

    #[test]
    fn save_writes_a_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(dir.path(), "FROM scratch\n").unwrap();
        assert_eq!(path.file_name().unwrap(), "Dockerfile");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "FROM scratch\n");
    }
}
