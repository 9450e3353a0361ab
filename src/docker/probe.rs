use std::process::Command;

use anyhow::{Context, Result, bail};

/// Verify that the Docker daemon is reachable through the given binary.
pub fn ensure_available(program: &str) -> Result<()> {
    let status = Command::new(program)
        .args(["version", "--format", "{{.Server.Version}}"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .with_context(|| format!("failed to invoke `{program}` — is it installed and on PATH?"))?;

    if !status.success() {
        bail!("docker daemon is not running (exit {status})");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_available_does_not_panic() {
        // We only assert it doesn't panic; CI may or may not have Docker.
        let _ = ensure_available("docker");
    }

    #[test]
    fn missing_binary_is_an_error() {
        assert!(ensure_available("definitely-not-a-real-binary-xyz").is_err());
    }
}
