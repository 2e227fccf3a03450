//! Report export: to a file and/or to `envman` for later CI steps.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

/// Write `report` to `path`, creating parent directories.
pub fn write_report(path: &Path, report: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, report).with_context(|| format!("write report {}", path.display()))?;
    info!(path = %path.display(), "report written");
    Ok(())
}

/// Run `envman add --key <key> --value <report>`.
#[instrument(skip_all, fields(key))]
pub fn export_envman(key: &str, report: &str) -> Result<()> {
    export_with("envman", key, report)
}

fn export_with(program: &str, key: &str, report: &str) -> Result<()> {
    let output = Command::new(program)
        .args(["add", "--key", key, "--value", report])
        .output()
        .with_context(|| format!("export output with {program}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "export output with {program}: {}: {}",
            output.status,
            stderr.trim()
        ));
    }
    info!(key, "report exported");
    Ok(())
}
