//! Optional settings stored in `.terrarun.toml` under the work dir.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::git::RetryPolicy;

/// Runner settings (TOML).
///
/// Every field has a default, so a missing file or a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Program invoked as `<tool> <command>` in each module directory.
    pub tool: String,

    /// Attempts for fetching the base branch.
    pub fetch_attempts: u32,

    /// Pause between fetch attempts, in seconds.
    pub fetch_backoff_secs: u64,

    /// Echo tool output to stdout while it runs.
    pub echo_output: bool,

    pub export: ExportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportSettings {
    /// Hand the report to `envman` so later CI steps can read it.
    pub envman: bool,
    pub key: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            envman: false,
            key: "COMMAND_OUTPUT".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tool: "terragrunt".to_string(),
            fetch_attempts: 2,
            fetch_backoff_secs: 3,
            echo_output: true,
            export: ExportSettings::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.tool.trim().is_empty() {
            return Err(anyhow!("tool must be non-empty"));
        }
        if self.fetch_attempts == 0 {
            return Err(anyhow!("fetch_attempts must be > 0"));
        }
        if self.export.envman && self.export.key.trim().is_empty() {
            return Err(anyhow!("export.key must be non-empty when export.envman is set"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.fetch_attempts,
            backoff: Duration::from_secs(self.fetch_backoff_secs),
        }
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `Settings::default()`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    Ok(settings)
}
