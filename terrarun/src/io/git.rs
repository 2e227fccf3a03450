//! Git adapter for the code repository contract.
//!
//! The runner only needs three things from version control: the files changed
//! against the base branch, the current branch, and the ability to switch
//! branches. We keep a small, explicit wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::error::Error;

/// What the planner and batch runner need from version control.
pub trait CodeRepository {
    /// Paths (relative to the repository root) that differ from `base_branch`.
    fn changed_files(&self, base_branch: &str) -> crate::error::Result<Vec<String>>;
    fn checkout_branch(&self, branch: &str) -> Result<()>;
    fn current_branch(&self) -> Result<String>;
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds or attempts run out, returning the
    /// last error.
    pub fn run<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    let reason = format!("{err:#}");
                    warn!(attempt, attempts, err = %reason, "attempt failed, retrying");
                    thread::sleep(self.backoff);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    url: String,
    retry: RetryPolicy,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            workdir: workdir.into(),
            url: url.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Fetch `base_branch` from the configured remote URL, retrying per policy.
    #[instrument(skip_all, fields(branch = base_branch))]
    pub fn fetch_base_branch(&self, base_branch: &str) -> crate::error::Result<()> {
        self.retry
            .run(|attempt| {
                debug!(attempt, url = %self.url, "fetching base branch");
                self.run_checked(&["fetch", &self.url, base_branch])
                    .map(|_| ())
            })
            .map_err(|source| Error::Fetch {
                url: self.url.clone(),
                branch: base_branch.to_string(),
                attempts: self.retry.attempts.max(1),
                source,
            })
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_ASKPASS", "echo")
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

impl CodeRepository for Git {
    #[instrument(skip_all, fields(base_branch))]
    fn changed_files(&self, base_branch: &str) -> crate::error::Result<Vec<String>> {
        self.fetch_base_branch(base_branch)?;
        let range = format!("..{base_branch}");
        let out = self
            .run_capture(&["diff", &range, "--name-only"])
            .map_err(|source| Error::Diff {
                branch: base_branch.to_string(),
                source,
            })?;
        let files = parse_name_only(&out);
        debug!(count = files.len(), "changed files");
        Ok(files)
    }

    #[instrument(skip_all, fields(branch))]
    fn checkout_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "checking out branch");
        self.run_checked(&["checkout", branch])?;
        Ok(())
    }

    /// Errors on detached HEAD: there would be no branch to restore.
    #[instrument(skip_all)]
    fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (no branch to restore)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }
}

/// One path per non-blank line of `git diff --name-only` output.
pub fn parse_name_only(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
