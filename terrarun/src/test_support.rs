//! Test-only fixtures: module trees on disk, a scripted repository and a
//! recording tool executor.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::cancel::CancellationToken;
use crate::core::types::Command;
use crate::io::executor::{ToolExecutor, ToolOutput, ToolRequest};
use crate::io::git::CodeRepository;

/// A temporary directory holding module definitions.
pub struct ModuleTree {
    _temp: TempDir,
    root: PathBuf,
}

impl ModuleTree {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().to_path_buf();
        Ok(Self { _temp: temp, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `contents` to `rel` (creating parents), returning the full path.
    pub fn write(&self, rel: &str, contents: &str) -> Result<PathBuf> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Create `rel_dir/terragrunt.hcl`, returning the module directory.
    pub fn module(&self, rel_dir: &str, contents: &str) -> Result<PathBuf> {
        self.write(&format!("{rel_dir}/terragrunt.hcl"), contents)?;
        Ok(self.root.join(rel_dir))
    }

    pub fn remove(&self, rel_dir: &str) -> Result<()> {
        fs::remove_dir_all(self.root.join(rel_dir))?;
        Ok(())
    }
}

/// `dependency` block pointing at `config_path`.
pub fn dependency_block(name: &str, config_path: &str) -> String {
    format!("dependency \"{name}\" {{\n  config_path = \"{config_path}\"\n}}\n")
}

/// Ordered record of repository and executor activity shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Repository fake with a current branch and optional checkout failures.
///
/// Files registered with [`ScriptedRepository::with_branch_files`] appear on
/// disk while that branch is checked out, which is how a deleted module comes
/// back on the base branch.
pub struct ScriptedRepository {
    current: RefCell<String>,
    changed: Vec<String>,
    failing: HashSet<String>,
    branch_files: Option<(String, Vec<(PathBuf, String)>)>,
    checkouts: RefCell<Vec<String>>,
    log: EventLog,
}

impl ScriptedRepository {
    pub fn new(current: &str) -> Self {
        Self {
            current: RefCell::new(current.to_string()),
            changed: Vec::new(),
            failing: HashSet::new(),
            branch_files: None,
            checkouts: RefCell::new(Vec::new()),
            log: EventLog::default(),
        }
    }

    pub fn with_changed(mut self, files: &[&str]) -> Self {
        self.changed = files.iter().map(|file| file.to_string()).collect();
        self
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    /// Make checking out `branch` fail.
    pub fn fail_checkout(mut self, branch: &str) -> Self {
        self.failing.insert(branch.to_string());
        self
    }

    pub fn with_branch_files(mut self, branch: &str, files: Vec<(PathBuf, String)>) -> Self {
        self.branch_files = Some((branch.to_string(), files));
        self
    }

    /// Branches successfully checked out, in order.
    pub fn checkouts(&self) -> Vec<String> {
        self.checkouts.borrow().clone()
    }

    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    fn sync_branch_files(&self, branch: &str) -> Result<()> {
        let Some((owner, files)) = &self.branch_files else {
            return Ok(());
        };
        for (path, contents) in files {
            if owner == branch {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, contents)?;
            } else if path.exists() {
                fs::remove_file(path)?;
                if let Some(parent) = path.parent() {
                    let _ = fs::remove_dir(parent);
                }
            }
        }
        Ok(())
    }
}

impl CodeRepository for ScriptedRepository {
    fn changed_files(&self, _base_branch: &str) -> crate::error::Result<Vec<String>> {
        Ok(self.changed.clone())
    }

    fn checkout_branch(&self, branch: &str) -> Result<()> {
        if self.failing.contains(branch) {
            self.log.push(format!("checkout {branch} failed"));
            return Err(anyhow!("checkout {branch} refused"));
        }
        self.sync_branch_files(branch)?;
        self.log.push(format!("checkout {branch}"));
        self.checkouts.borrow_mut().push(branch.to_string());
        *self.current.borrow_mut() = branch.to_string();
        Ok(())
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.current())
    }
}

/// Executor fake that records every request and returns scripted output.
pub struct RecordingExecutor {
    output: String,
    failing: HashSet<PathBuf>,
    launch_errors: HashSet<PathBuf>,
    cancel_in: Option<PathBuf>,
    cancel_after: Option<PathBuf>,
    calls: RefCell<Vec<(PathBuf, Command)>>,
    log: EventLog,
}

impl RecordingExecutor {
    pub fn new(output: &str) -> Self {
        Self {
            output: output.to_string(),
            failing: HashSet::new(),
            launch_errors: HashSet::new(),
            cancel_in: None,
            cancel_after: None,
            calls: RefCell::new(Vec::new()),
            log: EventLog::default(),
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    /// Exit unsuccessfully when run in `dir`.
    pub fn fail_in(mut self, dir: &Path) -> Self {
        self.failing.insert(dir.to_path_buf());
        self
    }

    /// Fail to launch when run in `dir`.
    pub fn launch_error_in(mut self, dir: &Path) -> Self {
        self.launch_errors.insert(dir.to_path_buf());
        self
    }

    /// Trigger cancellation while running in `dir` and report the tool as
    /// interrupted.
    pub fn cancel_during(mut self, dir: &Path) -> Self {
        self.cancel_in = Some(dir.to_path_buf());
        self
    }

    /// Trigger cancellation once the tool has finished successfully in `dir`.
    pub fn cancel_after(mut self, dir: &Path) -> Self {
        self.cancel_after = Some(dir.to_path_buf());
        self
    }

    pub fn calls(&self) -> Vec<(PathBuf, Command)> {
        self.calls.borrow().clone()
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        self.calls().into_iter().map(|(dir, _)| dir).collect()
    }
}

impl ToolExecutor for RecordingExecutor {
    fn execute(&self, request: &ToolRequest, cancel: &CancellationToken) -> Result<ToolOutput> {
        self.calls
            .borrow_mut()
            .push((request.workdir.clone(), request.command));
        self.log.push(format!(
            "{} {}",
            request.command,
            request.workdir.display()
        ));

        if self.launch_errors.contains(&request.workdir) {
            return Err(anyhow!("spawn tool: not found"));
        }
        if self.cancel_in.as_deref() == Some(request.workdir.as_path()) {
            cancel.cancel();
            return Ok(ToolOutput {
                success: false,
                status: "signal: 2 (SIGINT)".to_string(),
                output: String::new(),
                interrupted: true,
            });
        }
        if self.cancel_after.as_deref() == Some(request.workdir.as_path()) {
            cancel.cancel();
        }
        let success = !self.failing.contains(&request.workdir);
        Ok(ToolOutput {
            success,
            status: if success { "exit status: 0" } else { "exit status: 1" }.to_string(),
            output: self.output.clone(),
            interrupted: false,
        })
    }
}
