//! Shared deterministic types for planning and running operations.
//!
//! These types define stable contracts between the planner and the batch
//! runner. The plan is built once and only read afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command forwarded to the external tool (`terragrunt <command>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Plan,
    Apply,
    Validate,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::Plan, Command::Apply, Command::Validate];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Plan => "plan",
            Command::Apply => "apply",
            Command::Validate => "validate",
        }
    }

    /// Only destructive commands execute `Destroy` operations.
    pub fn is_destructive(self) -> bool {
        self == Command::Apply
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid command: {0} (expected one of plan, apply, validate)")]
pub struct ParseCommandError(pub String);

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| ParseCommandError(s.to_string()))
    }
}

/// What should happen to a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Execute the command in the directory.
    Run,
    /// Propagation waypoint in the dependency graph, never executed.
    Scan,
    /// Directory exists on the base branch but was removed from the working tree.
    Destroy,
}

impl OperationKind {
    pub fn is_executable(self) -> bool {
        self != OperationKind::Scan
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirOperation {
    pub directory: PathBuf,
    pub kind: OperationKind,
}

impl DirOperation {
    pub fn new(directory: impl Into<PathBuf>, kind: OperationKind) -> Self {
        Self {
            directory: directory.into(),
            kind,
        }
    }
}

/// Operations that run together, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationBatch {
    pub operations: Vec<DirOperation>,
    /// True only for the batch holding `Destroy` operations, which must see
    /// the pre-change module definitions.
    pub run_on_base_branch: bool,
}

impl OperationBatch {
    pub fn new(operations: Vec<DirOperation>) -> Self {
        Self {
            operations,
            run_on_base_branch: false,
        }
    }

    pub fn on_base_branch(operations: Vec<DirOperation>) -> Self {
        Self {
            operations,
            run_on_base_branch: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn contains_dir(&self, dir: &Path) -> bool {
        self.operations.iter().any(|op| op.directory == dir)
    }

    /// Add `op` unless its directory is already present. A `Run` replaces an
    /// earlier `Scan` for the same directory.
    pub fn insert(&mut self, op: DirOperation) {
        match self
            .operations
            .iter_mut()
            .find(|existing| existing.directory == op.directory)
        {
            Some(existing) => {
                if existing.kind == OperationKind::Scan && op.kind == OperationKind::Run {
                    existing.kind = OperationKind::Run;
                }
            }
            None => self.operations.push(op),
        }
    }
}

/// Ordered batches for one command. Batch `n + 1` never starts before batch
/// `n` has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPlan {
    pub batches: Vec<OperationBatch>,
    pub command: Command,
    /// Longest shared prefix of every directory the planner touched. Only used
    /// for rendering relative paths.
    pub common_root: String,
}

impl OperationPlan {
    /// Render `dir` relative to the common root.
    pub fn relative<'a>(&self, dir: &'a Path) -> std::borrow::Cow<'a, str> {
        let full = dir.to_string_lossy();
        if self.common_root.is_empty() {
            return full;
        }
        if let Some(rest) = full.strip_prefix(self.common_root.as_str()) {
            return std::borrow::Cow::Owned(rest.to_string());
        }
        // The root of a single-directory plan is that directory plus `/`.
        if *full == *self.common_root.trim_end_matches('/') {
            return std::borrow::Cow::Borrowed(".");
        }
        full
    }

    pub fn operations(&self) -> impl Iterator<Item = &DirOperation> {
        self.batches.iter().flat_map(|batch| batch.operations.iter())
    }
}

/// Kind of module-definition file, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFileKind {
    /// `*.hcl`, executed directly by the tool.
    Runnable,
    /// `*.tf`, only referenced as a module source.
    Library,
}

impl ModuleFileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("hcl") => Some(ModuleFileKind::Runnable),
            Some("tf") => Some(ModuleFileKind::Library),
            _ => None,
        }
    }

    /// Operation kind for a directory discovered through a file of this kind.
    pub fn operation_kind(self) -> OperationKind {
        match self {
            ModuleFileKind::Runnable => OperationKind::Run,
            ModuleFileKind::Library => OperationKind::Scan,
        }
    }
}
