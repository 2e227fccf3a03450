//! Sequential execution of an [`OperationPlan`].
//!
//! Batches run strictly in order and operations inside a batch run one at a
//! time. The first failure aborts the run. The batch holding destroy
//! operations runs on the base branch, and the original branch is restored
//! afterwards whatever the operations did.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::anyhow;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancellationToken;
use crate::core::output_filter::extract_key_lines;
use crate::core::summary::{command_summary, results_summary};
use crate::core::types::{DirOperation, OperationBatch, OperationKind, OperationPlan};
use crate::error::{Error, Result};
use crate::io::executor::{ToolExecutor, ToolRequest};
use crate::io::git::CodeRepository;
use crate::io::modules::dir_contains_runnable;

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Stopped early because cancellation was requested.
    Cancelled,
}

pub struct BatchRunner<'a, R: CodeRepository, E: ToolExecutor> {
    plan: &'a OperationPlan,
    repository: &'a R,
    executor: &'a E,
    base_branch: String,
    cancel: CancellationToken,
    cancelled: bool,
    results: HashMap<PathBuf, String>,
}

impl<'a, R: CodeRepository, E: ToolExecutor> BatchRunner<'a, R, E> {
    pub fn new(
        plan: &'a OperationPlan,
        repository: &'a R,
        executor: &'a E,
        base_branch: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            plan,
            repository,
            executor,
            base_branch: base_branch.into(),
            cancel,
            cancelled: false,
            results: HashMap::new(),
        }
    }

    /// Extracted summary per executed directory.
    pub fn results(&self) -> &HashMap<PathBuf, String> {
        &self.results
    }

    pub fn into_results(self) -> HashMap<PathBuf, String> {
        self.results
    }

    pub fn summary(&self) -> String {
        results_summary(self.plan, &self.results)
    }

    #[instrument(skip_all, fields(command = %self.plan.command))]
    pub fn run(&mut self) -> Result<RunStatus> {
        for (idx, batch) in self.plan.batches.iter().enumerate() {
            if self.observe_cancel() {
                break;
            }
            info!(batch = idx, operations = batch.operations.len(), "running batch");
            self.run_batch(batch)?;
        }

        // Only a cancellation that skipped work counts; a signal arriving after
        // the last operation finished leaves the run completed.
        if self.cancelled {
            info!("run stopped after cancellation");
            return Ok(RunStatus::Cancelled);
        }
        Ok(RunStatus::Completed)
    }

    fn observe_cancel(&mut self) -> bool {
        if !self.cancelled && self.cancel.is_cancelled() {
            self.cancelled = true;
        }
        self.cancelled
    }

    fn run_batch(&mut self, batch: &OperationBatch) -> Result<()> {
        if !batch.run_on_base_branch {
            return self.run_operations(batch);
        }

        let original = self
            .repository
            .current_branch()
            .map_err(|source| Error::Checkout {
                branch: self.base_branch.clone(),
                source: source.context("read current branch"),
            })?;
        debug!(branch = %original, "on branch");
        info!(branch = %self.base_branch, "checking out base branch");
        self.repository
            .checkout_branch(&self.base_branch)
            .map_err(|source| Error::Checkout {
                branch: self.base_branch.clone(),
                source,
            })?;

        let outcome = self.run_operations(batch);

        info!(branch = %original, "checking out original branch");
        let restored = self
            .repository
            .checkout_branch(&original)
            .map_err(|source| Error::Checkout {
                branch: original.clone(),
                source,
            });
        match (outcome, restored) {
            (Err(err), Err(restore_err)) => {
                warn!(err = %restore_err, "failed to restore original branch");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), restored) => restored,
        }
    }

    fn run_operations(&mut self, batch: &OperationBatch) -> Result<()> {
        for op in &batch.operations {
            if self.observe_cancel() {
                break;
            }
            if !self.should_execute(op)? {
                continue;
            }
            self.execute(op)?;
        }
        Ok(())
    }

    fn should_execute(&self, op: &DirOperation) -> Result<bool> {
        let rel = self.plan.relative(&op.directory);
        let runnable = dir_contains_runnable(&op.directory).map_err(|source| Error::Classify {
            dir: op.directory.clone(),
            source,
        })?;
        if !runnable {
            info!(dir = %rel, "skipping non-runnable directory");
            return Ok(false);
        }
        match op.kind {
            OperationKind::Scan => {
                debug!(dir = %rel, "skipping scan");
                Ok(false)
            }
            OperationKind::Destroy if !self.plan.command.is_destructive() => {
                info!(
                    dir = %rel,
                    "skipping destroy operation when command is {}", self.plan.command
                );
                Ok(false)
            }
            OperationKind::Run | OperationKind::Destroy => Ok(true),
        }
    }

    fn execute(&mut self, op: &DirOperation) -> Result<()> {
        let command = self.plan.command;
        info!(
            dir = %self.plan.relative(&op.directory),
            "running operation (command \"{command}\")"
        );
        let request = ToolRequest {
            workdir: op.directory.clone(),
            command,
        };
        let output = self
            .executor
            .execute(&request, &self.cancel)
            .map_err(|source| Error::CommandExecution {
                command,
                dir: op.directory.clone(),
                source,
            })?;

        if output.interrupted {
            self.cancelled = true;
        }
        if !output.success {
            if self.observe_cancel() {
                warn!(status = %output.status, "operation interrupted by cancellation");
                return Ok(());
            }
            return Err(Error::CommandExecution {
                command,
                dir: op.directory.clone(),
                source: anyhow!("{}", output.status),
            });
        }

        let lines = extract_key_lines(&output.output);
        if !lines.is_empty() {
            let summary = command_summary(self.plan, &op.directory, &lines);
            self.results.insert(op.directory.clone(), summary);
        }
        Ok(())
    }
}
