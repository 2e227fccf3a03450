//! Dependency-aware operation planning.
//!
//! Turns a flat list of changed files into ordered batches. Batch 0 holds the
//! changed module directories; each following batch holds the directories
//! whose module files depend on something in the previous one. The walk is
//! repeated from scratch for every layer until no new dependents are found.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::core::path::{normalize, update_common_root};
use crate::core::types::{Command, DirOperation, OperationBatch, OperationKind, OperationPlan};
use crate::error::{Error, Result};
use crate::io::modules::{dir_contains_runnable, module_files, read_dependencies};

#[derive(Debug, Clone)]
pub struct OperationPlanner {
    work_root: PathBuf,
    command: Command,
}

impl OperationPlanner {
    pub fn new(work_root: impl AsRef<Path>, command: Command) -> Self {
        Self {
            work_root: normalize(work_root.as_ref()),
            command,
        }
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Build the plan for `changed_files` (paths relative to the work root).
    #[instrument(skip_all, fields(work_root = %self.work_root.display(), command = %self.command))]
    pub fn plan<S: AsRef<str>>(&self, changed_files: &[S]) -> Result<OperationPlan> {
        info!(changes = changed_files.len(), "planning operations");
        let changed_dirs = changed_directories(changed_files);
        debug!(dirs = ?changed_dirs, "changed directories");

        let initial = changed_dirs
            .iter()
            .map(|dir| self.classify(dir))
            .collect::<Result<Vec<_>>>()?;

        let mut common_root = String::new();
        for op in &initial {
            let dir = format!("{}/", op.directory.display());
            common_root = update_common_root(&common_root, &dir);
        }

        let destroy_batch = OperationBatch::on_base_branch(
            initial
                .iter()
                .filter(|op| op.kind == OperationKind::Destroy)
                .cloned()
                .collect(),
        );

        // Removed modules still affect their dependents, so they take part in
        // propagation as scan waypoints.
        let mut frontier = OperationBatch::default();
        for op in initial {
            let kind = match op.kind {
                OperationKind::Destroy => OperationKind::Scan,
                kind => kind,
            };
            frontier.insert(DirOperation::new(op.directory, kind));
        }

        let mut batches = vec![frontier.clone()];
        while !frontier.is_empty() {
            info!(layer = batches.len(), "walking module files");
            let (next, module_dirs) = self.next_layer(&frontier, &mut common_root)?;
            info!(found = next.operations.len(), "dependents found");
            if next.is_empty() {
                break;
            }
            if batches.len() > module_dirs {
                let dir = next
                    .operations
                    .first()
                    .map(|op| op.directory.clone())
                    .unwrap_or_default();
                return Err(Error::DependencyCycle {
                    layers: batches.len(),
                    dir,
                });
            }
            batches.push(next.clone());
            frontier = next;
        }

        let mut batches = executable_batches(batches);
        if !destroy_batch.is_empty() {
            batches.push(destroy_batch);
        }

        info!(batches = batches.len(), root = %common_root, "plan ready");
        Ok(OperationPlan {
            batches,
            command: self.command,
            common_root,
        })
    }

    fn classify(&self, rel_dir: &Path) -> Result<DirOperation> {
        let dir = normalize(&self.work_root.join(rel_dir));
        let classify_err = |source| Error::Classify {
            dir: dir.clone(),
            source,
        };
        let kind = if !dir.try_exists().map_err(classify_err)? {
            OperationKind::Destroy
        } else if dir_contains_runnable(&dir).map_err(classify_err)? {
            OperationKind::Run
        } else {
            OperationKind::Scan
        };
        debug!(dir = %dir.display(), ?kind, "classified changed directory");
        Ok(DirOperation::new(dir, kind))
    }

    /// Directories whose module files depend on a directory in `frontier`,
    /// plus the number of distinct module directories seen during the walk.
    fn next_layer(
        &self,
        frontier: &OperationBatch,
        common_root: &mut String,
    ) -> Result<(OperationBatch, usize)> {
        let mut next = OperationBatch::default();
        let mut module_dirs = HashSet::new();
        for file in module_files(&self.work_root) {
            let file = file?;
            module_dirs.insert(file.dir().to_path_buf());
            let deps = read_dependencies(&file.path)?;
            if deps.iter().any(|dep| frontier.contains_dir(dep)) {
                debug!(path = %file.path.display(), "depends on current layer");
                *common_root = update_common_root(common_root, &file.path.to_string_lossy());
                next.insert(DirOperation::new(
                    file.dir().to_path_buf(),
                    file.kind.operation_kind(),
                ));
            }
        }
        Ok((next, module_dirs.len()))
    }
}

/// Containing directory of every changed file, first occurrence order.
fn changed_directories<S: AsRef<str>>(changed_files: &[S]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    changed_files
        .iter()
        .map(|file| file.as_ref().trim())
        .filter(|file| !file.is_empty())
        .map(|file| match Path::new(file).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        })
        .filter(|dir| seen.insert(dir.clone()))
        .collect()
}

/// Drop scan waypoints and batches left empty. A directory that changed
/// itself stays in the first batch; any other executable directory is kept
/// only in the last batch that reached it.
fn executable_batches(batches: Vec<OperationBatch>) -> Vec<OperationBatch> {
    let mut last_seen: HashMap<PathBuf, usize> = HashMap::new();
    for (idx, batch) in batches.iter().enumerate() {
        for op in batch.operations.iter().filter(|op| op.kind.is_executable()) {
            if last_seen.get(&op.directory) != Some(&0) {
                last_seen.insert(op.directory.clone(), idx);
            }
        }
    }

    batches
        .into_iter()
        .enumerate()
        .map(|(idx, batch)| OperationBatch {
            operations: batch
                .operations
                .into_iter()
                .filter(|op| {
                    op.kind.is_executable() && last_seen.get(&op.directory) == Some(&idx)
                })
                .collect(),
            run_on_base_branch: batch.run_on_base_branch,
        })
        .filter(|batch| !batch.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_directories_dedupes_in_order() {
        let dirs = changed_directories(&[
            "live/b/terragrunt.hcl",
            "live/a/terragrunt.hcl",
            "live/b/inputs.hcl",
            "",
            "README.md",
        ]);
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("live/b"),
                PathBuf::from("live/a"),
                PathBuf::from("."),
            ]
        );
    }

    #[test]
    fn executable_batches_keeps_last_occurrence_and_drops_scans() {
        let batches = vec![
            OperationBatch::new(vec![
                DirOperation::new("/w/a", OperationKind::Run),
                DirOperation::new("/w/lib", OperationKind::Scan),
            ]),
            OperationBatch::new(vec![
                DirOperation::new("/w/b", OperationKind::Run),
                DirOperation::new("/w/c", OperationKind::Run),
            ]),
            OperationBatch::new(vec![DirOperation::new("/w/c", OperationKind::Run)]),
            OperationBatch::new(vec![DirOperation::new("/w/x", OperationKind::Scan)]),
        ];

        let result = executable_batches(batches);
        assert_eq!(
            result,
            vec![
                OperationBatch::new(vec![DirOperation::new("/w/a", OperationKind::Run)]),
                OperationBatch::new(vec![DirOperation::new("/w/b", OperationKind::Run)]),
                OperationBatch::new(vec![DirOperation::new("/w/c", OperationKind::Run)]),
            ]
        );
    }

    #[test]
    fn executable_batches_pins_changed_directories_to_first_batch() {
        let batches = vec![
            OperationBatch::new(vec![
                DirOperation::new("/w/a", OperationKind::Run),
                DirOperation::new("/w/b", OperationKind::Run),
            ]),
            OperationBatch::new(vec![
                DirOperation::new("/w/b", OperationKind::Run),
                DirOperation::new("/w/c", OperationKind::Run),
            ]),
            OperationBatch::new(vec![DirOperation::new("/w/b", OperationKind::Run)]),
        ];

        let result = executable_batches(batches);
        assert_eq!(
            result,
            vec![
                OperationBatch::new(vec![
                    DirOperation::new("/w/a", OperationKind::Run),
                    DirOperation::new("/w/b", OperationKind::Run),
                ]),
                OperationBatch::new(vec![DirOperation::new("/w/c", OperationKind::Run)]),
            ]
        );
    }
}
