//! Filesystem access to module directories and module-definition files.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;
use walkdir::{DirEntry, WalkDir};

use crate::core::dependencies::parse_dependencies;
use crate::core::path::normalize;
use crate::core::types::ModuleFileKind;
use crate::error::{Error, Result};

/// A module-definition file found under the work root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFile {
    pub path: PathBuf,
    pub kind: ModuleFileKind,
}

impl ModuleFile {
    /// Directory holding the file.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

/// True if `dir` directly contains a runnable (`*.hcl`) file.
///
/// A missing directory is not runnable.
pub fn dir_contains_runnable(dir: &Path) -> io::Result<bool> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    for entry in entries {
        let entry = entry?;
        if ModuleFileKind::from_path(&entry.path()) == Some(ModuleFileKind::Runnable) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Every module-definition file under `root`, in file-name order. Paths are
/// normalized so they compare equal to resolved dependency paths.
///
/// Hidden entries below the root (`.terragrunt-cache`, `.git`, ...) are
/// skipped together with everything beneath them.
pub fn module_files(root: &Path) -> impl Iterator<Item = Result<ModuleFile>> + '_ {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(move |entry| match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    return None;
                }
                let kind = ModuleFileKind::from_path(entry.path())?;
                Some(Ok(ModuleFile {
                    path: normalize(entry.path()),
                    kind,
                }))
            }
            Err(source) => Some(Err(Error::Walk {
                root: root.to_path_buf(),
                source,
            })),
        })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Dependency paths declared by the module-definition file at `path`.
pub fn read_dependencies(path: &Path) -> Result<BTreeSet<PathBuf>> {
    let text = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    let deps = parse_dependencies(&text, base_dir);
    trace!(path = %path.display(), count = deps.len(), "extracted dependencies");
    Ok(deps)
}
