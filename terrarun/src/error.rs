//! Error types for planning and running operations.
//!
//! Every variant is fatal to the run and carries the directory, branch or
//! command it concerns. Cancellation is not an error; see
//! [`crate::batch::RunStatus`].

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::Command;

#[derive(Debug, Error)]
pub enum Error {
    /// A module-definition file could not be read.
    #[error("read module file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking the work root failed.
    #[error("walk module files under {}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A changed directory could not be classified.
    #[error("classify directory {}", dir.display())]
    Classify {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dependency propagation did not reach a fixed point.
    #[error("dependency cycle detected after {layers} layers (last reached {})", dir.display())]
    DependencyCycle { layers: usize, dir: PathBuf },

    /// Switching to or restoring a branch failed.
    #[error("checkout branch {branch}")]
    Checkout {
        branch: String,
        #[source]
        source: anyhow::Error,
    },

    /// The external tool could not be launched or exited unsuccessfully.
    #[error("running {command} in {}", dir.display())]
    CommandExecution {
        command: Command,
        dir: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Fetching the base branch failed after all attempts.
    #[error("fetch base branch {branch} from {url} ({attempts} attempts)")]
    Fetch {
        url: String,
        branch: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// Listing the files changed against the base branch failed.
    #[error("diff against base branch {branch}")]
    Diff {
        branch: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// True for failures raised while building the plan.
    pub fn is_planning(&self) -> bool {
        matches!(
            self,
            Error::Read { .. }
                | Error::Walk { .. }
                | Error::Classify { .. }
                | Error::DependencyCycle { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
