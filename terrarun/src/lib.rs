//! Plan and run IaC tool commands for the modules touched by a change set.
//!
//! Given the files changed against a base branch, the planner finds the module
//! directories that must be re-run, including every module that transitively
//! depends on them, and orders them into batches. The batch runner then
//! executes the tool batch by batch and collects a summary of the key output
//! lines. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure logic (types, path math, dependency extraction, output
//!   filtering, report rendering). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem walk, git, process
//!   execution, export). Isolated behind traits to enable fakes in tests.
//!
//! [`planner`] and [`batch`] coordinate the two.

pub mod batch;
pub mod cancel;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod planner;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
