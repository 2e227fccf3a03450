//! Side-effecting adapters: filesystem, git, subprocesses and export.

pub mod config;
pub mod executor;
pub mod export;
pub mod git;
pub mod modules;
pub mod process;
