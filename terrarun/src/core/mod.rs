//! Deterministic, pure logic shared by the planner and the batch runner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (file text, paths, captured output) and return deterministic results.

pub mod dependencies;
pub mod output_filter;
pub mod path;
pub mod summary;
pub mod types;
