//! gitorch core library.
//!
//! This crate drives the `git` command-line program through multi-step
//! operations: process execution with failure classification, progress
//! parsing, repository state inspection, conflict staging, and the rebase
//! and cherry-pick orchestrators built on top of them.

pub mod cherry_pick;
pub mod config;
pub mod errors;
pub mod log;
pub mod process;
pub mod progress;
pub mod rebase;
pub mod remote;
pub mod repository;
pub mod stage;
pub mod state;
pub mod status;

#[cfg(test)]
mod test_support;

// Re-exports for convenience.
pub use cherry_pick::{CherryPickResult, CherryPicker};
pub use config::EngineConfig;
pub use errors::{CoreError, GitError};
pub use process::{GitProcess, GitRunner};
pub use progress::{ProgressEvent, ProgressSink};
pub use rebase::{RebaseResult, Rebaser};
pub use remote::RemoteOps;
pub use repository::Repository;
