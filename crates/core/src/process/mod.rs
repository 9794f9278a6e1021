//! git subprocess execution.
//!
//! [`GitProcess`] launches the binary, [`LiveProcess`] exposes stderr line by
//! line while it runs, and [`signatures`] recognizes the failure modes that
//! callers treat as expected outcomes.

mod lines;
mod runner;
pub mod signatures;

pub use lines::LineSplitter;
pub use runner::{
    check_exit, ExecutionRequest, ExecutionResult, GitProcess, GitRunner, LiveProcess,
};
pub use signatures::{classify, classify_output, KnownError};
