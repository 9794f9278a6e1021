//! Error types for the gitorch core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.
//!
//! Expected git failures (conflicts, unstaged files) never surface here: the
//! orchestrators turn them into result values. What remains is fatal: the
//! binary could not be launched, or it exited in a way nobody anticipated.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::process::{ExecutionResult, KnownError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from running the `git` binary.
#[derive(Debug, Error)]
pub enum GitError {
    /// The binary could not be started at all (missing binary, bad working
    /// directory). Never retried.
    #[error("failed to launch '{program}' in '{}': {source}", .working_dir.display())]
    Launch {
        program: String,
        working_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// git exited with a code outside the caller's success set.
    #[error("{0}")]
    Command(Box<CommandFailure>),

    /// The caller asked for something that cannot be carried out.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Generic I/O wrapper (stdin pipe, temp files).
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GitError {
    /// The classified failure signature, if this is a command failure that
    /// matched one.
    pub fn known_error(&self) -> Option<KnownError> {
        match self {
            GitError::Command(failure) => failure.kind,
            _ => None,
        }
    }

    /// The captured command output, if this error came from a finished process.
    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            GitError::Command(failure) => Some(&failure.result),
            _ => None,
        }
    }
}

/// Everything known about a git invocation that exited unexpectedly.
#[derive(Debug, Clone)]
pub struct CommandFailure {
    /// Arguments passed to git (without the binary name).
    pub args: Vec<String>,
    /// Captured output and exit code. Nothing is discarded.
    pub result: ExecutionResult,
    /// The signature matched in stderr (or stdout), if any.
    pub kind: Option<KnownError>,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`git {}` exited with code {}",
            self.args.join(" "),
            self.result.exit_code
        )?;
        if let Some(kind) = self.kind {
            write!(f, " ({})", kind.description())?;
        }
        let detail = if !self.result.stderr.trim().is_empty() {
            self.result.stderr.trim()
        } else {
            self.result.stdout.trim()
        };
        if !detail.is_empty() {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl From<CommandFailure> for GitError {
    fn from(failure: CommandFailure) -> Self {
        GitError::Command(Box::new(failure))
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(kind: Option<KnownError>, stderr: &str) -> CommandFailure {
        CommandFailure {
            args: vec!["rebase".into(), "main".into()],
            result: ExecutionResult {
                exit_code: 1,
                stdout: "some stdout".into(),
                stderr: stderr.into(),
                error: kind,
            },
            kind,
        }
    }

    #[test]
    fn test_command_failure_display() {
        let err: GitError = failure(None, "fatal: boom\n").into();
        assert_eq!(
            err.to_string(),
            "`git rebase main` exited with code 1: fatal: boom"
        );
    }

    #[test]
    fn test_command_failure_display_falls_back_to_stdout() {
        let err: GitError = failure(Some(KnownError::RebaseConflicts), "").into();
        let msg = err.to_string();
        assert!(msg.contains("some stdout"), "{}", msg);
        assert!(msg.contains("conflicts"), "{}", msg);
    }

    #[test]
    fn test_known_error_accessor() {
        let err: GitError = failure(Some(KnownError::BadRevision), "fatal: bad revision 'x'").into();
        assert_eq!(err.known_error(), Some(KnownError::BadRevision));
        assert_eq!(err.result().map(|r| r.exit_code), Some(1));

        let err = GitError::InvalidRequest("nope".into());
        assert_eq!(err.known_error(), None);
        assert!(err.result().is_none());
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = GitError::InvalidRequest("x".into()).into();
        assert!(matches!(core_err, CoreError::Git(_)));

        let core_err: CoreError = ConfigError::FileNotFound("/nope".into()).into();
        assert!(matches!(core_err, CoreError::Config(_)));
        assert_eq!(core_err.to_string(), "configuration file not found: /nope");
    }
}
