//! Known git failure signatures.
//!
//! git has no machine-readable error channel; its messages are the only
//! contract, and they move between versions and locales. The table below is
//! best effort: a miss yields `None`, which callers must treat as an
//! unanticipated failure rather than as success.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// A failure mode recognized from git's output text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownError {
    RebaseConflicts,
    MergeConflicts,
    UnresolvedConflicts,
    BadRevision,
    NotAGitRepository,
    LockFileAlreadyExists,
    NoRebaseInProgress,
    NoCherryPickInProgress,
    NoMergeToAbort,
    LocalChangesOverwritten,
    PushNotFastForward,
    RemoteDisconnection,
    HttpsAuthenticationFailed,
    SshRepositoryNotFound,
    SshAuthenticationFailed,
    HttpsRepositoryNotFound,
    HostDown,
    NothingToCommit,
    BranchAlreadyExists,
    UnrelatedHistories,
    PathDoesNotExist,
    InvalidObjectName,
    NoMatchingRemoteBranch,
}

impl KnownError {
    /// Short human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::RebaseConflicts => "rebase stopped on conflicts",
            Self::MergeConflicts => "merge conflicts",
            Self::UnresolvedConflicts => "unresolved conflicts remain in the index",
            Self::BadRevision => "bad revision",
            Self::NotAGitRepository => "not a git repository",
            Self::LockFileAlreadyExists => "a git lock file already exists",
            Self::NoRebaseInProgress => "no rebase in progress",
            Self::NoCherryPickInProgress => "no cherry-pick in progress",
            Self::NoMergeToAbort => "no merge to abort",
            Self::LocalChangesOverwritten => "local changes would be overwritten",
            Self::PushNotFastForward => "push rejected: not a fast-forward",
            Self::RemoteDisconnection => "the remote end hung up unexpectedly",
            Self::HttpsAuthenticationFailed => "HTTPS authentication failed",
            Self::SshRepositoryNotFound => "repository not found (SSH)",
            Self::SshAuthenticationFailed => "SSH authentication failed",
            Self::HttpsRepositoryNotFound => "repository not found (HTTPS)",
            Self::HostDown => "host is down",
            Self::NothingToCommit => "nothing to commit",
            Self::BranchAlreadyExists => "branch already exists",
            Self::UnrelatedHistories => "refusing to merge unrelated histories",
            Self::PathDoesNotExist => "path does not exist",
            Self::InvalidObjectName => "invalid object name",
            Self::NoMatchingRemoteBranch => "no matching remote branch",
        }
    }
}

impl std::fmt::Display for KnownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Ordered: the first matching entry wins.
const SIGNATURE_PATTERNS: &[(KnownError, &str)] = &[
    (
        KnownError::UnresolvedConflicts,
        r"You must edit all merge conflicts and then\s+mark them as resolved using git add|fatal: Exiting because of an unresolved conflict|error: Committing is not possible because you have unmerged files",
    ),
    (
        KnownError::RebaseConflicts,
        r"Resolve all conflicts manually, mark them as resolved with",
    ),
    (
        KnownError::MergeConflicts,
        r"Automatic merge failed; fix conflicts and then commit the result|After resolving the conflicts, mark them with|CONFLICT \([^)]+\): ",
    ),
    (
        KnownError::BadRevision,
        r"fatal: bad revision '.*'|fatal: ambiguous argument '.*': unknown revision",
    ),
    (KnownError::NotAGitRepository, r"fatal: [Nn]ot a git repository"),
    (
        KnownError::LockFileAlreadyExists,
        r"fatal: Unable to create '.+\.lock': File exists",
    ),
    (KnownError::NoRebaseInProgress, r"fatal: No rebase in progress\?"),
    (
        KnownError::NoCherryPickInProgress,
        r"error: no cherry-pick or revert in progress",
    ),
    (KnownError::NoMergeToAbort, r"fatal: There is no merge to abort"),
    (
        KnownError::LocalChangesOverwritten,
        r"error: (?:Your local changes to the following|The following untracked working tree) files would be overwritten by",
    ),
    (
        KnownError::PushNotFastForward,
        r"\((?:non-fast-forward|fetch first)\)\s*\nerror: failed to push some refs to",
    ),
    (
        KnownError::RemoteDisconnection,
        r"fatal: [Tt]he remote end hung up unexpectedly",
    ),
    (
        KnownError::HttpsAuthenticationFailed,
        r"fatal: Authentication failed for 'https?://",
    ),
    (KnownError::SshRepositoryNotFound, r"ERROR: Repository not found"),
    (
        KnownError::SshAuthenticationFailed,
        r"Permission denied \(publickey\)|fatal: Could not read from remote repository\.",
    ),
    (
        KnownError::HttpsRepositoryNotFound,
        r"fatal: repository '.+' not found",
    ),
    (KnownError::HostDown, r"Failed to connect to .+: Host is down"),
    (KnownError::NothingToCommit, r"nothing to commit"),
    (
        KnownError::BranchAlreadyExists,
        r"fatal: [Aa] branch named '.+' already exists",
    ),
    (
        KnownError::UnrelatedHistories,
        r"fatal: refusing to merge unrelated histories",
    ),
    (KnownError::PathDoesNotExist, r"fatal: path '.+' does not exist"),
    (KnownError::InvalidObjectName, r"fatal: [Ii]nvalid object name '.+'"),
    (
        KnownError::NoMatchingRemoteBranch,
        r"fatal: [Cc]ouldn't find remote ref",
    ),
];

static SIGNATURES: LazyLock<Vec<(KnownError, Regex)>> = LazyLock::new(|| {
    SIGNATURE_PATTERNS
        .iter()
        .map(|(kind, pattern)| (*kind, Regex::new(pattern).expect("static signature regex")))
        .collect()
});

/// Match a single block of output text against the signature table.
pub fn classify(text: &str) -> Option<KnownError> {
    if text.is_empty() {
        return None;
    }
    SIGNATURES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(kind, _)| *kind)
}

/// Classify a failed command: stderr first, stdout as the fallback.
pub fn classify_output(stderr: &str, stdout: &str) -> Option<KnownError> {
    classify(stderr).or_else(|| classify(stdout))
}
