//! Reconstruction of in-progress operations from git-directory files.
//!
//! git keeps no explicit record of "a rebase is running"; the presence of
//! `REBASE_HEAD` and the contents of `rebase-merge/` are the state. Every
//! reader here is read-only and treats a missing or unreadable file as "no
//! such operation" rather than as an error, since git (or the user) may be
//! rewriting these files while we look at them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::GitError;
use crate::log::{commits_between, CommitOneLine};
use crate::process::GitRunner;
use crate::progress::normalize_fraction;
use crate::repository::Repository;

const REBASE_HEAD: &str = "REBASE_HEAD";
const CHERRY_PICK_HEAD: &str = "CHERRY_PICK_HEAD";
const ORIG_HEAD: &str = "rebase-merge/orig-head";
const HEAD_NAME: &str = "rebase-merge/head-name";
const ONTO: &str = "rebase-merge/onto";
const MSGNUM: &str = "rebase-merge/msgnum";
const END: &str = "rebase-merge/end";

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Read access to files relative to a git directory.
pub trait MetadataView {
    fn exists(&self, relative: &str) -> bool;

    /// The file's contents, or `None` if it cannot be read for any reason.
    fn read(&self, relative: &str) -> Option<String>;
}

/// The real git directory on disk.
#[derive(Debug, Clone)]
pub struct FsMetadata {
    git_dir: PathBuf,
}

impl FsMetadata {
    pub fn new(git_dir: impl AsRef<Path>) -> Self {
        Self {
            git_dir: git_dir.as_ref().to_path_buf(),
        }
    }
}

impl MetadataView for FsMetadata {
    fn exists(&self, relative: &str) -> bool {
        self.git_dir.join(relative).exists()
    }

    fn read(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.git_dir.join(relative)).ok()
    }
}

/// An in-memory file set, for reconstructing state without a repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadata {
    files: BTreeMap<String, String>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, relative: &str, contents: &str) -> Self {
        self.files.insert(relative.to_string(), contents.to_string());
        self
    }
}

impl MetadataView for MemoryMetadata {
    fn exists(&self, relative: &str) -> bool {
        self.files.contains_key(relative)
    }

    fn read(&self, relative: &str) -> Option<String> {
        self.files.get(relative).cloned()
    }
}

// ---------------------------------------------------------------------------
// Rebase
// ---------------------------------------------------------------------------

/// The refs involved in a rebase that has stopped part way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebaseState {
    /// Tip of the branch before the rebase started.
    pub original_tip: String,
    /// Short name of the branch being rebased.
    pub target_branch: String,
    /// The commit being rebased onto.
    pub base_tip: String,
}

/// How far a stopped rebase has progressed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebaseSnapshot {
    /// 1-based index of the commit being replayed.
    pub position: usize,
    pub total: usize,
    /// Commits being replayed, oldest first.
    pub commits: Vec<CommitOneLine>,
    /// Summary of `commits[position - 1]`, or empty if out of range.
    pub current_summary: String,
    pub fraction: f64,
}

/// Step counters and tips read from `rebase-merge/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRefs {
    pub position: usize,
    pub total: usize,
    pub original_tip: String,
    pub base_tip: String,
}

pub fn is_rebase_in_progress(view: &dyn MetadataView) -> bool {
    view.exists(REBASE_HEAD)
}

/// The commit currently being replayed.
pub fn read_rebase_head(view: &dyn MetadataView) -> Option<String> {
    read_trimmed(view, REBASE_HEAD)
}

pub fn read_rebase_state(view: &dyn MetadataView) -> Option<RebaseState> {
    if !is_rebase_in_progress(view) {
        return None;
    }

    // Any missing file (including rebases driven by the apply backend, which
    // keeps its files elsewhere) means we cannot say.
    let original_tip = read_trimmed(view, ORIG_HEAD)?;
    let head_name = read_trimmed(view, HEAD_NAME)?;
    let base_tip = read_trimmed(view, ONTO)?;

    let target_branch = head_name
        .strip_prefix("refs/heads/")
        .unwrap_or(&head_name)
        .to_string();

    Some(RebaseState {
        original_tip,
        target_branch,
        base_tip,
    })
}

/// Step counters and tips, or `None` if any is missing or malformed.
pub fn read_snapshot_refs(view: &dyn MetadataView) -> Option<SnapshotRefs> {
    if !is_rebase_in_progress(view) {
        return None;
    }

    let msgnum = read_trimmed(view, MSGNUM)?;
    let end = read_trimmed(view, END)?;
    let original_tip = read_trimmed(view, ORIG_HEAD)?;
    let base_tip = read_trimmed(view, ONTO)?;

    let (position, total) = match (msgnum.parse::<usize>(), end.parse::<usize>()) {
        (Ok(p), Ok(t)) => (p, t),
        _ => {
            warn!(%msgnum, %end, "unable to parse rebase step counters");
            return None;
        }
    };

    if position == 0 || total == 0 || position > total {
        warn!(position, total, "rebase step counters out of range");
        return None;
    }

    Some(SnapshotRefs {
        position,
        total,
        original_tip,
        base_tip,
    })
}

/// Combine step counters with the replayed commit list. An empty list makes
/// the snapshot invalid.
pub fn build_snapshot(refs: SnapshotRefs, commits: Vec<CommitOneLine>) -> Option<RebaseSnapshot> {
    if commits.is_empty() {
        debug!("no commits between base and original tip");
        return None;
    }

    let current_summary = commits
        .get(refs.position - 1)
        .map(|c| c.summary.clone())
        .unwrap_or_default();

    Some(RebaseSnapshot {
        position: refs.position,
        total: refs.total,
        current_summary,
        fraction: normalize_fraction(refs.position as f64 / refs.total as f64),
        commits,
    })
}

/// Full snapshot of a stopped rebase, resolving the replayed commits through
/// git.
pub async fn read_rebase_snapshot(
    view: &dyn MetadataView,
    runner: &dyn GitRunner,
    repo: &Repository,
) -> Result<Option<RebaseSnapshot>, GitError> {
    let refs = match read_snapshot_refs(view) {
        Some(refs) => refs,
        None => return Ok(None),
    };

    let commits = commits_between(runner, repo, &refs.base_tip, &refs.original_tip).await?;
    Ok(commits.and_then(|commits| build_snapshot(refs, commits)))
}

// ---------------------------------------------------------------------------
// Cherry-pick
// ---------------------------------------------------------------------------

pub fn is_cherry_pick_in_progress(view: &dyn MetadataView) -> bool {
    view.exists(CHERRY_PICK_HEAD)
}

/// The commit a stopped cherry-pick is applying.
pub fn read_cherry_pick_head(view: &dyn MetadataView) -> Option<String> {
    read_trimmed(view, CHERRY_PICK_HEAD)
}

fn read_trimmed(view: &dyn MetadataView, relative: &str) -> Option<String> {
    view.read(relative).map(|s| s.trim().to_string())
}
