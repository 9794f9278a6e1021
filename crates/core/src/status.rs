//! Working-tree status from `git status --porcelain=2 -z`.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::errors::GitError;
use crate::process::{ExecutionRequest, GitRunner};
use crate::repository::Repository;

/// How one side of an unmerged path left the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEntryKind {
    Added,
    UpdatedButUnmerged,
    Deleted,
}

/// Per-file conflict details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictEntry {
    /// The side being replayed onto ("ours").
    pub us: StatusEntryKind,
    /// The incoming side ("theirs").
    pub them: StatusEntryKind,
    /// Number of conflict markers left in a text conflict. `None` when the
    /// conflict can only be resolved by picking a side (binary content, or
    /// one side deleted the file).
    pub markers: Option<usize>,
}

impl ConflictEntry {
    pub fn is_marker_conflict(&self) -> bool {
        self.markers.is_some()
    }

    /// The entry kind for the chosen side.
    pub fn side(&self, resolution: ManualConflictResolution) -> StatusEntryKind {
        match resolution {
            ManualConflictResolution::Ours => self.us,
            ManualConflictResolution::Theirs => self.them,
        }
    }
}

/// Which side of a conflict to keep wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualConflictResolution {
    Ours,
    Theirs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileState {
    New,
    Modified,
    Deleted,
    Renamed { old_path: String },
    Copied,
    Conflicted(ConflictEntry),
    Untracked,
}

/// One changed path in the working tree or index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub state: FileState,
}

impl FileChange {
    pub fn new(path: impl Into<String>, state: FileState) -> Self {
        Self {
            path: path.into(),
            state,
        }
    }

    pub fn is_tracked(&self) -> bool {
        !matches!(self.state, FileState::Untracked)
    }

    pub fn conflict(&self) -> Option<&ConflictEntry> {
        match &self.state {
            FileState::Conflicted(entry) => Some(entry),
            _ => None,
        }
    }
}

/// Parsed `git status` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusResult {
    pub current_branch: Option<String>,
    pub current_tip: Option<String>,
    pub upstream: Option<String>,
    /// `(ahead, behind)` relative to the upstream.
    pub ahead_behind: Option<(u32, u32)>,
    pub files: Vec<FileChange>,
}

impl StatusResult {
    pub fn tracked(&self) -> impl Iterator<Item = &FileChange> {
        self.files.iter().filter(|f| f.is_tracked())
    }

    pub fn conflicted(&self) -> impl Iterator<Item = &FileChange> {
        self.files.iter().filter(|f| f.conflict().is_some())
    }
}

/// Read the current status. `Ok(None)` when git reports the directory is not
/// a repository (exit 128).
#[instrument(skip(runner, repo), fields(repo = %repo.path().display()))]
pub async fn get_status(
    runner: &dyn GitRunner,
    repo: &Repository,
) -> Result<Option<StatusResult>, GitError> {
    let result = runner
        .run(
            ExecutionRequest::new(
                ["status", "--untracked-files=all", "--branch", "--porcelain=2", "-z"],
                repo.path(),
            )
            .success_codes([0, 128]),
        )
        .await?;

    if result.exit_code == 128 {
        warn!(stderr = %result.stderr.trim(), "unable to read status");
        return Ok(None);
    }

    let mut status = parse_status(&result.stdout);
    for file in &mut status.files {
        if let FileState::Conflicted(ref mut entry) = file.state {
            if entry.markers.is_some() {
                entry.markers = count_conflict_markers(&repo.path().join(&file.path));
            }
        }
    }
    debug!(files = status.files.len(), "read status");
    Ok(Some(status))
}

/// Parse porcelain v2 output with NUL-terminated records. Conflict marker
/// counts are left at `Some(0)` for text-capable conflicts; the caller fills
/// them in from the working tree.
pub fn parse_status(output: &str) -> StatusResult {
    let mut status = StatusResult::default();
    let mut records = output.split('\0');

    while let Some(record) = records.next() {
        if record.is_empty() {
            continue;
        }
        if let Some(header) = record.strip_prefix("# ") {
            apply_header(&mut status, header);
            continue;
        }

        let (kind, rest) = match record.split_once(' ') {
            Some(pair) => pair,
            None => continue,
        };

        let change = match kind {
            "1" => ordinary_entry(rest),
            "2" => {
                // The original path follows as its own record.
                let old_path = records.next().unwrap_or_default().to_string();
                renamed_entry(rest, old_path)
            }
            "u" => unmerged_entry(rest),
            "?" => {
                status.files.retain(|f| f.path != rest);
                Some(FileChange::new(rest, FileState::Untracked))
            }
            _ => None,
        };

        if let Some(change) = change {
            status.files.push(change);
        }
    }

    status
}

fn apply_header(status: &mut StatusResult, header: &str) {
    if let Some(oid) = header.strip_prefix("branch.oid ") {
        if oid != "(initial)" {
            status.current_tip = Some(oid.to_string());
        }
    } else if let Some(head) = header.strip_prefix("branch.head ") {
        if head != "(detached)" {
            status.current_branch = Some(head.to_string());
        }
    } else if let Some(upstream) = header.strip_prefix("branch.upstream ") {
        status.upstream = Some(upstream.to_string());
    } else if let Some(ab) = header.strip_prefix("branch.ab ") {
        let mut parts = ab.split(' ');
        let ahead = parts.next().and_then(|p| p.strip_prefix('+')?.parse().ok());
        let behind = parts.next().and_then(|p| p.strip_prefix('-')?.parse().ok());
        if let (Some(ahead), Some(behind)) = (ahead, behind) {
            status.ahead_behind = Some((ahead, behind));
        }
    }
}

/// `<XY> <sub> <mH> <mI> <mW> <hH> <hI> <path>`
fn ordinary_entry(rest: &str) -> Option<FileChange> {
    let mut fields = rest.splitn(8, ' ');
    let xy = fields.next()?;
    let path = fields.nth(6)?;
    let (x, y) = split_xy(xy)?;

    // Added to the index then deleted from the working tree: nothing to commit.
    if x == 'A' && y == 'D' {
        return None;
    }

    let state = if x == 'A' || y == 'A' {
        FileState::New
    } else if x == 'D' || y == 'D' {
        FileState::Deleted
    } else {
        FileState::Modified
    };
    Some(FileChange::new(path, state))
}

/// `<XY> <sub> <mH> <mI> <mW> <hH> <hI> <X><score> <path>`
fn renamed_entry(rest: &str, old_path: String) -> Option<FileChange> {
    let mut fields = rest.splitn(9, ' ');
    let xy = fields.next()?;
    let path = fields.nth(7)?;
    let (x, y) = split_xy(xy)?;

    let state = if x == 'C' || y == 'C' {
        FileState::Copied
    } else {
        FileState::Renamed { old_path }
    };
    Some(FileChange::new(path, state))
}

/// `<XY> <sub> <m1> <m2> <m3> <mW> <h1> <h2> <h3> <path>`
fn unmerged_entry(rest: &str) -> Option<FileChange> {
    let mut fields = rest.splitn(10, ' ');
    let xy = fields.next()?;
    let path = fields.nth(8)?;
    let (us, them) = unmerged_sides(xy)?;

    let markers = match (us, them) {
        (StatusEntryKind::Added, StatusEntryKind::Added)
        | (StatusEntryKind::UpdatedButUnmerged, StatusEntryKind::UpdatedButUnmerged) => Some(0),
        _ => None,
    };

    Some(FileChange::new(
        path,
        FileState::Conflicted(ConflictEntry { us, them, markers }),
    ))
}

fn split_xy(xy: &str) -> Option<(char, char)> {
    let mut chars = xy.chars();
    let x = chars.next()?;
    let y = chars.next()?;
    Some((x, y))
}

/// Map an unmerged XY code onto `(us, them)`.
fn unmerged_sides(xy: &str) -> Option<(StatusEntryKind, StatusEntryKind)> {
    use StatusEntryKind::*;
    let sides = match xy {
        "DD" => (Deleted, Deleted),
        "AU" => (Added, UpdatedButUnmerged),
        "UD" => (UpdatedButUnmerged, Deleted),
        "UA" => (UpdatedButUnmerged, Added),
        "DU" => (Deleted, UpdatedButUnmerged),
        "AA" => (Added, Added),
        "UU" => (UpdatedButUnmerged, UpdatedButUnmerged),
        _ => return None,
    };
    Some(sides)
}

/// Count `<<<<<<<` marker lines in a conflicted file. Binary or unreadable
/// files yield `None`, which makes them side-selection conflicts.
fn count_conflict_markers(path: &Path) -> Option<usize> {
    let mut file = fs::File::open(path).ok()?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).ok()?;

    // git's own heuristic: a NUL in the first 8000 bytes means binary.
    if contents.iter().take(8000).any(|b| *b == 0) {
        return None;
    }

    let text = String::from_utf8_lossy(&contents);
    Some(text.lines().filter(|l| l.starts_with("<<<<<<<")).count())
}
