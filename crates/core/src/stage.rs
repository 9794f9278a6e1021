//! Index updates: whole-side conflict resolution and file staging.

use tracing::{debug, error, instrument};

use crate::errors::GitError;
use crate::process::{ExecutionRequest, GitRunner};
use crate::repository::Repository;
use crate::status::{FileChange, FileState, ManualConflictResolution, StatusEntryKind};

/// Resolve a conflict by keeping one side wholesale.
///
/// A kept side is checked out from its index stage before being added, since
/// the working tree holds our version of a conflicted binary file whichever
/// side wins. A deleted side is removed. Returns `false` without running git
/// if `file` is not a side-selection conflict.
#[instrument(skip(runner, repo, file), fields(path = %file.path))]
pub async fn stage_manual_conflict_resolution(
    runner: &dyn GitRunner,
    repo: &Repository,
    file: &FileChange,
    resolution: ManualConflictResolution,
) -> Result<bool, GitError> {
    let entry = match file.conflict() {
        Some(entry) => entry,
        None => {
            error!("file is not conflicted, cannot apply a manual resolution");
            return Ok(false);
        }
    };

    if entry.is_marker_conflict() {
        error!("file has conflict markers and must be resolved by editing");
        return Ok(false);
    }

    let path = file.path.as_str();
    if entry.side(resolution) == StatusEntryKind::Deleted {
        debug!(?resolution, "removing deleted side");
        runner
            .run(ExecutionRequest::new(["rm", "--quiet", "--", path], repo.path()))
            .await?;
        return Ok(true);
    }

    let side = match resolution {
        ManualConflictResolution::Ours => "--ours",
        ManualConflictResolution::Theirs => "--theirs",
    };
    debug!(?resolution, "checking out kept side");
    runner
        .run(ExecutionRequest::new(["checkout", side, "--", path], repo.path()))
        .await?;
    runner
        .run(ExecutionRequest::new(["add", "--", path], repo.path()))
        .await?;
    Ok(true)
}

/// Stage the complete working-tree state of `files`.
///
/// Renamed files have their old path removed from the index first, and
/// deleted files are force-removed so the deletion is recorded even when the
/// path is already gone from disk.
#[instrument(skip(runner, repo, files), fields(count = files.len()))]
pub async fn stage_files(
    runner: &dyn GitRunner,
    repo: &Repository,
    files: &[FileChange],
) -> Result<(), GitError> {
    let mut paths = Vec::new();
    let mut old_renamed = Vec::new();
    let mut deleted = Vec::new();

    for file in files {
        paths.push(file.path.as_str());
        match &file.state {
            FileState::Renamed { old_path } => old_renamed.push(old_path.as_str()),
            FileState::Deleted => deleted.push(file.path.as_str()),
            _ => {}
        }
    }

    update_index(runner, repo, &old_renamed, true).await?;
    update_index(runner, repo, &paths, false).await?;
    update_index(runner, repo, &deleted, true).await?;
    Ok(())
}

/// `git update-index --add --remove [--force-remove] --replace -z --stdin`
/// with the paths NUL-separated on stdin. No-op for an empty list.
async fn update_index(
    runner: &dyn GitRunner,
    repo: &Repository,
    paths: &[&str],
    force_remove: bool,
) -> Result<(), GitError> {
    if paths.is_empty() {
        return Ok(());
    }

    let mut args = vec!["update-index", "--add", "--remove"];
    if force_remove {
        args.push("--force-remove");
    }
    args.extend(["--replace", "-z", "--stdin"]);

    runner
        .run(ExecutionRequest::new(args, repo.path()).stdin(paths.join("\0")))
        .await?;
    Ok(())
}
