//! Commit listing.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::errors::GitError;
use crate::process::{ExecutionRequest, GitRunner, KnownError};
use crate::repository::Repository;

/// A commit identified by its full id and subject line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOneLine {
    pub sha: String,
    pub summary: String,
}

impl CommitOneLine {
    pub fn new(sha: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            summary: summary.into(),
        }
    }
}

/// Commits reachable from `target` but not from `base`, oldest first.
///
/// `Ok(None)` when either revision cannot be resolved.
#[instrument(skip(runner, repo), fields(repo = %repo.path().display()))]
pub async fn commits_between(
    runner: &dyn GitRunner,
    repo: &Repository,
    base: &str,
    target: &str,
) -> Result<Option<Vec<CommitOneLine>>, GitError> {
    let range = format!("{base}..{target}");
    let request = ExecutionRequest::new(
        [
            "rev-list",
            range.as_str(),
            "--reverse",
            "--oneline",
            "--no-abbrev-commit",
            "--",
        ],
        repo.path(),
    );

    match runner.run(request).await {
        Ok(result) => {
            let commits = parse_oneline(&result.stdout);
            debug!(count = commits.len(), %range, "resolved commits");
            Ok(Some(commits))
        }
        Err(e) if e.known_error() == Some(KnownError::BadRevision) => {
            debug!(%range, "range does not resolve");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// History reachable from `HEAD`, newest first. With `since`, only commits
/// after it (`since..HEAD`); without, the whole history.
#[instrument(skip(runner, repo), fields(repo = %repo.path().display()))]
pub async fn commits_to_head(
    runner: &dyn GitRunner,
    repo: &Repository,
    since: Option<&str>,
) -> Result<Vec<CommitOneLine>, GitError> {
    let range = match since {
        Some(since) => format!("{since}..HEAD"),
        None => "HEAD".to_string(),
    };
    let result = runner
        .run(ExecutionRequest::new(
            ["log", range.as_str(), "--format=%H %s", "--"],
            repo.path(),
        ))
        .await?;
    Ok(parse_oneline(&result.stdout))
}

/// Merge commits in the same range as [`commits_to_head`], newest first.
#[instrument(skip(runner, repo), fields(repo = %repo.path().display()))]
pub async fn merges_to_head(
    runner: &dyn GitRunner,
    repo: &Repository,
    since: Option<&str>,
) -> Result<Vec<String>, GitError> {
    let range = match since {
        Some(since) => format!("{since}..HEAD"),
        None => "HEAD".to_string(),
    };
    let result = runner
        .run(ExecutionRequest::new(
            ["log", range.as_str(), "--merges", "--format=%H", "--"],
            repo.path(),
        ))
        .await?;
    Ok(result
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Parse `<sha> <subject>` lines.
pub fn parse_oneline(output: &str) -> Vec<CommitOneLine> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| match line.split_once(' ') {
            Some((sha, summary)) => CommitOneLine::new(sha, summary),
            None => CommitOneLine::new(line, ""),
        })
        .collect()
}
