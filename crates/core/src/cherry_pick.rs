//! Cherry-pick orchestration. Follows the same stop-and-resume shape as
//! rebase and reports through the same result type.

use std::sync::Arc;

use tracing::{info, instrument, warn, Span};

use crate::errors::GitError;
use crate::process::{ExecutionRequest, ExecutionResult, GitRunner, KnownError};
use crate::rebase::RebaseResult;
use crate::repository::Repository;
use crate::stage::stage_files;
use crate::state;
use crate::status::{get_status, FileChange};

pub type CherryPickResult = RebaseResult;

/// Map a finished cherry-pick command onto a result.
pub fn classify_cherry_pick(
    outcome: Result<ExecutionResult, GitError>,
) -> Result<CherryPickResult, GitError> {
    match outcome {
        Ok(_) => Ok(RebaseResult::CompletedWithoutError),
        Err(e) => match e.known_error() {
            Some(KnownError::MergeConflicts) | Some(KnownError::RebaseConflicts) => {
                Ok(RebaseResult::ConflictsEncountered)
            }
            Some(KnownError::UnresolvedConflicts) => Ok(RebaseResult::OutstandingFilesNotStaged),
            _ => Err(e),
        },
    }
}

pub struct CherryPicker {
    runner: Arc<dyn GitRunner>,
    repo: Repository,
    span: Span,
}

impl CherryPicker {
    pub fn new(runner: Arc<dyn GitRunner>, repo: Repository) -> Self {
        let span = tracing::info_span!("cherry_pick", repo = %repo.path().display());
        Self { runner, repo, span }
    }

    /// Apply the commits in `revision_range` (a single commit or `a..b`)
    /// onto the current branch.
    #[instrument(parent = &self.span, skip(self))]
    pub async fn cherry_pick(&self, revision_range: &str) -> Result<CherryPickResult, GitError> {
        info!("starting cherry-pick");
        let outcome = self
            .runner
            .run(ExecutionRequest::new(
                ["cherry-pick", revision_range],
                self.repo.path(),
            ))
            .await;
        let result = classify_cherry_pick(outcome)?;
        info!(%result, "cherry-pick stopped");
        Ok(result)
    }

    /// Stage every tracked file in `files` and resume.
    #[instrument(parent = &self.span, skip_all, fields(files = files.len()))]
    pub async fn continue_cherry_pick(&self, files: &[FileChange]) -> Result<CherryPickResult, GitError> {
        let runner = self.runner.as_ref();
        let tracked: Vec<FileChange> = files.iter().filter(|f| f.is_tracked()).cloned().collect();
        stage_files(runner, &self.repo, &tracked).await?;

        if get_status(runner, &self.repo).await?.is_none() {
            warn!("unable to read status after staging, not continuing");
            return Ok(RebaseResult::Aborted);
        }

        let current = match state::read_cherry_pick_head(&self.repo.metadata()) {
            Some(sha) => sha,
            None => {
                warn!("no CHERRY_PICK_HEAD, not continuing");
                return Ok(RebaseResult::Aborted);
            }
        };

        info!(commit = %current, "continuing cherry-pick");
        let outcome = runner
            .run(
                ExecutionRequest::new(["cherry-pick", "--continue"], self.repo.path())
                    .env("GIT_EDITOR", ":"),
            )
            .await;
        let result = classify_cherry_pick(outcome)?;
        info!(%result, "cherry-pick stopped");
        Ok(result)
    }

    #[instrument(parent = &self.span, skip(self))]
    pub async fn abort_cherry_pick(&self) -> Result<(), GitError> {
        info!("aborting cherry-pick");
        self.runner
            .run(ExecutionRequest::new(["cherry-pick", "--abort"], self.repo.path()))
            .await?;
        Ok(())
    }

    pub fn current_commit(&self) -> Option<String> {
        state::read_cherry_pick_head(&self.repo.metadata())
    }
}
