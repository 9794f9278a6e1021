//! Rebase orchestration.
//!
//! A rebase is a multi-step operation: git replays commits one at a time and
//! may stop on any of them. Each call here drives git from wherever the
//! repository currently is to the next stopping point, then reports why it
//! stopped as a [`RebaseResult`]. Expected stops (conflicts, unstaged files)
//! are results; anything git did that we cannot explain is an error.

pub mod todo;

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, LazyLock};

use regex_lite::Regex;
use serde::Serialize;
use tracing::{error, info, instrument, warn, Span};

use crate::errors::GitError;
use crate::log::{commits_between, commits_to_head, merges_to_head, CommitOneLine};
use crate::process::{ExecutionRequest, ExecutionResult, GitRunner, KnownError};
use crate::progress::{forward_progress, ProgressParser, ProgressSink, RebaseProgressParser};
use crate::repository::Repository;
use crate::stage::{stage_files, stage_manual_conflict_resolution};
use crate::state::{self, RebaseSnapshot, RebaseState};
use crate::status::{get_status, FileChange, ManualConflictResolution};

pub use todo::{TodoAction, TodoEntry, TodoList};

static UP_TO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Current branch .+ is up to date").expect("static regex"));

/// Why a multi-step operation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebaseResult {
    /// Every step was applied.
    CompletedWithoutError,
    /// Nothing to replay; the branch already contains the base.
    AlreadyUpToDate,
    /// A step stopped on conflicts that need resolving.
    ConflictsEncountered,
    /// git refused to continue because conflicted files are not staged.
    OutstandingFilesNotStaged,
    /// The operation could not proceed: status or step metadata was
    /// unavailable.
    Aborted,
    /// The request itself could not be carried out. The reason is logged.
    Error,
}

impl RebaseResult {
    pub fn as_str(self) -> &'static str {
        match self {
            RebaseResult::CompletedWithoutError => "completed",
            RebaseResult::AlreadyUpToDate => "already up to date",
            RebaseResult::ConflictsEncountered => "conflicts encountered",
            RebaseResult::OutstandingFilesNotStaged => "outstanding files not staged",
            RebaseResult::Aborted => "aborted",
            RebaseResult::Error => "error",
        }
    }
}

impl std::fmt::Display for RebaseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a finished rebase command onto a result. Unclassified failures are
/// returned as errors, never folded into a result.
pub fn classify_rebase(outcome: Result<ExecutionResult, GitError>) -> Result<RebaseResult, GitError> {
    match outcome {
        Ok(result) if UP_TO_DATE_RE.is_match(&result.stdout) => Ok(RebaseResult::AlreadyUpToDate),
        Ok(_) => Ok(RebaseResult::CompletedWithoutError),
        Err(e) => match e.known_error() {
            Some(KnownError::RebaseConflicts) | Some(KnownError::MergeConflicts) => {
                Ok(RebaseResult::ConflictsEncountered)
            }
            Some(KnownError::UnresolvedConflicts) => Ok(RebaseResult::OutstandingFilesNotStaged),
            _ => Err(e),
        },
    }
}

/// Drives rebases in one repository.
///
/// Callers must not run two operations on the same repository at once; git's
/// lock files would make one of them fail.
pub struct Rebaser {
    runner: Arc<dyn GitRunner>,
    repo: Repository,
    span: Span,
}

impl Rebaser {
    pub fn new(runner: Arc<dyn GitRunner>, repo: Repository) -> Self {
        let span = tracing::info_span!("rebase", repo = %repo.path().display());
        Self { runner, repo, span }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Rebase `target` onto `base`.
    ///
    /// With a sink, the commits to replay are resolved first so progress can
    /// name them; if the range does not resolve nothing is launched and the
    /// result is [`RebaseResult::Error`].
    #[instrument(parent = &self.span, skip(self, sink))]
    pub async fn start(
        &self,
        base: &str,
        target: &str,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<RebaseResult, GitError> {
        let request = ExecutionRequest::new(
            ["-c", "rebase.backend=merge", "rebase", base, target],
            self.repo.path(),
        );

        let outcome = match sink {
            Some(sink) => {
                let commits = match commits_between(self.runner.as_ref(), &self.repo, base, target).await? {
                    Some(commits) => commits,
                    None => {
                        error!(base, target, "unable to resolve commits to rebase");
                        return Ok(RebaseResult::Error);
                    }
                };
                info!(base, target, commits = commits.len(), "starting rebase");
                let mut parser = RebaseProgressParser::new(commits);
                self.run_with_progress(request, &mut parser, sink).await
            }
            None => {
                info!(base, target, "starting rebase");
                self.runner.run(request).await
            }
        };

        let result = classify_rebase(outcome)?;
        info!(%result, "rebase stopped");
        Ok(result)
    }

    /// Resume a stopped rebase.
    ///
    /// Manual resolutions are applied first, then every other tracked file in
    /// `files` is staged. If nothing is left to commit the current step is
    /// skipped instead of committed empty.
    #[instrument(parent = &self.span, skip_all, fields(files = files.len(), resolutions = manual_resolutions.len()))]
    pub async fn continue_rebase(
        &self,
        files: &[FileChange],
        manual_resolutions: &BTreeMap<String, ManualConflictResolution>,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<RebaseResult, GitError> {
        let runner = self.runner.as_ref();

        for (path, resolution) in manual_resolutions {
            match files.iter().find(|f| &f.path == path) {
                Some(file) => {
                    stage_manual_conflict_resolution(runner, &self.repo, file, *resolution).await?;
                }
                None => {
                    error!(path = %path, "manual resolution given for a file that is not in the change set");
                }
            }
        }

        let others: Vec<FileChange> = files
            .iter()
            .filter(|f| f.is_tracked() && !manual_resolutions.contains_key(&f.path))
            .cloned()
            .collect();
        stage_files(runner, &self.repo, &others).await?;

        let status = match get_status(runner, &self.repo).await? {
            Some(status) => status,
            None => {
                warn!("unable to read status after staging, not continuing");
                return Ok(RebaseResult::Aborted);
            }
        };

        let view = self.repo.metadata();
        let current = match state::read_rebase_head(&view) {
            Some(sha) => sha,
            None => {
                warn!("no REBASE_HEAD, not continuing");
                return Ok(RebaseResult::Aborted);
            }
        };

        let mut parser = match sink {
            Some(_) => match self.snapshot().await? {
                Some(snapshot) => Some(RebaseProgressParser::new(snapshot.commits)),
                None => {
                    warn!("unable to read rebase progress, not continuing");
                    return Ok(RebaseResult::Aborted);
                }
            },
            None => None,
        };

        let request = if status.tracked().next().is_none() {
            warn!(commit = %current, "no tracked changes left, skipping this commit");
            ExecutionRequest::new(["rebase", "--skip"], self.repo.path())
        } else {
            ExecutionRequest::new(["rebase", "--continue"], self.repo.path())
        }
        .env("GIT_EDITOR", ":");

        let outcome = match (sink, parser.as_mut()) {
            (Some(sink), Some(parser)) => self.run_with_progress(request, parser, sink).await,
            _ => runner.run(request).await,
        };

        let result = classify_rebase(outcome)?;
        info!(%result, "rebase stopped");
        Ok(result)
    }

    /// Abandon the rebase in progress.
    #[instrument(parent = &self.span, skip(self))]
    pub async fn abort(&self) -> Result<(), GitError> {
        info!("aborting rebase");
        self.runner
            .run(ExecutionRequest::new(["rebase", "--abort"], self.repo.path()))
            .await?;
        Ok(())
    }

    /// Run an interactive rebase whose plan is `todo`.
    ///
    /// `last_retained` is the newest commit left untouched; `None` rewrites
    /// from the root. `editor` replaces the commit message editor (for
    /// squash); otherwise messages are kept as they are. A sink requires
    /// `commits` so progress can name each step. Ranges containing merge
    /// commits are refused with [`RebaseResult::Error`].
    #[instrument(parent = &self.span, skip(self, todo, sink, commits), fields(steps = todo.entries().len()))]
    pub async fn start_interactive(
        &self,
        todo: &TodoList,
        last_retained: Option<&str>,
        sink: Option<&mut dyn ProgressSink>,
        commits: Option<Vec<CommitOneLine>>,
        editor: Option<&str>,
    ) -> Result<RebaseResult, GitError> {
        let mut parser = match (&sink, commits) {
            (Some(_), None) => {
                error!("progress requested without the commits being rewritten");
                return Ok(RebaseResult::Error);
            }
            (Some(_), Some(commits)) => Some(RebaseProgressParser::new(commits)),
            (None, _) => None,
        };

        // The plan only picks; a merge in the rewritten range cannot be replayed.
        let merges = merges_to_head(self.runner.as_ref(), &self.repo, last_retained).await?;
        if let Some(merge) = merges.first() {
            error!(%merge, count = merges.len(), "range to rewrite contains merge commits");
            return Ok(RebaseResult::Error);
        }

        let mut todo_file = tempfile::Builder::new().prefix("gitorch-todo").tempfile()?;
        todo_file.write_all(todo.to_string().as_bytes())?;
        todo_file.flush()?;

        let sequence_editor = format!(
            "sequence.editor=cat \"{}\" >",
            todo_file.path().display()
        );
        let request = ExecutionRequest::new(
            [
                "-c",
                sequence_editor.as_str(),
                "rebase",
                "-i",
                "--keep-empty",
                last_retained.unwrap_or("--root"),
            ],
            self.repo.path(),
        )
        .env("GIT_EDITOR", editor.unwrap_or(":"));

        info!(last_retained = last_retained.unwrap_or("(root)"), "starting interactive rebase");

        let outcome = match (sink, parser.as_mut()) {
            (Some(sink), Some(parser)) => self.run_with_progress(request, parser, sink).await,
            _ => self.runner.run(request).await,
        };

        // The todo file must outlive the rebase; dropping it removes it.
        drop(todo_file);

        let result = classify_rebase(outcome)?;
        info!(%result, "interactive rebase stopped");
        Ok(result)
    }

    /// Move `to_move` directly above `before` in history (to the top when
    /// `before` is `None`).
    #[instrument(parent = &self.span, skip(self, sink))]
    pub async fn reorder(
        &self,
        to_move: &[String],
        before: Option<&str>,
        last_retained: Option<&str>,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<RebaseResult, GitError> {
        let log = commits_to_head(self.runner.as_ref(), &self.repo, last_retained).await?;
        let todo = match TodoList::reorder(&log, to_move, before) {
            Ok(todo) => todo,
            Err(e) => {
                error!(error = %e, "unable to plan reorder");
                return Ok(RebaseResult::Error);
            }
        };

        let mut commits = log;
        commits.reverse();
        self.start_interactive(&todo, last_retained, sink, Some(commits), None)
            .await
    }

    /// Fold `to_squash` into `onto`, giving the result `message`. An empty
    /// message keeps git's combined message.
    #[instrument(parent = &self.span, skip(self, to_squash, onto, message, sink), fields(onto = %onto.sha, count = to_squash.len()))]
    pub async fn squash(
        &self,
        to_squash: &[CommitOneLine],
        onto: &CommitOneLine,
        last_retained: Option<&str>,
        message: &str,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<RebaseResult, GitError> {
        let log = commits_to_head(self.runner.as_ref(), &self.repo, last_retained).await?;
        let todo = match TodoList::squash(&log, to_squash, onto) {
            Ok(todo) => todo,
            Err(e) => {
                error!(error = %e, "unable to plan squash");
                return Ok(RebaseResult::Error);
            }
        };

        let mut message_file = tempfile::Builder::new().prefix("gitorch-squash-msg").tempfile()?;
        message_file.write_all(message.as_bytes())?;
        message_file.flush()?;
        let editor = format!("cat \"{}\" >", message_file.path().display());

        let mut commits = to_squash.to_vec();
        commits.push(onto.clone());

        let result = self
            .start_interactive(
                &todo,
                last_retained,
                sink,
                Some(commits),
                (!message.is_empty()).then_some(editor.as_str()),
            )
            .await;
        drop(message_file);
        result
    }

    /// Refs of the rebase in progress, if any.
    pub fn state(&self) -> Option<RebaseState> {
        state::read_rebase_state(&self.repo.metadata())
    }

    /// Step-by-step progress of the rebase in progress, if any.
    pub async fn snapshot(&self) -> Result<Option<RebaseSnapshot>, GitError> {
        state::read_rebase_snapshot(&self.repo.metadata(), self.runner.as_ref(), &self.repo).await
    }

    async fn run_with_progress(
        &self,
        request: ExecutionRequest,
        parser: &mut dyn ProgressParser,
        sink: &mut dyn ProgressSink,
    ) -> Result<ExecutionResult, GitError> {
        let mut live = self.runner.spawn(request)?;
        forward_progress(&mut live, parser, sink).await;
        live.wait().await
    }
}
