//! Interactive rebase todo lists.
//!
//! git replays commits according to a plan it normally opens in an editor.
//! We generate the plan ourselves and substitute it for git's own, which
//! lets history rewrites (reorder, squash) run without any interaction.

use std::collections::HashSet;
use std::fmt;

use crate::errors::GitError;
use crate::log::CommitOneLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoAction {
    Pick,
    Squash,
    Fixup,
    Reword,
    Drop,
}

impl TodoAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TodoAction::Pick => "pick",
            TodoAction::Squash => "squash",
            TodoAction::Fixup => "fixup",
            TodoAction::Reword => "reword",
            TodoAction::Drop => "drop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoEntry {
    pub action: TodoAction,
    pub commit: CommitOneLine,
}

/// An ordered replay plan, oldest commit first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoList {
    entries: Vec<TodoEntry>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: TodoAction, commit: &CommitOneLine) {
        self.entries.push(TodoEntry {
            action,
            commit: commit.clone(),
        });
    }

    pub fn entries(&self) -> &[TodoEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move `to_move` so that, in newest-first history, they sit directly
    /// above `before`. With no anchor they become the newest commits.
    ///
    /// `log` is newest first, as `git log` prints it. Moved commits keep
    /// their relative order.
    pub fn reorder(
        log: &[CommitOneLine],
        to_move: &[String],
        before: Option<&str>,
    ) -> Result<Self, GitError> {
        if to_move.is_empty() {
            return Err(GitError::InvalidRequest("no commits provided to reorder".into()));
        }
        if log.is_empty() {
            return Err(GitError::InvalidRequest(
                "no commits found after the last retained commit".into(),
            ));
        }

        let moving: HashSet<&str> = to_move.iter().map(String::as_str).collect();
        let mut todo = TodoList::new();
        let mut found_anchor = false;
        // Moved commits seen before the anchor, held back until it appears.
        let mut held = Vec::new();
        // Everything after the anchor, replayed once the moved commits are in.
        let mut after_anchor = Vec::new();

        for commit in log.iter().rev() {
            if moving.contains(commit.sha.as_str()) {
                if found_anchor {
                    todo.push(TodoAction::Pick, commit);
                } else {
                    held.push(commit);
                }
                continue;
            }

            if Some(commit.sha.as_str()) == before {
                found_anchor = true;
                todo.push(TodoAction::Pick, commit);
                for moved in held.drain(..) {
                    todo.push(TodoAction::Pick, moved);
                }
                continue;
            }

            if found_anchor {
                after_anchor.push(commit);
            } else {
                todo.push(TodoAction::Pick, commit);
            }
        }

        for commit in after_anchor {
            todo.push(TodoAction::Pick, commit);
        }

        match before {
            None => {
                for moved in held {
                    todo.push(TodoAction::Pick, moved);
                }
            }
            Some(anchor) if !found_anchor => {
                return Err(GitError::InvalidRequest(format!(
                    "commit {anchor} is not in the log; reordering would drop the moved commits"
                )));
            }
            Some(_) => {}
        }

        Ok(todo)
    }

    /// Fold `to_squash` into `onto`. Every other commit in `log` (newest
    /// first) is picked unchanged.
    pub fn squash(
        log: &[CommitOneLine],
        to_squash: &[CommitOneLine],
        onto: &CommitOneLine,
    ) -> Result<Self, GitError> {
        if to_squash.is_empty() {
            return Err(GitError::InvalidRequest("no commits provided to squash".into()));
        }
        if !log.iter().any(|c| c.sha == onto.sha) {
            return Err(GitError::InvalidRequest(format!(
                "commit {} to squash onto is not in the log",
                onto.sha
            )));
        }
        if to_squash.iter().any(|c| c.sha == onto.sha) {
            return Err(GitError::InvalidRequest(format!(
                "commit {} cannot be squashed onto itself",
                onto.sha
            )));
        }
        if let Some(missing) = to_squash
            .iter()
            .find(|c| !log.iter().any(|l| l.sha == c.sha))
        {
            return Err(GitError::InvalidRequest(format!(
                "commit {} to squash is not in the log",
                missing.sha
            )));
        }

        let squashing: HashSet<&str> = to_squash.iter().map(|c| c.sha.as_str()).collect();
        let mut todo = TodoList::new();

        for commit in log.iter().rev() {
            if squashing.contains(commit.sha.as_str()) {
                continue;
            }
            if commit.sha == onto.sha {
                todo.push(TodoAction::Pick, commit);
                for squashed in to_squash {
                    todo.push(TodoAction::Squash, squashed);
                }
                continue;
            }
            todo.push(TodoAction::Pick, commit);
        }

        Ok(todo)
    }
}

impl fmt::Display for TodoList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "{} {} {}",
                entry.action.as_str(),
                entry.commit.sha,
                entry.commit.summary
            )?;
        }
        Ok(())
    }
}
