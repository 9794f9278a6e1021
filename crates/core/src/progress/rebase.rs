//! Progress for `git rebase` under the merge backend, which reports each
//! replayed commit as `Rebasing (N/M)`.

use std::sync::LazyLock;

use regex_lite::Regex;

use super::{normalize_fraction, ProgressEvent, ProgressParser, Step};
use crate::log::CommitOneLine;

static REBASING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Rebasing \((\d+)/(\d+)\)").expect("static regex"));

/// Maps step numbers onto the commits being replayed, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RebaseProgressParser {
    commits: Vec<CommitOneLine>,
}

impl RebaseProgressParser {
    pub fn new(commits: Vec<CommitOneLine>) -> Self {
        Self { commits }
    }

    /// Build the event for step `current` of `total`. The summary is empty
    /// when `current` falls outside the commit list.
    pub fn event_for(&self, current: usize, total: usize) -> ProgressEvent {
        let summary = current
            .checked_sub(1)
            .and_then(|i| self.commits.get(i))
            .map(|c| c.summary.clone())
            .unwrap_or_default();

        let fraction = if total == 0 {
            0.0
        } else {
            current as f64 / total as f64
        };

        ProgressEvent::Progress {
            title: format!("Rebasing commit {current} of {total} commits"),
            description: summary,
            fraction: normalize_fraction(fraction),
            step: Some(Step { current, total }),
        }
    }
}

impl ProgressParser for RebaseProgressParser {
    fn parse(&mut self, line: &str) -> Option<ProgressEvent> {
        let caps = REBASING_RE.captures(line)?;
        let current: usize = caps[1].parse().ok()?;
        let total: usize = caps[2].parse().ok()?;
        Some(self.event_for(current, total))
    }
}
