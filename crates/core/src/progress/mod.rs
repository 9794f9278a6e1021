//! Normalized progress reporting for long-running git commands.
//!
//! Each operation kind has its own parser because git formats progress
//! differently per command (and per version and locale). Parsing is best
//! effort: a line that is not recognized produces no event, and the caller
//! keeps whatever it last displayed.

pub mod git;
pub mod lfs;
pub mod rebase;

use serde::Serialize;

use crate::process::LiveProcess;

pub use git::{parse_progress_line, GitProgressParser, ProgressLine, ProgressStep};
pub use lfs::LfsProgressParser;
pub use rebase::RebaseProgressParser;

/// A 1-based position within a step-based operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Step {
    pub current: usize,
    pub total: usize,
}

/// One normalized progress update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        title: String,
        description: String,
        /// Always within `[0, 1]`, rounded to 2 decimals.
        fraction: f64,
        step: Option<Step>,
    },
    /// Recognized output that carries no measurable progress.
    Context { title: String, text: String },
}

impl ProgressEvent {
    pub fn progress(title: impl Into<String>, description: impl Into<String>, fraction: f64) -> Self {
        ProgressEvent::Progress {
            title: title.into(),
            description: description.into(),
            fraction: normalize_fraction(fraction),
            step: None,
        }
    }

    pub fn fraction(&self) -> Option<f64> {
        match self {
            ProgressEvent::Progress { fraction, .. } => Some(*fraction),
            ProgressEvent::Context { .. } => None,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ProgressEvent::Progress { title, .. } | ProgressEvent::Context { title, .. } => title,
        }
    }
}

/// Clamp to `[0, 1]` and round to 2 decimals. NaN becomes 0.
pub fn normalize_fraction(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    (value.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Turns one output line into at most one event.
pub trait ProgressParser: Send {
    fn parse(&mut self, line: &str) -> Option<ProgressEvent>;
}

/// Receives progress events in the order the subprocess produced them.
pub trait ProgressSink: Send {
    fn emit(&mut self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressEvent) + Send,
{
    fn emit(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Feed every stderr line of `live` through `parser` into `sink` until the
/// stream closes.
pub async fn forward_progress<P>(live: &mut LiveProcess, parser: &mut P, sink: &mut dyn ProgressSink)
where
    P: ProgressParser + ?Sized,
{
    while let Some(line) = live.next_line().await {
        if let Some(event) = parser.parse(&line) {
            sink.emit(event);
        }
    }
}
