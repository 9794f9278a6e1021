//! Weighted-step parser for git's own progress output.
//!
//! git reports progress as `<title>: <value>` or
//! `<title>: NN% (<value>/<total>)[, <throughput>][, done.]`, redrawing the
//! line with `\r` as it advances. A command goes through a fixed sequence of
//! titled phases; each phase is given a weight so the overall fraction moves
//! smoothly across them.

use std::sync::LazyLock;

use regex_lite::Regex;

use super::{normalize_fraction, ProgressEvent, ProgressParser};

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3})% \((\d+)/(\d+)\)$").expect("static regex"));

/// A single decoded progress line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    pub title: String,
    pub value: u64,
    pub total: Option<u64>,
    pub percent: Option<u32>,
    pub done: bool,
    pub text: String,
}

/// Decode one line, or `None` if it is not in git's progress format.
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let title_end = line.rfind(": ")?;
    if title_end == 0 {
        return None;
    }
    let title = &line[..title_end];
    let rest = line[title_end + 2..].trim();
    if rest.is_empty() {
        return None;
    }

    let mut parts = rest.split(", ");
    let head = parts.next()?;

    let (value, total, percent) = if !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()) {
        (head.parse().ok()?, None, None)
    } else {
        let caps = PERCENT_RE.captures(head)?;
        (
            caps[2].parse().ok()?,
            Some(caps[3].parse().ok()?),
            Some(caps[1].parse().ok()?),
        )
    };

    let done = parts.any(|p| p == "done.");

    Some(ProgressLine {
        title: title.to_string(),
        value,
        total,
        percent,
        done,
        text: line.to_string(),
    })
}

/// A titled phase and its relative weight.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStep {
    pub title: String,
    pub weight: f64,
}

impl ProgressStep {
    pub fn new(title: impl Into<String>, weight: f64) -> Self {
        Self {
            title: title.into(),
            weight,
        }
    }
}

/// Tracks how far a command has moved through its phases.
///
/// Phases may be skipped (a fetch that needs no delta resolution) but are
/// never revisited: once a later phase has been seen, lines from an earlier
/// one are reported as context only.
#[derive(Debug, Clone)]
pub struct GitProgressParser {
    steps: Vec<ProgressStep>,
    step_index: usize,
}

impl GitProgressParser {
    /// Weights are normalized to sum to 1. Returns `None` for an empty step
    /// list or one whose weights do not sum to a positive number.
    pub fn new(steps: Vec<ProgressStep>) -> Option<Self> {
        let total: f64 = steps.iter().map(|s| s.weight).sum();
        if steps.is_empty() || total <= 0.0 || total.is_nan() {
            return None;
        }
        let steps = steps
            .into_iter()
            .map(|s| ProgressStep {
                weight: s.weight / total,
                title: s.title,
            })
            .collect();
        Some(Self {
            steps,
            step_index: 0,
        })
    }

    fn from_table(table: &[(&str, f64)]) -> Self {
        let total: f64 = table.iter().map(|(_, w)| w).sum();
        Self {
            steps: table
                .iter()
                .map(|(title, weight)| ProgressStep::new(*title, weight / total))
                .collect(),
            step_index: 0,
        }
    }

    pub fn checkout() -> Self {
        Self::from_table(&[("Checking out files", 1.0)])
    }

    pub fn clone_repository() -> Self {
        Self::fetch()
    }

    pub fn fetch() -> Self {
        Self::from_table(&[
            ("remote: Compressing objects", 10.0),
            ("Receiving objects", 90.0),
            ("Resolving deltas", 10.0),
        ])
    }

    pub fn pull() -> Self {
        Self::from_table(&[
            ("remote: Compressing objects", 10.0),
            ("Receiving objects", 90.0),
            ("Resolving deltas", 10.0),
            ("Checking out files", 10.0),
        ])
    }

    pub fn push() -> Self {
        Self::from_table(&[
            ("Compressing objects", 10.0),
            ("Writing objects", 90.0),
            ("remote: Resolving deltas", 5.0),
        ])
    }

    pub fn steps(&self) -> &[ProgressStep] {
        &self.steps
    }

    /// The overall fraction for a decoded line, advancing the current phase,
    /// or `None` if the line belongs to no reachable phase.
    pub fn advance(&mut self, progress: &ProgressLine) -> Option<f64> {
        let mut fraction = 0.0;
        for (i, step) in self.steps.iter().enumerate() {
            if i >= self.step_index && progress.title == step.title {
                if let Some(total) = progress.total.filter(|t| *t > 0) {
                    fraction += step.weight * (progress.value as f64 / total as f64);
                }
                self.step_index = i;
                return Some(normalize_fraction(fraction));
            }
            fraction += step.weight;
        }
        None
    }
}

impl ProgressParser for GitProgressParser {
    fn parse(&mut self, line: &str) -> Option<ProgressEvent> {
        let progress = parse_progress_line(line)?;
        match self.advance(&progress) {
            Some(fraction) => Some(ProgressEvent::Progress {
                title: progress.title,
                description: progress.text,
                fraction,
                step: None,
            }),
            None => Some(ProgressEvent::Context {
                title: progress.title,
                text: progress.text,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_steps() -> GitProgressParser {
        GitProgressParser::new(vec![
            ProgressStep::new("remote: Compressing objects", 0.5),
            ProgressStep::new("Receiving objects", 0.5),
        ])
        .unwrap()
    }

    #[test]
    fn test_requires_at_least_one_step() {
        assert!(GitProgressParser::new(Vec::new()).is_none());
        assert!(GitProgressParser::new(vec![ProgressStep::new("x", 0.0)]).is_none());
    }

    #[test]
    fn test_parse_percent_line() {
        let line = parse_progress_line("Receiving objects:  99% (166741/167587), 267.24 MiB | 2.40 MiB/s").unwrap();
        assert_eq!(line.title, "Receiving objects");
        assert_eq!(line.percent, Some(99));
        assert_eq!(line.value, 166741);
        assert_eq!(line.total, Some(167587));
        assert!(!line.done);
    }

    #[test]
    fn test_parse_value_only_line() {
        let line = parse_progress_line("remote: Counting objects: 167587").unwrap();
        assert_eq!(line.title, "remote: Counting objects");
        assert_eq!(line.value, 167587);
        assert_eq!(line.total, None);
        assert_eq!(line.percent, None);
    }

    #[test]
    fn test_parse_done_line() {
        let line = parse_progress_line("Resolving deltas: 100% (12/12), done.").unwrap();
        assert!(line.done);
        assert_eq!(line.value, 12);
    }

    #[test]
    fn test_parse_rejects_chatter() {
        assert!(parse_progress_line("From github.com:owner/repo").is_none());
        assert!(parse_progress_line("remote: Enumerating objects: lots").is_none());
        assert!(parse_progress_line(": 10").is_none());
        assert!(parse_progress_line("Receiving objects: ").is_none());
    }

    #[test]
    fn test_single_step_fraction() {
        let mut parser = GitProgressParser::new(vec![ProgressStep::new("remote: Compressing objects", 1.0)]).unwrap();
        let event = parser.parse("remote: Compressing objects:  72% (16/22)").unwrap();
        assert_eq!(event.fraction(), Some(normalize_fraction(16.0 / 22.0)));
    }

    #[test]
    fn test_several_steps_accumulate() {
        let mut parser = two_steps();
        let first = parser.parse("remote: Compressing objects:  72% (16/22)").unwrap();
        assert_eq!(first.fraction(), Some(normalize_fraction(16.0 / 22.0 / 2.0)));

        let second = parser
            .parse("Receiving objects:  99% (166741/167587), 267.24 MiB | 2.40 MiB/s")
            .unwrap();
        assert_eq!(
            second.fraction(),
            Some(normalize_fraction(0.5 + 166741.0 / 167587.0 / 2.0))
        );
    }

    #[test]
    fn test_steps_never_regress() {
        let mut parser = two_steps();
        parser.parse("Receiving objects:  10% (1/10)").unwrap();
        let event = parser.parse("remote: Compressing objects:  72% (16/22)").unwrap();
        assert!(matches!(event, ProgressEvent::Context { .. }), "{event:?}");
    }

    #[test]
    fn test_unknown_title_is_context() {
        let mut parser = GitProgressParser::fetch();
        let event = parser.parse("remote: Counting objects: 42").unwrap();
        assert_eq!(
            event,
            ProgressEvent::Context {
                title: "remote: Counting objects".into(),
                text: "remote: Counting objects: 42".into(),
            }
        );
    }

    #[test]
    fn test_unparseable_line_yields_nothing() {
        let mut parser = GitProgressParser::fetch();
        assert!(parser.parse("warning: redirecting to https://example.com/").is_none());
    }

    #[test]
    fn test_push_table_weights() {
        let parser = GitProgressParser::push();
        let weights: Vec<f64> = parser.steps().iter().map(|s| s.weight).collect();
        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(parser.steps()[1].title, "Writing objects");
    }

    #[test]
    fn test_pull_reaches_one_on_checkout_done() {
        let mut parser = GitProgressParser::pull();
        let event = parser.parse("Checking out files: 100% (5/5), done.").unwrap();
        assert_eq!(event.fraction(), Some(1.0));
    }
}
