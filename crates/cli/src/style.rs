//! Shared styling utilities for the CLI.

use console::Style;

use gitorch_core::RebaseResult;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// First seven characters of a commit id.
pub fn short_sha(sha: &str) -> &str {
    sha.char_indices()
        .nth(7)
        .map_or(sha, |(end, _)| &sha[..end])
}

/// One line describing where an operation stopped.
pub fn outcome(operation: &str, result: RebaseResult) -> String {
    match result {
        RebaseResult::CompletedWithoutError => success(&format!("{operation} completed")),
        RebaseResult::AlreadyUpToDate => success("Already up to date"),
        RebaseResult::ConflictsEncountered => warn(&format!(
            "{operation} stopped on conflicts. Resolve them, then run 'gitorch continue'"
        )),
        RebaseResult::OutstandingFilesNotStaged => warn(
            "Conflicted files are still unresolved. Edit them or pass --ours/--theirs to 'gitorch continue'",
        ),
        RebaseResult::Aborted => error(&format!(
            "{operation} could not continue: repository state was unreadable"
        )),
        RebaseResult::Error => error(&format!("{operation} could not be started")),
    }
}
