//! Progress for large-file transfers.
//!
//! git-lfs appends one line per update to the file named by
//! `GIT_LFS_PROGRESS`:
//!
//! ```text
//! <direction> <current>/<total files> <transferred>/<total bytes> <name>
//! ```
//!
//! Byte counts are aggregated across every file seen so far, keyed by the
//! file's index, so the reported fraction covers the whole transfer.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex_lite::Regex;

use super::{normalize_fraction, ProgressEvent, ProgressParser};

static LFS_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s(\d+)/(\d+)\s(\d+)/(\d+)\s(.+)$").expect("static regex")
});

#[derive(Debug, Clone, Copy, Default)]
struct FileTransfer {
    transferred: u64,
    total: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LfsProgressParser {
    files: BTreeMap<u64, FileTransfer>,
}

impl LfsProgressParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressParser for LfsProgressParser {
    fn parse(&mut self, line: &str) -> Option<ProgressEvent> {
        let caps = LFS_LINE_RE.captures(line)?;
        let direction = &caps[1];
        let current: u64 = caps[2].parse().ok()?;
        let total_files: u64 = caps[3].parse().ok()?;
        let transferred: u64 = caps[4].parse().ok()?;
        let total_bytes: u64 = caps[5].parse().ok()?;
        let name = &caps[6];

        if current == 0 || total_files == 0 || total_bytes == 0 {
            return None;
        }

        self.files.insert(
            current,
            FileTransfer {
                transferred,
                total: total_bytes,
            },
        );

        let (sum_transferred, sum_total, finished) =
            self.files
                .values()
                .fold((0u64, 0u64, 0usize), |(t, n, f), file| {
                    (
                        t.saturating_add(file.transferred),
                        n.saturating_add(file.total),
                        f + usize::from(file.transferred == file.total),
                    )
                });

        let verb = direction_verb(direction);
        let transferred_text = format_bytes(sum_transferred);
        let total_text = format_bytes(sum_total);

        Some(ProgressEvent::Progress {
            title: format!("{verb} \"{name}\" {transferred_text}/{total_text}\u{2026}"),
            description: format!("{verb} {finished}/{total_files} {transferred_text}/{total_text}"),
            fraction: normalize_fraction(sum_transferred as f64 / sum_total as f64),
            step: None,
        })
    }
}

fn direction_verb(direction: &str) -> &'static str {
    match direction {
        "upload" => "Uploading",
        "checkout" => "Checking out",
        _ => "Downloading",
    }
}

/// Human-readable byte count with up to two decimals, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3072), "3 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_bytes(1_234_567), "1.18 MB");
    }

    #[test]
    fn test_single_file_download() {
        let mut parser = LfsProgressParser::new();
        let event = parser.parse("download 1/1 1536/3072 assets/logo.psd").unwrap();
        assert_eq!(
            event,
            ProgressEvent::Progress {
                title: "Downloading \"assets/logo.psd\" 1.5 KB/3 KB\u{2026}".into(),
                description: "Downloading 0/1 1.5 KB/3 KB".into(),
                fraction: 0.5,
                step: None,
            }
        );
    }

    #[test]
    fn test_bytes_aggregate_across_files() {
        let mut parser = LfsProgressParser::new();
        parser.parse("upload 1/2 1024/1024 a.bin").unwrap();
        let event = parser.parse("upload 2/2 0/3072 b.bin").unwrap();
        match event {
            ProgressEvent::Progress {
                title,
                description,
                fraction,
                ..
            } => {
                assert!(title.starts_with("Uploading \"b.bin\" 1 KB/4 KB"), "{title}");
                assert_eq!(description, "Uploading 1/2 1 KB/4 KB");
                assert_eq!(fraction, 0.25);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_updates_replace_earlier_counts_for_same_file() {
        let mut parser = LfsProgressParser::new();
        parser.parse("checkout 1/1 100/400 x").unwrap();
        let event = parser.parse("checkout 1/1 400/400 x").unwrap();
        assert_eq!(event.fraction(), Some(1.0));
        assert!(event.title().starts_with("Checking out"));
    }

    #[test]
    fn test_byte_totals_saturate_instead_of_overflowing() {
        let mut parser = LfsProgressParser::new();
        let max = u64::MAX;
        parser.parse(&format!("download 1/2 {max}/{max} a.bin")).unwrap();
        let event = parser.parse(&format!("download 2/2 {max}/{max} b.bin")).unwrap();
        assert_eq!(event.fraction(), Some(1.0));
        assert!(event.title().starts_with("Downloading \"b.bin\""));
    }

    #[test]
    fn test_malformed_lines_ignored() {
        let mut parser = LfsProgressParser::new();
        assert!(parser.parse("download").is_none());
        assert!(parser.parse("download 0/1 10/20 x").is_none());
        assert!(parser.parse("download 1/1 10/0 x").is_none());
        assert!(parser.parse("Git LFS: (1 of 1 files) 10 B / 20 B").is_none());
    }
}
