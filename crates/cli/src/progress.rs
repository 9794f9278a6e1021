//! Terminal rendering of progress events.

use indicatif::{ProgressBar, ProgressStyle};

use gitorch_core::ProgressEvent;

/// A single bar that follows whatever operation is reporting.
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template("{spinner:.blue} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "]);
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar }
    }

    /// A sink that renders onto this bar.
    pub fn sink(&self) -> impl FnMut(ProgressEvent) + Send {
        let bar = self.bar.clone();
        move |event| render(&bar, event)
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

fn render(bar: &ProgressBar, event: ProgressEvent) {
    match event {
        ProgressEvent::Progress {
            title,
            description,
            fraction,
            ..
        } => {
            bar.set_position(percent(fraction));
            if description.is_empty() {
                bar.set_message(title);
            } else {
                bar.set_message(format!("{title}: {description}"));
            }
        }
        ProgressEvent::Context { title, text } => {
            bar.set_message(format!("{title}: {text}"));
        }
    }
}

fn percent(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.0), 0);
        assert_eq!(percent(0.57), 57);
        assert_eq!(percent(1.0), 100);
        assert_eq!(percent(3.0), 100);
    }

    #[test]
    fn test_render_updates_bar() {
        let bar = ProgressBar::hidden();
        bar.set_length(100);
        render(&bar, ProgressEvent::progress("Fetching origin", "Receiving objects", 0.42));
        assert_eq!(bar.position(), 42);
        assert_eq!(bar.message(), "Fetching origin: Receiving objects");
    }
}
