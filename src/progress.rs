use crate::events::{FimEvent, Sink};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate progress
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg} {pos} files")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Spinner for a scan, or a hidden bar when output is suppressed
pub fn scan_spinner(msg: &str, visible: bool) -> ProgressBar {
    if visible {
        create_spinner(msg)
    } else {
        ProgressBar::hidden()
    }
}

/// Per-file callback that ticks `pb`; usable from rayon workers
pub fn file_ticker(pb: &ProgressBar) -> impl Fn(&str) + Sync + '_ {
    move |_path: &str| pb.inc(1)
}

/// Finish and clear progress bar
pub fn finish_and_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}

/// Forwards events to `inner`, clearing the spinner before the first one
pub struct SpinnerSink<'a, S> {
    pb: &'a ProgressBar,
    inner: S,
}

impl<'a, S: Sink> SpinnerSink<'a, S> {
    pub fn new(pb: &'a ProgressBar, inner: S) -> Self {
        Self { pb, inner }
    }
}

impl<S: Sink> Sink for SpinnerSink<'_, S> {
    fn emit(&self, event: &FimEvent) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
        self.inner.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_counts_files() {
        let pb = scan_spinner("Hashing", false);
        let tick = file_ticker(&pb);
        tick("a.txt");
        tick("b/c.txt");
        assert_eq!(pb.position(), 2);
        finish_and_clear(&pb);
        assert!(pb.is_finished());
    }

    #[test]
    fn test_spinner_sink_clears_and_forwards() {
        let pb = scan_spinner("Hashing", false);
        let memory = crate::events::MemorySink::new();
        let sink = SpinnerSink::new(&pb, &memory);
        sink.emit(&FimEvent::MonitorStopped { cycles: 3 });

        assert!(pb.is_finished());
        assert_eq!(memory.events(), vec![FimEvent::MonitorStopped { cycles: 3 }]);
    }
}
