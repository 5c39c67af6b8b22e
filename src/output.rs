use crate::diff::DiffResult;
use crate::events::{FimEvent, Sink};
use crate::ops::ScanOutcome;
use crate::snapshot::Snapshot;
use crate::theme::Theme;
use crate::utils::display_path;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,       // Only errors
    Normal,      // Standard output
    Verbose,     // More details
    VeryVerbose, // All details including digests
}

impl OutputMode {
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return OutputMode::Quiet;
        }
        match verbose {
            0 => OutputMode::Normal,
            1 => OutputMode::Verbose,
            _ => OutputMode::VeryVerbose,
        }
    }
}

/// Human-readable console rendering of engine events
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    mode: OutputMode,
    /// Prefix drift reports with the wall-clock time (useful when monitoring)
    timestamps: bool,
    /// Print failures to stderr; off when a [`LogSink`](crate::events::LogSink) already logs them
    errors: bool,
}

impl ConsoleSink {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            timestamps: false,
            errors: true,
        }
    }

    pub fn with_errors(mut self, errors: bool) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }
}

impl Sink for ConsoleSink {
    fn emit(&self, event: &FimEvent) {
        match event {
            FimEvent::PersistenceFailed { .. } | FimEvent::MissingBaseline { .. } | FimEvent::LoopFailed { .. }
                if !self.errors => {}
            FimEvent::PersistenceFailed { baseline, error } => {
                eprintln!(
                    "{} Could not save baseline {}: {}",
                    Theme::error("Error:"),
                    display_path(baseline),
                    error
                );
            }
            FimEvent::MissingBaseline { baseline } => {
                eprintln!(
                    "{} Baseline not found at {}. Run `hashwatch baseline` first.",
                    Theme::error("Error:"),
                    display_path(baseline)
                );
            }
            FimEvent::LoopFailed { error } => {
                eprintln!("{} Monitoring stopped: {}", Theme::error("Error:"), error);
            }
            _ if self.mode == OutputMode::Quiet => {}
            FimEvent::BaselineCreated {
                baseline,
                files,
                unreadable,
                ..
            } => {
                println!(
                    "{} Baseline created: {} files -> {}",
                    Theme::success("OK"),
                    files,
                    display_path(baseline)
                );
                if *unreadable > 0 {
                    println!(
                        "{} {} files could not be read and were recorded with an error digest",
                        Theme::warning("Warning:"),
                        unreadable
                    );
                }
            }
            FimEvent::ScanCompleted { diff, .. } => {
                let lines = render_diff(diff, self.mode);
                if lines.is_empty() {
                    return;
                }
                if self.timestamps {
                    println!("{}", Theme::muted(&chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]").to_string()));
                }
                for line in lines {
                    println!("{}", line);
                }
            }
            FimEvent::MonitorStarted {
                root,
                interval,
                auto_update,
            } => {
                println!(
                    "{} {} every {}s{}",
                    Theme::header("Monitoring"),
                    display_path(root),
                    interval.as_secs(),
                    if *auto_update { " (auto-update baseline)" } else { "" }
                );
            }
            FimEvent::BaselineUpdated { files, .. } => {
                println!("{} Baseline auto-updated after change ({} files).", Theme::success("OK"), files);
            }
            FimEvent::MonitorStopped { cycles } => {
                println!("Monitoring stopped after {} scans.", cycles);
            }
        }
    }
}

/// Lines describing a diff; empty when there is nothing to say at `mode`
pub fn render_diff(diff: &DiffResult, mode: OutputMode) -> Vec<String> {
    let mut lines = Vec::new();
    if mode == OutputMode::Quiet {
        return lines;
    }
    if diff.is_empty() {
        if mode != OutputMode::Normal {
            lines.push(Theme::muted("No changes detected.").to_string());
        }
        return lines;
    }

    let show_hashes = mode == OutputMode::VeryVerbose;

    if !diff.added.is_empty() {
        lines.push(Theme::primary("=== Added Files ===").to_string());
        for a in &diff.added {
            let mut line = format!("ADDED: {}", a.path);
            if show_hashes {
                line.push_str(&format!(" | hash={}", a.current.digest));
            }
            lines.push(Theme::added(&line).to_string());
        }
    }
    if !diff.deleted.is_empty() {
        lines.push(Theme::primary("=== Deleted Files ===").to_string());
        for d in &diff.deleted {
            let mut line = format!("DELETED: {}", d.path);
            if show_hashes {
                line.push_str(&format!(" | old_hash={}", d.baseline.digest));
            }
            lines.push(Theme::deleted(&line).to_string());
        }
    }
    if !diff.modified.is_empty() {
        lines.push(Theme::primary("=== Modified Files ===").to_string());
        for m in &diff.modified {
            let mut line = format!("MODIFIED: {}", m.path);
            if show_hashes {
                line.push_str(&format!(" | old_hash={} | new_hash={}", m.baseline.digest, m.current.digest));
            }
            lines.push(Theme::modified(&line).to_string());
        }
    }

    lines.push(format!(
        "{} changes: {} added, {} deleted, {} modified",
        diff.change_count(),
        diff.added.len(),
        diff.deleted.len(),
        diff.modified.len()
    ));
    lines
}

#[derive(Serialize)]
struct JsonBaseline<'a> {
    version: &'static str,
    status: &'static str,
    root: String,
    baseline: String,
    generated_at: String,
    algorithm: &'a str,
    total_files: usize,
    total_bytes: u64,
    total_human: String,
    unreadable: usize,
}

#[derive(Serialize)]
struct JsonScan<'a> {
    version: &'static str,
    status: &'static str,
    changes_detected: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    diff: Option<&'a DiffResult>,
}

pub fn baseline_json(snapshot: &Snapshot, baseline: &Path) -> Result<String> {
    let summary = JsonBaseline {
        version: env!("CARGO_PKG_VERSION"),
        status: "baseline_created",
        root: display_path(&snapshot.root),
        baseline: display_path(baseline),
        generated_at: snapshot.generated_at.to_rfc3339(),
        algorithm: snapshot.algorithm.name(),
        total_files: snapshot.file_count(),
        total_bytes: snapshot.total_size(),
        total_human: bytesize::to_string(snapshot.total_size(), true),
        unreadable: snapshot.unreadable_count(),
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

pub fn scan_json(outcome: &ScanOutcome) -> Result<String> {
    let empty = DiffResult::default();
    let (status, diff) = match outcome {
        ScanOutcome::Clean => ("clean", Some(&empty)),
        ScanOutcome::Drift(d) => ("drift", Some(d)),
        ScanOutcome::MissingBaseline => ("missing_baseline", None),
    };
    let json = JsonScan {
        version: env!("CARGO_PKG_VERSION"),
        status,
        changes_detected: outcome.code(),
        diff,
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

/// One-line summary printed after `hashwatch baseline`
pub fn print_baseline_summary(snapshot: &Snapshot, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }
    println!(
        "  Root: {}\n  Files: {} ({})\n  Algorithm: {}",
        display_path(&snapshot.root),
        snapshot.file_count(),
        bytesize::to_string(snapshot.total_size(), true),
        snapshot.algorithm
    );
}
