//! Reporting events and the sinks that receive them
//!
//! Every operation takes the sink it reports to as an argument; nothing in
//! the engine writes results to a global logger.

use crate::diff::DiffResult;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// Something worth telling the caller about
#[derive(Debug, Clone, PartialEq)]
pub enum FimEvent {
    /// A baseline was captured and persisted
    BaselineCreated {
        root: PathBuf,
        baseline: PathBuf,
        files: usize,
        unreadable: usize,
    },

    /// A scan finished; `diff` may be empty
    ScanCompleted { root: PathBuf, diff: DiffResult },

    MonitorStarted {
        root: PathBuf,
        interval: Duration,
        auto_update: bool,
    },

    /// The monitor replaced the held baseline after detecting drift
    BaselineUpdated { baseline: PathBuf, files: usize },

    /// The baseline could not be written; the previous one stays in effect
    PersistenceFailed { baseline: PathBuf, error: String },

    /// No baseline exists, so nothing was scanned
    MissingBaseline { baseline: PathBuf },

    /// The monitor hit an unexpected error and stopped
    LoopFailed { error: String },

    MonitorStopped { cycles: u64 },
}

/// Destination for [`FimEvent`]s
pub trait Sink: Send + Sync {
    fn emit(&self, event: &FimEvent);
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn emit(&self, event: &FimEvent) {
        (**self).emit(event)
    }
}

impl<S: Sink + ?Sized> Sink for &S {
    fn emit(&self, event: &FimEvent) {
        (**self).emit(event)
    }
}

/// Forward events over a channel; a hung-up receiver is ignored
impl Sink for mpsc::Sender<FimEvent> {
    fn emit(&self, event: &FimEvent) {
        let _ = self.send(event.clone());
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<FimEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far
    pub fn events(&self) -> Vec<FimEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drift reports received so far
    pub fn diffs(&self) -> Vec<DiffResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FimEvent::ScanCompleted { diff, .. } => Some(diff),
                _ => None,
            })
            .collect()
    }
}

impl Sink for MemorySink {
    fn emit(&self, event: &FimEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Writes events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl Sink for LogSink {
    fn emit(&self, event: &FimEvent) {
        match event {
            FimEvent::BaselineCreated {
                root,
                baseline,
                files,
                unreadable,
            } => {
                tracing::info!(
                    "Baseline created for {}: {} files ({} unreadable) -> {}",
                    root.display(),
                    files,
                    unreadable,
                    baseline.display()
                );
            }
            FimEvent::ScanCompleted { diff, .. } => {
                if diff.is_empty() {
                    tracing::debug!("No changes detected.");
                    return;
                }
                for a in &diff.added {
                    tracing::info!("ADDED: {} | hash={}", a.path, a.current.digest);
                }
                for d in &diff.deleted {
                    tracing::info!("DELETED: {} | old_hash={}", d.path, d.baseline.digest);
                }
                for m in &diff.modified {
                    tracing::info!(
                        "MODIFIED: {} | old_hash={} | new_hash={}",
                        m.path,
                        m.baseline.digest,
                        m.current.digest
                    );
                }
            }
            FimEvent::MonitorStarted {
                root,
                interval,
                auto_update,
            } => {
                tracing::info!(
                    "Monitoring {} every {}s (auto-update: {})",
                    root.display(),
                    interval.as_secs_f64(),
                    auto_update
                );
            }
            FimEvent::BaselineUpdated { baseline, files } => {
                tracing::info!("Baseline auto-updated after change ({} files) -> {}", files, baseline.display());
            }
            FimEvent::PersistenceFailed { baseline, error } => {
                tracing::error!("Failed to persist baseline {}: {}", baseline.display(), error);
            }
            FimEvent::MissingBaseline { baseline } => {
                tracing::error!("Baseline not found at {}. Run baseline first.", baseline.display());
            }
            FimEvent::LoopFailed { error } => {
                tracing::error!("Monitor loop failed: {}", error);
            }
            FimEvent::MonitorStopped { cycles } => {
                tracing::info!("Monitoring stopped after {} cycles.", cycles);
            }
        }
    }
}

/// Broadcasts each event to several sinks in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl Sink for FanoutSink {
    fn emit(&self, event: &FimEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
