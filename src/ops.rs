//! The three operations a front end drives: create a baseline, scan once,
//! and start continuous monitoring.

use crate::diff::{self, DiffResult};
use crate::error::Result;
use crate::events::{FimEvent, Sink};
use crate::monitor::{MonitorHandle, MonitorLoop, MonitorOptions};
use crate::snapshot::Snapshot;
use crate::target::Target;
use std::sync::Arc;

/// Result of a one-shot scan
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Tree matches the baseline
    Clean,
    /// Drift found and reported
    Drift(DiffResult),
    /// No baseline persisted; nothing was scanned
    MissingBaseline,
}

impl ScanOutcome {
    /// Change code: 0 clean, 1 drift, 2 missing baseline
    pub fn code(&self) -> i32 {
        match self {
            ScanOutcome::Clean => 0,
            ScanOutcome::Drift(_) => 1,
            ScanOutcome::MissingBaseline => 2,
        }
    }

    pub fn diff(&self) -> Option<&DiffResult> {
        match self {
            ScanOutcome::Drift(d) => Some(d),
            _ => None,
        }
    }
}

/// Scan the target and persist the result as its new baseline
pub fn create_baseline(target: &Target, sink: &dyn Sink) -> Result<Snapshot> {
    create_baseline_with_progress(target, sink, &|_: &str| {})
}

/// [`create_baseline`] with a per-file progress callback
pub fn create_baseline_with_progress<F>(target: &Target, sink: &dyn Sink, on_file: &F) -> Result<Snapshot>
where
    F: Fn(&str) + Sync,
{
    let files = target
        .scanner(target.algorithm)
        .scan_with_progress(&target.root, on_file)?;
    let snapshot = Snapshot::new(&target.root, target.algorithm, files);

    if let Err(e) = target.store().save(&snapshot) {
        sink.emit(&FimEvent::PersistenceFailed {
            baseline: target.baseline.clone(),
            error: e.to_string(),
        });
        return Err(e);
    }

    sink.emit(&FimEvent::BaselineCreated {
        root: target.root.clone(),
        baseline: target.baseline.clone(),
        files: snapshot.file_count(),
        unreadable: snapshot.unreadable_count(),
    });
    Ok(snapshot)
}

/// Compare the tree once against the persisted baseline
pub fn scan_once(target: &Target, sink: &dyn Sink) -> Result<ScanOutcome> {
    scan_once_with_progress(target, sink, &|_: &str| {})
}

/// [`scan_once`] with a per-file progress callback
pub fn scan_once_with_progress<F>(target: &Target, sink: &dyn Sink, on_file: &F) -> Result<ScanOutcome>
where
    F: Fn(&str) + Sync,
{
    let Some(baseline) = target.store().load()? else {
        sink.emit(&FimEvent::MissingBaseline {
            baseline: target.baseline.clone(),
        });
        return Ok(ScanOutcome::MissingBaseline);
    };

    if baseline.root != target.root {
        tracing::warn!(
            "Baseline was recorded for {}, scanning {}",
            baseline.root.display(),
            target.root.display()
        );
    }

    // Digests are only comparable under the algorithm the baseline used
    let current = target
        .scanner(baseline.algorithm)
        .scan_with_progress(&target.root, on_file)?;
    let result = diff::diff(&baseline, &current);

    sink.emit(&FimEvent::ScanCompleted {
        root: target.root.clone(),
        diff: result.clone(),
    });

    Ok(if result.is_empty() {
        ScanOutcome::Clean
    } else {
        ScanOutcome::Drift(result)
    })
}

/// Launch the polling monitor on a background thread
///
/// Returns as soon as the thread is running. Keep the handle: dropping it
/// cancels the monitor.
pub fn start_monitor(target: Target, options: MonitorOptions, sink: Arc<dyn Sink>) -> Result<MonitorHandle> {
    MonitorHandle::spawn(MonitorLoop::new(target, options, sink))
}
