//! Polling monitor
//!
//! The loop is a small state machine:
//!
//! ```text
//! LoadBaseline -> Scan -> Diff -> Report -> MaybeUpdate -> Sleep -> Scan ...
//! ```
//!
//! The baseline is loaded once and held in memory; it is only replaced
//! wholesale by an auto-update whose persistence succeeded. Cancellation is
//! checked at every cycle boundary and interrupts the sleep.

use crate::diff::{self, DiffResult};
use crate::error::{FimError, Result};
use crate::events::{FimEvent, Sink};
use crate::snapshot::{FileMap, Snapshot};
use crate::target::Target;
use crate::utils;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Seconds between scans when nothing else is configured
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Cooperative stop signal shared between a monitor and its owner
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            let _ = self.wake_tx.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until cancelled; returns true if cancelled
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.wake_rx.recv_timeout(duration) {
            Ok(()) => {
                // Re-arm so any other sleeper on this token wakes too
                let _ = self.wake_tx.try_send(());
                true
            }
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

/// Monitor tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOptions {
    pub interval: Duration,
    /// Replace and persist the baseline whenever drift is found
    pub auto_update: bool,
    /// Stop after this many completed cycles (`None` = until cancelled)
    pub max_cycles: Option<u64>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            auto_update: false,
            max_cycles: None,
        }
    }
}

/// Why a monitor stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    CycleLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorExit {
    /// Completed scan/diff/report cycles
    pub cycles: u64,
    pub reason: StopReason,
}

enum Phase {
    LoadBaseline,
    Scan,
    Diff(FileMap),
    Report(FileMap, DiffResult),
    MaybeUpdate(FileMap, usize),
    Sleep,
    Stop(StopReason),
}

/// Single sequential worker that repeatedly scans a target
pub struct MonitorLoop {
    target: Target,
    options: MonitorOptions,
    sink: Arc<dyn Sink>,
}

impl MonitorLoop {
    pub fn new(target: Target, options: MonitorOptions, sink: Arc<dyn Sink>) -> Self {
        Self {
            target,
            options,
            sink,
        }
    }

    /// Run on the calling thread until cancelled, the cycle limit, or a failure
    ///
    /// A missing baseline ends the loop immediately with
    /// [`FimError::MissingBaseline`]. Any other error is reported to the
    /// sink as a loop failure and returned as [`FimError::LoopFailure`].
    pub fn run(&self, cancel: &CancelToken) -> Result<MonitorExit> {
        match self.run_phases(cancel) {
            Ok(exit) => Ok(exit),
            Err(e) if e.is_missing_baseline() => Err(e),
            Err(e) => {
                let error = e.to_string();
                self.sink.emit(&FimEvent::LoopFailed { error: error.clone() });
                Err(FimError::LoopFailure(error))
            }
        }
    }

    fn run_phases(&self, cancel: &CancelToken) -> Result<MonitorExit> {
        let store = self.target.store();
        let mut held: Option<Snapshot> = None;
        let mut cycles: u64 = 0;
        let mut phase = Phase::LoadBaseline;

        loop {
            phase = match phase {
                Phase::LoadBaseline => match store.load()? {
                    Some(baseline) => {
                        if baseline.root != self.target.root {
                            tracing::warn!(
                                "Baseline {} was recorded for {}, monitoring {}",
                                store.path().display(),
                                baseline.root.display(),
                                self.target.root.display()
                            );
                        }
                        held = Some(baseline);
                        self.sink.emit(&FimEvent::MonitorStarted {
                            root: self.target.root.clone(),
                            interval: self.options.interval,
                            auto_update: self.options.auto_update,
                        });
                        Phase::Scan
                    }
                    None => {
                        self.sink.emit(&FimEvent::MissingBaseline {
                            baseline: self.target.baseline.clone(),
                        });
                        return Err(FimError::MissingBaseline {
                            path: self.target.baseline.clone(),
                        });
                    }
                },
                Phase::Scan => {
                    if cancel.is_cancelled() {
                        Phase::Stop(StopReason::Cancelled)
                    } else if self.cycle_limit_reached(cycles) {
                        Phase::Stop(StopReason::CycleLimit)
                    } else {
                        let algorithm = held_baseline(&held)?.algorithm;
                        let current = self.target.scanner(algorithm).scan(&self.target.root)?;
                        Phase::Diff(current)
                    }
                }
                Phase::Diff(current) => {
                    let result = diff::diff(held_baseline(&held)?, &current);
                    Phase::Report(current, result)
                }
                Phase::Report(current, result) => {
                    let changes = result.change_count();
                    self.sink.emit(&FimEvent::ScanCompleted {
                        root: self.target.root.clone(),
                        diff: result,
                    });
                    cycles += 1;
                    Phase::MaybeUpdate(current, changes)
                }
                Phase::MaybeUpdate(current, changes) => {
                    if changes > 0 && self.options.auto_update {
                        let algorithm = held_baseline(&held)?.algorithm;
                        let updated = Snapshot::new(&self.target.root, algorithm, current);
                        match store.save(&updated) {
                            Ok(()) => {
                                self.sink.emit(&FimEvent::BaselineUpdated {
                                    baseline: self.target.baseline.clone(),
                                    files: updated.file_count(),
                                });
                                held = Some(updated);
                            }
                            // Keep the old baseline; the next cycle sees the same drift and retries
                            Err(e) => self.sink.emit(&FimEvent::PersistenceFailed {
                                baseline: self.target.baseline.clone(),
                                error: e.to_string(),
                            }),
                        }
                    }
                    Phase::Sleep
                }
                Phase::Sleep => {
                    if self.cycle_limit_reached(cycles) {
                        Phase::Stop(StopReason::CycleLimit)
                    } else if cancel.sleep(self.options.interval) {
                        Phase::Stop(StopReason::Cancelled)
                    } else {
                        Phase::Scan
                    }
                }
                Phase::Stop(reason) => {
                    self.sink.emit(&FimEvent::MonitorStopped { cycles });
                    return Ok(MonitorExit { cycles, reason });
                }
            };
        }
    }

    fn cycle_limit_reached(&self, cycles: u64) -> bool {
        self.options.max_cycles.is_some_and(|max| cycles >= max)
    }
}

fn held_baseline(held: &Option<Snapshot>) -> Result<&Snapshot> {
    held.as_ref()
        .ok_or_else(|| FimError::LoopFailure("no baseline held".to_string()))
}

/// Owner's handle on a monitor running in the background
///
/// Dropping the handle cancels the monitor so it never outlives its owner.
pub struct MonitorHandle {
    baseline: PathBuf,
    cancel: CancelToken,
    worker: Option<JoinHandle<Result<MonitorExit>>>,
}

impl MonitorHandle {
    /// Start `monitor` on a dedicated thread and return immediately
    pub fn spawn(monitor: MonitorLoop) -> Result<Self> {
        let cancel = CancelToken::new();
        let baseline = monitor.target.baseline.clone();
        let token = cancel.clone();

        let worker = std::thread::Builder::new()
            .name("hashwatch-monitor".to_string())
            .spawn(move || {
                match panic::catch_unwind(AssertUnwindSafe(|| monitor.run(&token))) {
                    Ok(result) => result,
                    Err(payload) => {
                        let error = panic_message(payload.as_ref());
                        monitor.sink.emit(&FimEvent::LoopFailed { error: error.clone() });
                        Err(FimError::LoopFailure(error))
                    }
                }
            })
            .map_err(|e| FimError::LoopFailure(format!("failed to spawn monitor thread: {}", e)))?;

        Ok(Self {
            baseline,
            cancel,
            worker: Some(worker),
        })
    }

    /// Baseline document this monitor owns
    pub fn baseline(&self) -> &Path {
        &self.baseline
    }

    pub fn token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Ask the monitor to stop at its next cycle boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }

    /// Wait for the monitor to exit on its own
    pub fn join(mut self) -> Result<MonitorExit> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .unwrap_or_else(|payload| Err(FimError::LoopFailure(panic_message(payload.as_ref())))),
            None => Err(FimError::LoopFailure("monitor already joined".to_string())),
        }
    }

    /// Cancel and wait
    pub fn stop(self) -> Result<MonitorExit> {
        self.cancel();
        self.join()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel.cancel();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("monitor panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("monitor panicked: {}", s)
    } else {
        "monitor panicked".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    NotRunning,
    Running,
    /// Exited (cancelled, failed, or hit its cycle limit) but not yet reaped
    Finished,
}

/// Registry of background monitors, at most one per baseline document
#[derive(Default)]
pub struct MonitorSupervisor {
    sessions: Mutex<HashMap<PathBuf, MonitorHandle>>,
}

impl MonitorSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start monitoring `target` unless its baseline already has a live monitor
    pub fn start(&self, target: Target, options: MonitorOptions, sink: Arc<dyn Sink>) -> Result<()> {
        self.reap();
        let mut sessions = self.lock();
        if sessions.contains_key(&target.baseline) {
            return Err(FimError::MonitorAlreadyRunning {
                baseline: target.baseline,
            });
        }
        let key = target.baseline.clone();
        let handle = MonitorHandle::spawn(MonitorLoop::new(target, options, sink))?;
        sessions.insert(key, handle);
        Ok(())
    }

    pub fn status(&self, baseline: &Path) -> MonitorStatus {
        match self.lock().get(&session_key(baseline)) {
            None => MonitorStatus::NotRunning,
            Some(handle) if handle.is_finished() => MonitorStatus::Finished,
            Some(_) => MonitorStatus::Running,
        }
    }

    /// Baselines with a registered monitor
    pub fn running(&self) -> Vec<PathBuf> {
        let mut keys: Vec<PathBuf> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Cancel and join the monitor for `baseline`, if any
    pub fn stop(&self, baseline: &Path) -> Option<Result<MonitorExit>> {
        let handle = self.lock().remove(&session_key(baseline))?;
        Some(handle.stop())
    }

    pub fn stop_all(&self) -> Vec<(PathBuf, Result<MonitorExit>)> {
        let handles: Vec<(PathBuf, MonitorHandle)> = self.lock().drain().collect();
        handles.iter().for_each(|(_, handle)| handle.cancel());
        handles
            .into_iter()
            .map(|(path, handle)| (path, handle.join()))
            .collect()
    }

    /// Join and drop monitors that have already exited
    pub fn reap(&self) -> Vec<(PathBuf, Result<MonitorExit>)> {
        let finished: Vec<(PathBuf, MonitorHandle)> = {
            let mut sessions = self.lock();
            let done: Vec<PathBuf> = sessions
                .iter()
                .filter(|(_, handle)| handle.is_finished())
                .map(|(path, _)| path.clone())
                .collect();
            done.into_iter()
                .filter_map(|path| sessions.remove(&path).map(|h| (path, h)))
                .collect()
        };

        finished
            .into_iter()
            .map(|(path, handle)| {
                let result = handle.join();
                tracing::debug!("Reaped monitor for {}: {:?}", path.display(), result);
                (path, result)
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, MonitorHandle>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for MonitorSupervisor {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn session_key(baseline: &Path) -> PathBuf {
    utils::normalize_path(baseline).unwrap_or_else(|_| baseline.to_path_buf())
}
