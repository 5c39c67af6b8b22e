//! Hashwatch library crate
//!
//! File-integrity monitoring: record a content-hash baseline of a directory
//! tree, then report added, deleted, and modified files against it, once or
//! on a polling loop. The `cli` module is the binary's front end; everything
//! else is usable on its own.

pub mod baseline;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod exclusion;
pub mod hash;
pub mod logging;
pub mod monitor;
pub mod ops;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod snapshot;
pub mod target;
pub mod theme;
pub mod utils;

pub use error::{FimError, Result};
pub use events::{FimEvent, Sink};
pub use monitor::{CancelToken, MonitorHandle, MonitorOptions, MonitorSupervisor};
pub use ops::{create_baseline, scan_once, start_monitor, ScanOutcome};
pub use target::Target;
