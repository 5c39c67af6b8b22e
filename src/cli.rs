use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CliOverrides, Config};
use crate::events::{FanoutSink, LogSink, Sink};
use crate::hash::HashAlgorithm;
use crate::logging;
use crate::monitor::{MonitorOptions, StopReason};
use crate::ops::{self, ScanOutcome};
use crate::output::{self, ConsoleSink, OutputMode};
use crate::progress;
use crate::target::Target;
use crate::theme::Theme;
use crate::utils::display_path;

#[derive(Parser)]
#[command(name = "hashwatch")]
#[command(version)]
#[command(about = "Detect added, deleted, and modified files under a directory")]
#[command(long_about = "Hashwatch records a content-hash baseline of a directory tree and \
    reports drift against it, once or continuously.\n\n\
    Examples:\n  \
    hashwatch baseline --path /etc           # Record a baseline\n  \
    hashwatch scan --path /etc               # Exit 0 clean, 1 drift, 2 no baseline\n  \
    hashwatch monitor --path /etc --interval 5 --auto-update\n  \
    hashwatch scan --exclude '*.log' --json  # Machine-readable diff")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase output verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Read configuration from FILE instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also append DEBUG-level logs to FILE
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

/// Where to look and what to skip
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Directory to watch [default: config value or current directory]
    #[arg(short = 'p', long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Baseline document [default: baseline.json]
    #[arg(short = 'b', long, value_name = "FILE")]
    pub baseline: Option<PathBuf>,

    /// Exclude paths matching pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Hash every file under the target and save it as the baseline
    #[command(visible_alias = "b")]
    Baseline {
        #[command(flatten)]
        target: TargetArgs,

        /// Digest algorithm (sha256 or blake3)
        #[arg(long, value_name = "ALGO")]
        algorithm: Option<HashAlgorithm>,

        /// Output a summary as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Compare the tree once against the baseline
    #[command(visible_alias = "s")]
    Scan {
        #[command(flatten)]
        target: TargetArgs,

        /// Output the diff as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Rescan on an interval until Enter is pressed
    #[command(visible_alias = "m")]
    Monitor {
        #[command(flatten)]
        target: TargetArgs,

        /// Seconds between scans [default: 10]
        #[arg(short = 'i', long, value_name = "SECS")]
        interval: Option<u64>,

        /// Replace the baseline after reporting drift
        #[arg(long)]
        auto_update: bool,

        /// Stop after N scans
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
    },

    /// View or reset configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Reset to defaults
        #[arg(long, conflicts_with = "show")]
        reset: bool,

        /// Print the config file location
        #[arg(long, conflicts_with_all = ["show", "reset"])]
        path: bool,
    },
}

impl Cli {
    /// Run the selected command and return the process exit code
    pub fn run(self) -> anyhow::Result<i32> {
        let (mut config, config_error) = load_config(self.config.as_deref())?;
        config.apply_cli_overrides(CliOverrides {
            log_file: self.log_file.clone(),
            ..CliOverrides::default()
        });
        logging::init(self.verbose, self.quiet, config.logging.file.as_deref())?;
        if let Some(e) = config_error {
            tracing::warn!("Ignoring unreadable config: {:#}", e);
        }

        let mode = OutputMode::from_flags(self.verbose, self.quiet);

        match self.command {
            Commands::Baseline {
                target,
                algorithm,
                json,
            } => {
                config.apply_cli_overrides(overrides(target, algorithm));
                let target = build_target(&config)?;
                let console = ConsoleSink::new(if json { OutputMode::Quiet } else { mode }).with_errors(false);
                let sink = FanoutSink::new().with(console).with(LogSink);

                let pb = progress::scan_spinner("Hashing", !json && mode != OutputMode::Quiet);
                let snapshot = ops::create_baseline_with_progress(
                    &target,
                    &progress::SpinnerSink::new(&pb, &sink),
                    &progress::file_ticker(&pb),
                )
                .with_context(|| format!("Failed to create baseline for {}", display_path(&target.root)))?;
                progress::finish_and_clear(&pb);

                if json {
                    println!("{}", output::baseline_json(&snapshot, &target.baseline)?);
                } else if mode != OutputMode::Normal {
                    output::print_baseline_summary(&snapshot, mode);
                }
                Ok(0)
            }
            Commands::Scan { target, json } => {
                config.apply_cli_overrides(overrides(target, None));
                let target = build_target(&config)?;
                let console = ConsoleSink::new(if json { OutputMode::Quiet } else { mode }).with_errors(false);
                let sink = FanoutSink::new().with(console).with(LogSink);

                let pb = progress::scan_spinner("Scanning", !json && mode != OutputMode::Quiet);
                let outcome = ops::scan_once_with_progress(
                    &target,
                    &progress::SpinnerSink::new(&pb, &sink),
                    &progress::file_ticker(&pb),
                )
                .with_context(|| format!("Failed to scan {}", display_path(&target.root)))?;
                progress::finish_and_clear(&pb);

                if json {
                    println!("{}", output::scan_json(&outcome)?);
                } else if outcome == ScanOutcome::Clean && mode == OutputMode::Normal {
                    println!("{} No changes detected.", Theme::success("OK"));
                }
                Ok(outcome.code())
            }
            Commands::Monitor {
                target,
                interval,
                auto_update,
                cycles,
            } => {
                let mut flags = overrides(target, None);
                flags.interval_secs = interval;
                if auto_update {
                    flags.auto_update = Some(true);
                }
                config.apply_cli_overrides(flags);
                let target = build_target(&config)?;
                let options = MonitorOptions {
                    interval: config.interval(),
                    auto_update: config.monitor.auto_update,
                    max_cycles: cycles,
                };
                run_monitor(target, options, mode)
            }
            Commands::Config { show: _, reset, path } => {
                let config_path = match &self.config {
                    Some(p) => p.clone(),
                    None => Config::config_path()?,
                };
                if path {
                    println!("{}", config_path.display());
                } else if reset {
                    match &self.config {
                        Some(p) => Config::default().save_to(p)?,
                        None => Config::default().save()?,
                    }
                    println!("{} Configuration reset to defaults.", Theme::success("OK"));
                } else {
                    // --show is also the default
                    let shown = match &self.config {
                        Some(_) => config,
                        None => Config::load_or_create(),
                    };
                    print_config(&shown, &config_path);
                }
                Ok(0)
            }
        }
    }
}

/// An explicit `--config` must be readable; the default location falls back
/// to defaults and hands back the error so it can be logged once tracing is up.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<(Config, Option<anyhow::Error>)> {
    if let Some(path) = explicit {
        return Ok((Config::load_from(path)?, None));
    }
    let path = match Config::config_path() {
        Ok(path) => path,
        Err(_) => return Ok((Config::default(), None)),
    };
    Ok(match Config::load_from(&path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    })
}

fn overrides(target: TargetArgs, algorithm: Option<HashAlgorithm>) -> CliOverrides {
    CliOverrides {
        root: target.path,
        baseline: target.baseline,
        exclude: target.exclude,
        algorithm,
        ..CliOverrides::default()
    }
}

fn build_target(config: &Config) -> anyhow::Result<Target> {
    let root = config.root();
    let target = Target::new(&root, &config.target.baseline, &config.exclusions.patterns)
        .with_context(|| format!("Invalid target {}", root.display()))?;
    Ok(target
        .with_algorithm(config.hashing.algorithm)
        .parallel(config.hashing.parallel))
}

fn run_monitor(target: Target, options: MonitorOptions, mode: OutputMode) -> anyhow::Result<i32> {
    let console = ConsoleSink::new(mode).with_timestamps(true).with_errors(false);
    let sink: Arc<dyn Sink> = Arc::new(FanoutSink::new().with(console).with(LogSink));

    let handle = ops::start_monitor(target, options, sink)?;
    if mode != OutputMode::Quiet {
        println!("{}", Theme::muted("Press Enter to stop."));
    }

    // Enter stops the monitor; EOF on stdin leaves it running until its cycle limit
    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    std::thread::Builder::new()
        .name("hashwatch-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            if let Ok(n) = std::io::stdin().lock().read_line(&mut line) {
                if n > 0 {
                    let _ = tx.send(());
                }
            }
        })
        .context("Failed to spawn stdin reader")?;

    loop {
        if handle.is_finished() {
            break;
        }
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(()) => {
                handle.cancel();
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let exit = match handle.join() {
        // Already reported through the sink; same code as `scan`
        Err(e) if e.is_missing_baseline() => return Ok(ScanOutcome::MissingBaseline.code()),
        other => other.context("Monitor stopped with an error")?,
    };
    tracing::debug!("Monitor exited after {} cycles ({:?})", exit.cycles, exit.reason);
    if exit.reason == StopReason::CycleLimit && mode != OutputMode::Quiet {
        println!("Reached the {} scan limit.", exit.cycles);
    }
    Ok(0)
}

fn print_config(config: &Config, path: &Path) {
    println!("{}", Theme::header("Current Configuration"));
    println!("{}", Theme::divider_bold(60));
    println!();
    println!("Target:");
    match &config.target.root {
        Some(root) => println!("  Root: {}", root.display()),
        None => println!("  Root: (current directory)"),
    }
    println!("  Baseline: {}", config.target.baseline.display());
    println!();
    println!("Monitor:");
    println!("  Interval: {} s", config.interval().as_secs());
    println!("  Auto-update: {}", config.monitor.auto_update);
    println!();
    println!("Exclusions:");
    if config.exclusions.patterns.is_empty() {
        println!("  (none)");
    } else {
        for pattern in &config.exclusions.patterns {
            println!("  {}", pattern);
        }
    }
    println!();
    println!("Hashing:");
    println!("  Algorithm: {}", config.hashing.algorithm);
    println!("  Parallel: {}", config.hashing.parallel);
    println!();
    println!("Logging:");
    match &config.logging.file {
        Some(file) => println!("  File: {}", file.display()),
        None => println!("  File: (none)"),
    }
    println!("{}", Theme::divider(60));
    println!("Config file: {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_flags() {
        let cli = Cli::try_parse_from([
            "hashwatch", "-v", "scan", "--path", "/srv", "--exclude", "*.log", "--exclude", ".git", "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Scan { target, json } => {
                assert_eq!(target.path, Some(PathBuf::from("/srv")));
                assert_eq!(target.exclude, vec!["*.log", ".git"]);
                assert!(json);
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_parse_baseline_algorithm() {
        let cli = Cli::try_parse_from(["hashwatch", "baseline", "--algorithm", "blake3"]).unwrap();
        match cli.command {
            Commands::Baseline { algorithm, .. } => assert_eq!(algorithm, Some(HashAlgorithm::Blake3)),
            _ => panic!("expected baseline"),
        }
        assert!(Cli::try_parse_from(["hashwatch", "baseline", "--algorithm", "md5"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["hashwatch", "-q", "-v", "scan"]).is_err());
    }

    #[test]
    fn test_monitor_overrides_reach_options() {
        let cli = Cli::try_parse_from([
            "hashwatch", "monitor", "--interval", "0", "--auto-update", "--cycles", "3",
        ])
        .unwrap();
        let Commands::Monitor {
            target,
            interval,
            auto_update,
            cycles,
        } = cli.command
        else {
            panic!("expected monitor");
        };
        let mut config = Config::default();
        let mut o = overrides(target, None);
        o.interval_secs = interval;
        o.auto_update = Some(auto_update);
        config.apply_cli_overrides(o);

        assert_eq!(config.interval(), Duration::from_secs(1));
        assert!(config.monitor.auto_update);
        assert_eq!(cycles, Some(3));
    }

    #[test]
    fn test_log_file_flag_overrides_config() {
        let cli = Cli::try_parse_from(["hashwatch", "scan", "--log-file", "/var/log/hashwatch.log"]).unwrap();
        let mut config = Config::default();
        config.logging.file = Some(PathBuf::from("configured.log"));
        config.apply_cli_overrides(CliOverrides {
            log_file: cli.log_file,
            ..CliOverrides::default()
        });
        assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/hashwatch.log")));

        // Without the flag the configured file stays
        let mut config = Config::default();
        config.logging.file = Some(PathBuf::from("configured.log"));
        config.apply_cli_overrides(CliOverrides::default());
        assert_eq!(config.logging.file, Some(PathBuf::from("configured.log")));
    }

    #[test]
    fn test_build_target_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.apply_cli_overrides(CliOverrides {
            root: Some(temp_dir.path().to_path_buf()),
            baseline: Some(temp_dir.path().join("state.json")),
            exclude: vec!["*.tmp".to_string()],
            algorithm: Some(HashAlgorithm::Blake3),
            ..CliOverrides::default()
        });

        let target = build_target(&config).unwrap();
        assert_eq!(target.algorithm, HashAlgorithm::Blake3);
        assert!(target.exclusions.is_excluded(&temp_dir.path().join("x.tmp")));
        // The baseline lives under the root and must never be scanned
        assert!(target.exclusions.is_excluded(&target.baseline));
    }

    #[test]
    fn test_explicit_config_must_parse() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(load_config(Some(&path)).is_err());

        let missing = temp_dir.path().join("missing.toml");
        let (config, error) = load_config(Some(&missing)).unwrap();
        assert_eq!(config, Config::default());
        assert!(error.is_none());
    }
}
