//! User configuration (TOML)
//!
//! Location: the platform config directory, e.g.
//! `~/.config/hashwatch/config.toml` on Linux or
//! `%APPDATA%\hashwatch\config\config.toml` on Windows.

use crate::hash::HashAlgorithm;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub monitor: MonitorConfig,
    pub exclusions: ExclusionConfig,
    pub hashing: HashingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Directory to watch (default: current directory)
    pub root: Option<PathBuf>,
    /// Baseline document path
    pub baseline: PathBuf,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            root: None,
            baseline: PathBuf::from("baseline.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub auto_update: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: crate::monitor::DEFAULT_INTERVAL.as_secs(),
            auto_update: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Shell globs matched against the full path and the file name
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    pub algorithm: HashAlgorithm,
    /// Hash files in parallel during a scan
    pub parallel: bool,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append DEBUG-level logs here in addition to the console
    pub file: Option<PathBuf>,
}

/// Overrides collected from command-line flags; `None` keeps the config value
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root: Option<PathBuf>,
    pub baseline: Option<PathBuf>,
    pub exclude: Vec<String>,
    pub algorithm: Option<HashAlgorithm>,
    pub interval_secs: Option<u64>,
    pub auto_update: Option<bool>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Default config file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "hashwatch")
            .context("Could not determine a configuration directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load from the default location, falling back to defaults on any problem
    pub fn load() -> Self {
        match Self::config_path() {
            Ok(path) => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring config {}: {:#}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load the default config file, writing defaults first if it does not exist
    pub fn load_or_create() -> Self {
        if let Ok(path) = Self::config_path() {
            if !path.exists() {
                if let Err(e) = Self::default().save_to(&path) {
                    tracing::warn!("Could not write default config: {:#}", e);
                }
            }
        }
        Self::load()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Merge command-line flags; flags win, exclusion patterns accumulate
    pub fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(root) = overrides.root {
            self.target.root = Some(root);
        }
        if let Some(baseline) = overrides.baseline {
            self.target.baseline = baseline;
        }
        for pattern in overrides.exclude {
            if !self.exclusions.patterns.contains(&pattern) {
                self.exclusions.patterns.push(pattern);
            }
        }
        if let Some(algorithm) = overrides.algorithm {
            self.hashing.algorithm = algorithm;
        }
        if let Some(secs) = overrides.interval_secs {
            self.monitor.interval_secs = secs;
        }
        if let Some(auto_update) = overrides.auto_update {
            self.monitor.auto_update = auto_update;
        }
        if let Some(file) = overrides.log_file {
            self.logging.file = Some(file);
        }
    }

    /// Polling interval, never below one second
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_secs.max(1))
    }

    /// Watched root, defaulting to the current directory
    pub fn root(&self) -> PathBuf {
        self.target
            .root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.target.baseline, PathBuf::from("baseline.json"));
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert!(!config.monitor.auto_update);
        assert_eq!(config.hashing.algorithm, HashAlgorithm::Sha256);
        assert!(config.exclusions.patterns.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[monitor]\ninterval_secs = 5\nauto_update = true\n\n[hashing]\nalgorithm = \"blake3\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.monitor.interval_secs, 5);
        assert!(config.monitor.auto_update);
        assert_eq!(config.hashing.algorithm, HashAlgorithm::Blake3);
        assert!(config.hashing.parallel);
        assert_eq!(config.target, TargetConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.exclusions.patterns = vec!["*.tmp".to_string(), ".git".to_string()];
        config.logging.file = Some(PathBuf::from("fim.log"));
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[monitor\ninterval_secs = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();
        config.exclusions.patterns = vec!["*.log".to_string()];
        config.apply_cli_overrides(CliOverrides {
            root: Some(PathBuf::from("/srv/www")),
            exclude: vec!["*.log".to_string(), "cache".to_string()],
            interval_secs: Some(0),
            auto_update: Some(true),
            ..CliOverrides::default()
        });

        assert_eq!(config.root(), PathBuf::from("/srv/www"));
        assert_eq!(config.exclusions.patterns, vec!["*.log", "cache"]);
        assert_eq!(config.interval(), Duration::from_secs(1));
        assert!(config.monitor.auto_update);
        assert_eq!(config.target.baseline, PathBuf::from("baseline.json"));
    }
}
