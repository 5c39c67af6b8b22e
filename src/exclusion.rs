//! Shell-glob exclusion rules
//!
//! Each pattern is tested independently against the full path and against
//! the base name, so `*.log` excludes every log file while `/srv/app/cache*`
//! targets one location. `*` also matches path separators, the way shell
//! `fnmatch` does. A directory that matches is pruned together with its
//! whole subtree by the scanner.

use crate::error::{FimError, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

/// Compiled exclusion patterns plus paths the engine reserves for itself
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    patterns: Vec<String>,
    set: GlobSet,
    /// Baseline documents (and their lock/temp siblings) that must never be scanned
    reserved: Vec<PathBuf>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
            reserved: Vec::new(),
        }
    }
}

impl ExclusionRules {
    /// Rules that exclude nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Compile shell-glob patterns
    ///
    /// # Errors
    /// Returns [`FimError::InvalidPattern`] for the first pattern that fails to parse.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(cfg!(windows))
                .literal_separator(false)
                .build()
                .map_err(|source| FimError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| FimError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })?;

        Ok(Self {
            patterns,
            set,
            reserved: Vec::new(),
        })
    }

    /// Never report `path`, nor the lock and temporary files written next to it
    pub fn reserve(&mut self, path: &Path) {
        if !self.reserved.iter().any(|p| p == path) {
            self.reserved.push(path.to_path_buf());
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check a path (file or directory) against the rules
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.is_reserved(path) {
            return true;
        }
        if self.patterns.is_empty() {
            return false;
        }
        if self.set.is_match(path) {
            return true;
        }
        path.file_name()
            .map(|name| self.set.is_match(Path::new(name)))
            .unwrap_or(false)
    }

    fn is_reserved(&self, path: &Path) -> bool {
        self.reserved.iter().any(|reserved| {
            if path == reserved {
                return true;
            }
            let (Some(name), Some(reserved_name)) = (path.file_name(), reserved.file_name()) else {
                return false;
            };
            if path.parent() != reserved.parent() {
                return false;
            }
            let name = name.to_string_lossy();
            let reserved_name = reserved_name.to_string_lossy();
            name == format!("{}.lock", reserved_name)
                || (name.starts_with(&format!(".{}.", reserved_name)) && name.ends_with(".tmp"))
        })
    }
}
