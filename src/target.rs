//! What to watch and where its baseline lives

use crate::baseline::BaselineStore;
use crate::error::{FimError, Result};
use crate::exclusion::ExclusionRules;
use crate::hash::HashAlgorithm;
use crate::scanner::PathScanner;
use crate::utils;
use std::path::{Path, PathBuf};

/// A directory tree paired with its baseline document
#[derive(Debug, Clone)]
pub struct Target {
    /// Normalized absolute root of the watched tree
    pub root: PathBuf,
    /// Normalized absolute path of the baseline document
    pub baseline: PathBuf,
    pub exclusions: ExclusionRules,
    /// Algorithm for new baselines; scans reuse the baseline's own algorithm
    pub algorithm: HashAlgorithm,
    /// Hash files on the rayon pool
    pub parallel: bool,
}

impl Target {
    /// Normalize both paths and compile the exclusion patterns
    ///
    /// The baseline document (plus its lock and temp files) is always
    /// excluded from scans so the monitor never reports its own writes.
    pub fn new<S: AsRef<str>>(root: &Path, baseline: &Path, patterns: &[S]) -> Result<Self> {
        let root = utils::normalize_path(root).map_err(|source| FimError::ScanRoot {
            path: root.to_path_buf(),
            source,
        })?;
        let baseline = utils::normalize_path(baseline).map_err(|source| FimError::BaselineRead {
            path: baseline.to_path_buf(),
            source,
        })?;

        let mut exclusions = ExclusionRules::new(patterns)?;
        exclusions.reserve(&baseline);

        Ok(Self {
            root,
            baseline,
            exclusions,
            algorithm: HashAlgorithm::default(),
            parallel: false,
        })
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn store(&self) -> BaselineStore {
        BaselineStore::new(&self.baseline)
    }

    pub(crate) fn scanner(&self, algorithm: HashAlgorithm) -> PathScanner {
        PathScanner::new(algorithm, self.exclusions.clone()).parallel(self.parallel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_baseline_inside_root_is_never_scanned() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("data.txt"), "data").unwrap();
        fs::write(root.join("baseline.json"), "{}").unwrap();
        fs::write(root.join("baseline.json.lock"), "").unwrap();

        let target = Target::new(root, &root.join("baseline.json"), &["*.bak"]).unwrap();
        let files = target.scanner(HashAlgorithm::Sha256).scan(&target.root).unwrap();
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["data.txt"]);
    }

    #[test]
    fn test_paths_are_normalized() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("a").join("..").join("b");
        let target = Target::new(&root, Path::new("rel-baseline.json"), &[] as &[&str]).unwrap();
        assert!(target.root.ends_with("b"));
        assert!(!target.root.to_string_lossy().contains(".."));
        assert!(target.baseline.is_absolute());
    }
}
