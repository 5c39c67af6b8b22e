use crate::error::{FimError, Result};
use crate::exclusion::ExclusionRules;
use crate::hash::HashAlgorithm;
use crate::snapshot::{FileMap, FileRecord};
use crate::utils;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Walks a directory tree and captures a digest for every retained file
///
/// Handles errors gracefully - an unreadable file is recorded with a
/// sentinel digest and an unreadable subdirectory is skipped. Only a
/// missing or unreadable root fails the scan.
#[derive(Debug, Clone)]
pub struct PathScanner {
    algorithm: HashAlgorithm,
    exclusions: ExclusionRules,
    parallel: bool,
}

impl PathScanner {
    pub fn new(algorithm: HashAlgorithm, exclusions: ExclusionRules) -> Self {
        Self {
            algorithm,
            exclusions,
            parallel: false,
        }
    }

    /// Hash files on the rayon pool instead of one at a time
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Scan `root` and return every retained file keyed by relative path
    pub fn scan(&self, root: &Path) -> Result<FileMap> {
        self.scan_with_progress(root, &|_: &str| {})
    }

    /// Like [`scan`](Self::scan), calling `on_file` once per hashed file
    pub fn scan_with_progress<F>(&self, root: &Path, on_file: &F) -> Result<FileMap>
    where
        F: Fn(&str) + Sync,
    {
        let candidates = self.collect_candidates(root)?;

        let hash_one = |(key, path): &(String, PathBuf)| {
            let record = self.record_for(path);
            on_file(key);
            (key.clone(), record)
        };

        // The map is fully assembled here before anyone can diff it
        let files: FileMap = if self.parallel {
            candidates.par_iter().map(hash_one).collect()
        } else {
            candidates.iter().map(hash_one).collect()
        };

        if files.len() != candidates.len() {
            tracing::warn!(
                "{} paths under {} collapsed onto duplicate keys",
                candidates.len() - files.len(),
                root.display()
            );
        }
        Ok(files)
    }

    /// Walk the tree, pruning excluded directories before descending
    fn collect_candidates(&self, root: &Path) -> Result<Vec<(String, PathBuf)>> {
        let root_meta = fs::metadata(root).map_err(|source| FimError::ScanRoot {
            path: root.to_path_buf(),
            source,
        })?;
        if !root_meta.is_dir() {
            return Err(FimError::ScanRoot {
                path: root.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let mut candidates = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.exclusions.is_excluded(e.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(FimError::ScanRoot {
                        path: root.to_path_buf(),
                        source: e
                            .into_io_error()
                            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed")),
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !is_candidate(&entry) {
                continue;
            }
            if let Some(key) = utils::relative_key(root, entry.path()) {
                candidates.push((key, entry.into_path()));
            }
        }

        Ok(candidates)
    }

    fn record_for(&self, path: &Path) -> FileRecord {
        let digest = self.algorithm.digest(path);
        // Best-effort metadata: a stat failure leaves both fields empty
        let (size, modified_at) = match fs::metadata(path) {
            Ok(meta) => (
                Some(meta.len()),
                meta.modified().ok().map(utils::epoch_seconds),
            ),
            Err(_) => (None, None),
        };
        FileRecord::new(digest, size, modified_at)
    }
}

/// Regular files, plus symlinks that point at a file or nowhere
///
/// Directory symlinks are never followed, so link cycles cannot recurse.
/// Sockets, FIFOs and device nodes are skipped since opening them may block.
fn is_candidate(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    if !file_type.is_symlink() {
        return false;
    }
    match fs::metadata(entry.path()) {
        Ok(target) if target.is_dir() => {
            tracing::debug!("Not following directory symlink {}", entry.path().display());
            false
        }
        Ok(target) => target.is_file(),
        // Dangling link: keep it so the sentinel digest shows up
        Err(_) => true,
    }
}
