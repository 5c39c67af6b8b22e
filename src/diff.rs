//! Baseline vs. current comparison
//!
//! Classification is path-keyed set algebra over the two file maps:
//! `added = C - B`, `deleted = B - C`, and `modified` holds the shared keys
//! whose digests differ. Size and mtime are carried for reporting but never
//! decide anything. A moved file therefore shows up as one deletion plus
//! one addition.

use crate::snapshot::{FileMap, FileRecord, Snapshot};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddedFile {
    pub path: String,
    pub current: FileRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletedFile {
    pub path: String,
    pub baseline: FileRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifiedFile {
    pub path: String,
    pub baseline: FileRecord,
    pub current: FileRecord,
}

/// Drift between a baseline and a scan; each list is sorted by path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffResult {
    pub added: Vec<AddedFile>,
    pub deleted: Vec<DeletedFile>,
    pub modified: Vec<ModifiedFile>,
}

impl DiffResult {
    /// Total number of changed paths
    pub fn change_count(&self) -> usize {
        self.added.len() + self.deleted.len() + self.modified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}

/// Compare a baseline snapshot with a freshly scanned file map
pub fn diff(baseline: &Snapshot, current: &FileMap) -> DiffResult {
    diff_files(&baseline.files, current)
}

/// Compare two file maps directly
pub fn diff_files(baseline: &FileMap, current: &FileMap) -> DiffResult {
    let mut result = DiffResult::default();

    // Both maps iterate in key order, so every list comes out sorted
    for (path, old) in baseline {
        match current.get(path) {
            Some(new) if new.digest != old.digest => result.modified.push(ModifiedFile {
                path: path.clone(),
                baseline: old.clone(),
                current: new.clone(),
            }),
            Some(_) => {}
            None => result.deleted.push(DeletedFile {
                path: path.clone(),
                baseline: old.clone(),
            }),
        }
    }

    for (path, new) in current {
        if !baseline.contains_key(path) {
            result.added.push(AddedFile {
                path: path.clone(),
                current: new.clone(),
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::ExclusionRules;
    use crate::hash::HashAlgorithm;
    use crate::scanner::PathScanner;
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn scan(root: &Path) -> FileMap {
        PathScanner::new(HashAlgorithm::Sha256, ExclusionRules::none())
            .scan(root)
            .unwrap()
    }

    fn tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("etc/conf.d")).unwrap();
        fs::write(root.join("etc/hosts"), "127.0.0.1 localhost\n").unwrap();
        fs::write(root.join("etc/conf.d/app.conf"), "port=80\n").unwrap();
        fs::write(root.join("README"), "hello").unwrap();
        temp_dir
    }

    fn paths_added(d: &DiffResult) -> Vec<&str> {
        d.added.iter().map(|a| a.path.as_str()).collect()
    }

    fn paths_deleted(d: &DiffResult) -> Vec<&str> {
        d.deleted.iter().map(|a| a.path.as_str()).collect()
    }

    fn paths_modified(d: &DiffResult) -> Vec<&str> {
        d.modified.iter().map(|a| a.path.as_str()).collect()
    }

    #[test]
    fn test_unchanged_tree_has_no_drift() {
        let temp_dir = tree();
        let baseline = scan(temp_dir.path());
        let result = diff_files(&baseline, &scan(temp_dir.path()));
        assert!(result.is_empty());
    }

    #[test]
    fn test_single_addition() {
        let temp_dir = tree();
        let baseline = scan(temp_dir.path());
        fs::write(temp_dir.path().join("etc/new.conf"), "x").unwrap();

        let result = diff_files(&baseline, &scan(temp_dir.path()));
        assert_eq!(paths_added(&result), vec!["etc/new.conf"]);
        assert!(result.deleted.is_empty());
        assert!(result.modified.is_empty());
    }

    #[test]
    fn test_single_deletion() {
        let temp_dir = tree();
        let baseline = scan(temp_dir.path());
        fs::remove_file(temp_dir.path().join("etc/hosts")).unwrap();

        let result = diff_files(&baseline, &scan(temp_dir.path()));
        assert_eq!(paths_deleted(&result), vec!["etc/hosts"]);
        assert_eq!(result.deleted[0].baseline, baseline["etc/hosts"]);
        assert_eq!(result.change_count(), 1);
    }

    #[test]
    fn test_content_change_is_modified_once() {
        let temp_dir = tree();
        let baseline = scan(temp_dir.path());
        // Same length, different bytes
        fs::write(temp_dir.path().join("README"), "HELLO").unwrap();

        let result = diff_files(&baseline, &scan(temp_dir.path()));
        assert_eq!(paths_modified(&result), vec!["README"]);
        assert!(result.added.is_empty());
        assert!(result.deleted.is_empty());
        let m = &result.modified[0];
        assert_ne!(m.baseline.digest, m.current.digest);
        assert_eq!(m.baseline.size, m.current.size);
    }

    #[test]
    fn test_touch_without_content_change_is_not_modified() {
        let temp_dir = tree();
        let baseline = scan(temp_dir.path());

        let file = fs::File::options()
            .write(true)
            .open(temp_dir.path().join("README"))
            .unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(3600)).unwrap();
        drop(file);

        let current = scan(temp_dir.path());
        assert_ne!(baseline["README"].modified_at, current["README"].modified_at);
        assert!(diff_files(&baseline, &current).is_empty());
    }

    #[test]
    fn test_rename_is_delete_plus_add() {
        let temp_dir = tree();
        let baseline = scan(temp_dir.path());
        fs::rename(
            temp_dir.path().join("etc/hosts"),
            temp_dir.path().join("etc/hosts.moved"),
        )
        .unwrap();

        let result = diff_files(&baseline, &scan(temp_dir.path()));
        assert_eq!(paths_deleted(&result), vec!["etc/hosts"]);
        assert_eq!(paths_added(&result), vec!["etc/hosts.moved"]);
        assert!(result.modified.is_empty());
        assert_eq!(result.added[0].current.digest, result.deleted[0].baseline.digest);
    }

    #[test]
    fn test_sentinel_becoming_readable_is_modified() {
        let mut baseline = FileMap::new();
        baseline.insert("secret".into(), FileRecord::new("<ERROR:PermissionDenied>", None, None));
        baseline.insert("stable".into(), FileRecord::new("<ERROR:PermissionDenied>", None, None));
        let mut current = FileMap::new();
        current.insert("secret".into(), FileRecord::new("abcdef", Some(6), Some(1.0)));
        current.insert("stable".into(), FileRecord::new("<ERROR:PermissionDenied>", None, None));

        let result = diff_files(&baseline, &current);
        assert_eq!(paths_modified(&result), vec!["secret"]);
    }

    #[test]
    fn test_lists_are_disjoint_and_sorted() {
        let mut baseline = FileMap::new();
        let mut current = FileMap::new();
        for name in ["d", "b", "a"] {
            baseline.insert(name.into(), FileRecord::new("1", None, None));
        }
        current.insert("a".into(), FileRecord::new("2", None, None));
        current.insert("z".into(), FileRecord::new("1", None, None));
        current.insert("c".into(), FileRecord::new("1", None, None));

        let result = diff_files(&baseline, &current);
        assert_eq!(paths_added(&result), vec!["c", "z"]);
        assert_eq!(paths_deleted(&result), vec!["b", "d"]);
        assert_eq!(paths_modified(&result), vec!["a"]);
    }
}
