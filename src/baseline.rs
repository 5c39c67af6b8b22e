//! Baseline persistence
//!
//! The baseline is only ever replaced wholesale. Writes go to a temporary
//! file in the same directory which is synced and then renamed over the
//! target, so a reader sees either the previous complete document or the
//! new one. Writers serialize on an advisory lock held on `<baseline>.lock`.

use crate::error::{FimError, Result};
use crate::snapshot::Snapshot;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// JSON baseline document on disk
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file writers lock while replacing the baseline
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Load the baseline
    ///
    /// Returns `Ok(None)` when no baseline has been written yet. That is
    /// different from a baseline with zero files, which loads as `Some`.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(FimError::BaselineRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| FimError::CorruptBaseline {
                path: self.path.clone(),
                source,
            })
    }

    /// Atomically replace the baseline with `snapshot`
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        self.write_atomic_with(snapshot, |file, bytes| file.write_all(bytes))
            .map_err(|source| FimError::Persistence {
                path: self.path.clone(),
                source,
            })
    }

    /// Replace the document, handing the serialized bytes to `write`
    ///
    /// `write` fills the temporary file. If it fails, the temporary file is
    /// removed and the current document is left untouched.
    fn write_atomic_with<W>(&self, snapshot: &Snapshot, write: W) -> io::Result<()>
    where
        W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "baseline path has no file name"))?
            .to_string_lossy()
            .into_owned();

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock.write()?;
        tracing::debug!("Acquired baseline write lock {}", self.lock_path().display());

        // Dropping the temp file on any error below deletes it
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".tmp")
            .tempfile_in(&parent)?;
        write(temp.as_file_mut(), json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        sync_dir(&parent);
        Ok(())
    }
}

/// Flush the directory entry for the rename (best effort, Unix only)
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        if let Err(e) = handle.sync_all() {
            tracing::debug!("Could not sync directory {}: {}", dir.display(), e);
        }
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;
    use crate::snapshot::{FileMap, FileRecord};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn snapshot_with(entries: &[(&str, &str)]) -> Snapshot {
        let mut files = FileMap::new();
        for (path, digest) in entries {
            files.insert(path.to_string(), FileRecord::new(*digest, Some(1), Some(2.0)));
        }
        Snapshot::new(Path::new("/watched"), HashAlgorithm::Sha256, files)
    }

    fn leftover_temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_missing_baseline_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = BaselineStore::new(temp_dir.path().join("baseline.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_empty_baseline_is_not_missing() {
        let temp_dir = TempDir::new().unwrap();
        let store = BaselineStore::new(temp_dir.path().join("baseline.json"));
        store.save(&snapshot_with(&[])).unwrap();

        let loaded = store.load().unwrap().expect("baseline should exist");
        assert_eq!(loaded.file_count(), 0);
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = BaselineStore::new(temp_dir.path().join("baseline.json"));
        let snapshot = snapshot_with(&[("a.txt", "aa"), ("dir/b.txt", "bb")]);
        store.save(&snapshot).unwrap();

        assert_eq!(store.load().unwrap(), Some(snapshot));
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
        assert!(store.lock_path().exists());
    }

    #[test]
    fn test_save_replaces_whole_document() {
        let temp_dir = TempDir::new().unwrap();
        let store = BaselineStore::new(temp_dir.path().join("baseline.json"));
        store.save(&snapshot_with(&[("old.txt", "11"), ("both.txt", "22")])).unwrap();
        store.save(&snapshot_with(&[("both.txt", "33")])).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.files.keys().collect::<Vec<_>>(), vec!["both.txt"]);
        assert_eq!(loaded.files["both.txt"].digest, "33");
    }

    #[test]
    fn test_corrupt_baseline_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("baseline.json");
        fs::write(&path, "{\"meta\": {\"generated_at\": ").unwrap();
        let store = BaselineStore::new(&path);
        assert!(matches!(store.load(), Err(FimError::CorruptBaseline { .. })));
    }

    #[test]
    fn test_interrupted_write_leaves_previous_baseline() {
        let temp_dir = TempDir::new().unwrap();
        let store = BaselineStore::new(temp_dir.path().join("baseline.json"));
        let previous = snapshot_with(&[("keep.txt", "cafe")]);
        store.save(&previous).unwrap();

        // The write dies halfway through the new document
        let err = store
            .write_atomic_with(&snapshot_with(&[("new.txt", "beef")]), |file, bytes| {
                file.write_all(&bytes[..bytes.len() / 2])?;
                file.sync_all()?;
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");

        assert_eq!(store.load().unwrap(), Some(previous));
        assert!(leftover_temp_files(temp_dir.path()).is_empty());

        // The next complete write goes through
        let next = snapshot_with(&[("new.txt", "beef")]);
        store.save(&next).unwrap();
        assert_eq!(store.load().unwrap(), Some(next));
    }

    #[test]
    fn test_failed_save_reports_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = BaselineStore::new(temp_dir.path().join("no-such-dir").join("baseline.json"));
        let err = store.save(&snapshot_with(&[("a", "b")])).unwrap_err();
        assert!(matches!(err, FimError::Persistence { .. }));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_concurrent_writers_never_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(BaselineStore::new(temp_dir.path().join("baseline.json")));

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let name = format!("writer{}-{}.txt", w, i);
                        store.save(&snapshot_with(&[(name.as_str(), "00")])).unwrap();
                        // Every load sees a complete document
                        assert!(store.load().unwrap().is_some());
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let last = store.load().unwrap().unwrap();
        assert_eq!(last.file_count(), 1);
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }
}
