//! Snapshot data model
//!
//! A snapshot maps paths relative to a root (always `/`-separated) to the
//! digest and best-effort metadata captured for that file. The persisted
//! form is:
//!
//! ```json
//! {
//!   "meta": { "generated_at": "...Z", "root": "/abs/root", "algorithm": "sha256" },
//!   "files": { "dir/file.txt": { "hash": "...", "size": 12, "mtime": 1700000000.5 } }
//! }
//! ```

use crate::hash::{self, HashAlgorithm};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Relative path -> record, iterated in sorted key order
pub type FileMap = BTreeMap<String, FileRecord>;

/// Digest and metadata for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Hex content digest, or a sentinel when the file could not be read
    #[serde(rename = "hash")]
    pub digest: String,
    /// Size in bytes (`None` if stat failed)
    #[serde(default)]
    pub size: Option<u64>,
    /// Modification time in seconds since the Unix epoch (`None` if stat failed)
    #[serde(rename = "mtime", default)]
    pub modified_at: Option<f64>,
}

impl FileRecord {
    pub fn new(digest: impl Into<String>, size: Option<u64>, modified_at: Option<f64>) -> Self {
        Self {
            digest: digest.into(),
            size,
            modified_at,
        }
    }

    /// True if the file was unreadable when captured
    pub fn is_unreadable(&self) -> bool {
        hash::is_sentinel(&self.digest)
    }
}

/// Point-in-time capture of a directory tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SnapshotDocument", into = "SnapshotDocument")]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    /// Normalized absolute path the relative keys hang off
    pub root: PathBuf,
    /// Algorithm every digest in `files` was produced with
    pub algorithm: HashAlgorithm,
    pub files: FileMap,
}

impl Snapshot {
    /// Stamp a freshly scanned file map with the current time
    pub fn new(root: &Path, algorithm: HashAlgorithm, files: FileMap) -> Self {
        Self {
            generated_at: Utc::now(),
            root: root.to_path_buf(),
            algorithm,
            files,
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Sum of known file sizes
    pub fn total_size(&self) -> u64 {
        self.files.values().filter_map(|r| r.size).sum()
    }

    /// Number of files captured with a sentinel digest
    pub fn unreadable_count(&self) -> usize {
        self.files.values().filter(|r| r.is_unreadable()).count()
    }
}

#[derive(Serialize, Deserialize, Clone)]
struct SnapshotDocument {
    meta: SnapshotMeta,
    #[serde(default)]
    files: FileMap,
}

#[derive(Serialize, Deserialize, Clone)]
struct SnapshotMeta {
    generated_at: DateTime<Utc>,
    root: PathBuf,
    // Documents written before algorithm selection existed are SHA-256
    #[serde(default)]
    algorithm: HashAlgorithm,
}

impl From<SnapshotDocument> for Snapshot {
    fn from(doc: SnapshotDocument) -> Self {
        Self {
            generated_at: doc.meta.generated_at,
            root: doc.meta.root,
            algorithm: doc.meta.algorithm,
            files: doc.files,
        }
    }
}

impl From<Snapshot> for SnapshotDocument {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            meta: SnapshotMeta {
                generated_at: snapshot.generated_at,
                root: snapshot.root,
                algorithm: snapshot.algorithm,
            },
            files: snapshot.files,
        }
    }
}
