//! Streaming content digests
//!
//! Files are read in fixed 64 KiB blocks so memory use stays constant no
//! matter how large the file is. Read failures never propagate: they are
//! folded into a sentinel digest such as `<ERROR:PermissionDenied>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Block size used when streaming file content into the hasher
pub const CHUNK_SIZE: usize = 64 * 1024;

const SENTINEL_PREFIX: &str = "<ERROR:";

/// Content digest algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Digest a file, returning a lowercase hex string or a sentinel
    pub fn digest(&self, path: &Path) -> String {
        match self.try_digest(path) {
            Ok(hex) => hex,
            Err(e) => sentinel(&e),
        }
    }

    fn try_digest(&self, path: &Path) -> io::Result<String> {
        let file = File::open(path)?;
        match self {
            HashAlgorithm::Sha256 => {
                use sha2::{Digest, Sha256};
                let mut hasher = Sha256::new();
                stream_blocks(file, |block| hasher.update(block))?;
                Ok(format!("{:x}", hasher.finalize()))
            }
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                stream_blocks(file, |block| {
                    hasher.update(block);
                })?;
                Ok(hasher.finalize().to_hex().to_string())
            }
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            other => Err(format!("unknown hash algorithm '{}' (expected sha256 or blake3)", other)),
        }
    }
}

/// Feed a reader to `update` one block at a time
fn stream_blocks<R: Read>(mut reader: R, mut update: impl FnMut(&[u8])) -> io::Result<()> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        update(&buffer[..bytes_read]);
    }
    Ok(())
}

/// Encode a read failure as a digest that can never collide with real hex
pub fn sentinel(err: &io::Error) -> String {
    format!("{}{:?}>", SENTINEL_PREFIX, err.kind())
}

/// True if `digest` records a read failure rather than content
pub fn is_sentinel(digest: &str) -> bool {
    digest.starts_with(SENTINEL_PREFIX)
}
