//! Shared path and metadata helpers

use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Make a path absolute and lexically normalized (`.` and `..` removed)
///
/// Symlinks are not resolved, so the result names the same location the
/// caller typed even when it passes through a link.
pub fn normalize_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root is a no-op, like `cd /..`
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Relative key for `path` under `root`, always `/`-separated
///
/// Names that are not valid Unicode keep their raw bytes as `%XX` escapes
/// (see [`component_key`]), so two distinct files never share a key.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(component_key(part)),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Key text for one path component
///
/// Valid UTF-8 names are used verbatim. In any other name every byte that
/// is not part of a valid UTF-8 sequence becomes `%XX`, and a literal `%`
/// becomes `%25` so the escaping stays reversible.
pub fn component_key(part: &OsStr) -> String {
    match part.to_str() {
        Some(name) => name.to_string(),
        None => escape_invalid(part),
    }
}

#[cfg(unix)]
fn escape_invalid(part: &OsStr) -> String {
    use std::os::unix::ffi::OsStrExt;

    let mut key = String::new();
    let mut rest = part.as_bytes();
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                push_escaped_text(&mut key, valid);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                push_escaped_text(&mut key, std::str::from_utf8(valid).unwrap_or_default());
                let bad = e.error_len().unwrap_or(after.len());
                for byte in &after[..bad] {
                    key.push_str(&format!("%{:02X}", byte));
                }
                rest = &after[bad..];
            }
        }
    }
    key
}

#[cfg(windows)]
fn escape_invalid(part: &OsStr) -> String {
    use std::os::windows::ffi::OsStrExt;

    // Unpaired surrogates are the only way a Windows name can fail to be UTF-8
    let mut key = String::new();
    for unit in char::decode_utf16(part.encode_wide()) {
        match unit {
            Ok('%') => key.push_str("%25"),
            Ok(c) => key.push(c),
            Err(e) => key.push_str(&format!("%u{:04X}", e.unpaired_surrogate())),
        }
    }
    key
}

#[cfg(not(any(unix, windows)))]
fn escape_invalid(part: &OsStr) -> String {
    part.to_string_lossy().into_owned()
}

#[cfg(unix)]
fn push_escaped_text(key: &mut String, text: &str) {
    for c in text.chars() {
        if c == '%' {
            key.push_str("%25");
        } else {
            key.push(c);
        }
    }
}

/// Seconds since the Unix epoch as a float (negative before 1970)
pub fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Normalize a path for display (strip Windows long-path prefixes).
pub fn display_path(path: &Path) -> String {
    let path_str = path.to_string_lossy().to_string();
    #[cfg(windows)]
    {
        if let Some(stripped) = path_str.strip_prefix(r"\\?\UNC\") {
            return format!(r"\\{}", stripped);
        }
        if let Some(stripped) = path_str.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }
    path_str
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[cfg(unix)]
    #[test]
    fn test_normalize_path_removes_dots() {
        let p = normalize_path(Path::new("/srv/./data/../watched/")).unwrap();
        assert_eq!(p, PathBuf::from("/srv/watched"));

        let p = normalize_path(Path::new("/../etc")).unwrap();
        assert_eq!(p, PathBuf::from("/etc"));
    }

    #[test]
    fn test_normalize_relative_is_absolute() {
        let p = normalize_path(Path::new("some/dir")).unwrap();
        assert!(p.is_absolute());
        assert!(p.ends_with("some/dir"));
    }

    #[test]
    fn test_relative_key_uses_forward_slashes() {
        let root = Path::new("/srv/data");
        let file = root.join("a").join("b").join("c.txt");
        assert_eq!(relative_key(root, &file).as_deref(), Some("a/b/c.txt"));
        assert_eq!(relative_key(root, root), None);
        assert_eq!(relative_key(root, Path::new("/elsewhere/x")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_get_distinct_keys() {
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new("/srv/data");
        let ff = root.join(OsStr::from_bytes(b"a\xff"));
        let fe = root.join(OsStr::from_bytes(b"a\xfe"));
        assert_eq!(relative_key(root, &ff).as_deref(), Some("a%FF"));
        assert_eq!(relative_key(root, &fe).as_deref(), Some("a%FE"));

        // Valid names are untouched, even with a literal percent sign
        assert_eq!(component_key(OsStr::new("100%.txt")), "100%.txt");
        // Inside an escaped name the percent sign is escaped too
        assert_eq!(component_key(OsStr::from_bytes(b"%FF\xff")), "%25FF%FF");
        assert_eq!(component_key(OsStr::from_bytes(b"\xc3\xa9\xff")), "\u{e9}%FF");
    }

    #[test]
    fn test_epoch_seconds() {
        let t = UNIX_EPOCH + Duration::from_millis(1500);
        assert_eq!(epoch_seconds(t), 1.5);
        let before = UNIX_EPOCH - Duration::from_secs(2);
        assert_eq!(epoch_seconds(before), -2.0);
    }
}
