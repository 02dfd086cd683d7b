// src/transform/output.rs

//! Content-addressed output writes.
//!
//! Outputs are only rewritten when their blake3 digest changes, so running a
//! rule twice on unchanged inputs leaves every file (and its mtime) alone and
//! the dispatcher sees no change to reload for.

use std::path::Path;

use blake3::Hasher;
use tracing::{debug, trace};

use crate::errors::{Result, SitepipeError};
use crate::fs::FileSystem;

/// Hex blake3 digest of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize().to_hex().to_string()
}

/// Digest of a file's current content, or `None` if it does not exist.
pub fn file_digest(fs: &dyn FileSystem, path: &Path) -> Result<Option<String>> {
    if !fs.is_file(path) {
        return Ok(None);
    }
    let bytes = fs.read(path).map_err(|e| SitepipeError::io(path, e))?;
    Ok(Some(digest(&bytes)))
}

/// Whether a write happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Write `contents` to `path` unless the file already holds exactly these
/// bytes. Parent directories are created as needed.
pub fn write_if_changed(
    fs: &dyn FileSystem,
    path: &Path,
    contents: &[u8],
) -> Result<WriteOutcome> {
    if let Some(existing) = file_digest(fs, path)? {
        if existing == digest(contents) {
            trace!(path = ?path, "output unchanged; skipping write");
            return Ok(WriteOutcome::Unchanged);
        }
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs.create_dir_all(parent)
                .map_err(|e| SitepipeError::io(parent, e))?;
        }
    }

    fs.write(path, contents)
        .map_err(|e| SitepipeError::io(path, e))?;
    debug!(path = ?path, bytes = contents.len(), "wrote output");
    Ok(WriteOutcome::Written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn digest_matches_known_vector() {
        assert_eq!(
            digest(b"hello world"),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn second_identical_write_is_skipped() {
        let fs = MockFileSystem::new();
        let path = Path::new("docs/css/main.css");
        assert_eq!(write_if_changed(&fs, path, b"a{}").unwrap(), WriteOutcome::Written);
        assert_eq!(write_if_changed(&fs, path, b"a{}").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(write_if_changed(&fs, path, b"b{}").unwrap(), WriteOutcome::Written);
    }

    #[test]
    fn uncreatable_parent_is_an_io_error() {
        let fs = MockFileSystem::new();
        fs.add_blocking_file("docs/css");
        let err = write_if_changed(&fs, Path::new("docs/css/main.css"), b"a{}").unwrap_err();
        assert!(matches!(err, SitepipeError::Io { .. }));
    }
}
