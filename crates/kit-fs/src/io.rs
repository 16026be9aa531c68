//! Atomic file I/O
//!
//! All persisted state goes through [`atomic_write`]: content is staged to a
//! temporary sibling in the destination directory, flushed to stable storage,
//! then renamed over the destination in a single step. A failed or
//! interrupted write discards the in-flight change and leaves the previous
//! file intact. Readers that hold the shared lock never observe a
//! half-written file.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Write `content` to `path` atomically.
///
/// Holds an exclusive advisory lock on the destination for the duration of
/// the stage-and-rename so readers using [`read_locked`] cannot race the
/// swap. Parent directories are created as needed. The staging file lives in
/// the same directory as the destination so the final rename never crosses a
/// filesystem boundary; it is removed automatically if any step fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let guard = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    guard.lock_exclusive().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    let mut staged = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    staged
        .write_all(content)
        .map_err(|e| Error::io(staged.path(), e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| Error::io(staged.path(), e))?;
    staged.persist(path).map_err(|e| Error::io(path, e.error))?;

    // The guard handle still refers to the replaced inode; releasing it is
    // best-effort.
    let _ = FileExt::unlock(&guard);

    tracing::debug!(path = %path.display(), bytes = content.len(), "atomic write committed");
    Ok(())
}

/// Read the raw bytes of `path` under a shared advisory lock.
pub fn read_locked(path: &Path) -> Result<Vec<u8>> {
    let file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    file.lock_shared().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    // Read through the locked handle to avoid a TOCTOU race with writers.
    let mut content = Vec::new();
    (&file)
        .read_to_end(&mut content)
        .map_err(|e| Error::io(path, e))?;
    Ok(content)
}

/// Read `path` as UTF-8 text under a shared advisory lock.
pub fn read_to_string_locked(path: &Path) -> Result<String> {
    let bytes = read_locked(path)?;
    String::from_utf8(bytes).map_err(|e| {
        Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}

/// Owned path helper: the conventional sibling backup location for `path`.
pub(crate) fn backup_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".bak");
    path.with_file_name(name)
}
