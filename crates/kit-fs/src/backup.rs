//! Single-file backups
//!
//! Before a managed file is rewritten, the previous content is copied to a
//! `<name>.bak` sibling. Only the most recent prior version is kept.

use std::fs;
use std::path::{Path, PathBuf};

use crate::io::backup_sibling;
use crate::{Error, Result};

/// Copy the current content of `path` to its `.bak` sibling.
///
/// Returns the backup path, or `None` when `path` does not exist yet (a
/// first write has nothing to back up). An existing backup is replaced.
pub fn backup_file(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let backup = backup_sibling(path);
    fs::copy(path, &backup).map_err(|e| Error::io(&backup, e))?;
    tracing::debug!(path = %path.display(), backup = %backup.display(), "backed up previous content");
    Ok(Some(backup))
}
