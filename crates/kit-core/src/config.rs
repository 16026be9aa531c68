//! Runtime paths context
//!
//! Every component receives an explicit [`RuntimeContext`] at construction
//! instead of reading ambient process-global locations, so tests can point
//! each component at isolated temporary roots.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Where an installation lives: per-project or per-user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Project,
    Global,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Project => f.write_str("project"),
            Scope::Global => f.write_str("global"),
        }
    }
}

/// Resolved filesystem roots for one command invocation.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Root under which repository checkouts are materialized, one
    /// subdirectory per namespace.
    pub library_root: PathBuf,
    /// Per-user state directory: global install records and credentials.
    pub global_dir: PathBuf,
    /// The project being operated on.
    pub project_root: PathBuf,
    /// Project state directory (`.kit/` under the project root).
    pub project_dir: PathBuf,
}

impl RuntimeContext {
    /// Resolve the standard layout for `project_root`.
    ///
    /// Global state lives under the platform data directory; the library of
    /// checkouts is shared across projects inside it.
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let project_root = dunce::canonicalize(project_root)
            .map_err(|e| Error::Fs(kit_fs::Error::io(project_root, e)))?;
        let global_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(Error::HomeDirNotFound)?
            .join("kit");
        Ok(Self {
            library_root: global_dir.join("library"),
            project_dir: project_root.join(".kit"),
            project_root,
            global_dir,
        })
    }

    /// Explicit-roots constructor for tests and embedding.
    pub fn with_roots(
        library_root: impl Into<PathBuf>,
        global_dir: impl Into<PathBuf>,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            library_root: library_root.into(),
            global_dir: global_dir.into(),
            project_dir: project_root.join(".kit"),
            project_root,
        }
    }

    /// The state directory owning a scope's records and credentials.
    pub fn state_dir(&self, scope: Scope) -> &Path {
        match scope {
            Scope::Project => &self.project_dir,
            Scope::Global => &self.global_dir,
        }
    }

    /// The installation record store for a scope.
    pub fn records_path(&self, scope: Scope) -> PathBuf {
        self.state_dir(scope).join("installs.toml")
    }

    /// The credential store file for a scope.
    pub fn credentials_path(&self, scope: Scope) -> PathBuf {
        self.state_dir(scope).join("credentials.env")
    }

    /// The active-set record for this project.
    pub fn active_set_path(&self) -> PathBuf {
        self.project_dir.join("active-set.toml")
    }

    /// Root under which a scope's artifact content is installed.
    pub fn install_root(&self, scope: Scope) -> PathBuf {
        self.state_dir(scope).join("artifacts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scope_paths_are_disjoint() {
        let ctx = RuntimeContext::with_roots("/lib", "/global", "/project");

        assert_eq!(ctx.records_path(Scope::Global), PathBuf::from("/global/installs.toml"));
        assert_eq!(
            ctx.records_path(Scope::Project),
            PathBuf::from("/project/.kit/installs.toml")
        );
        assert_ne!(
            ctx.credentials_path(Scope::Global),
            ctx.credentials_path(Scope::Project)
        );
    }

    #[test]
    fn install_roots_follow_scope() {
        let ctx = RuntimeContext::with_roots("/lib", "/global", "/project");
        assert_eq!(
            ctx.install_root(Scope::Project),
            PathBuf::from("/project/.kit/artifacts")
        );
        assert_eq!(ctx.install_root(Scope::Global), PathBuf::from("/global/artifacts"));
    }

    #[test]
    fn scope_displays_lowercase() {
        assert_eq!(Scope::Project.to_string(), "project");
        assert_eq!(Scope::Global.to_string(), "global");
    }
}
