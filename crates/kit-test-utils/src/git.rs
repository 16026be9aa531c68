//! Scripted git remotes for tests.
//!
//! [`RemoteFixture`] drives the `git` CLI against a temporary directory to
//! build a real repository that checkout and classification code can treat
//! as an upstream. The fixture owns the directory; it disappears on drop.

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// A real git repository acting as a remote, scripted through the git CLI.
pub struct RemoteFixture {
    dir: TempDir,
    location: String,
}

impl RemoteFixture {
    /// Initialise a repository with one commit on `main`.
    ///
    /// Configures `user.email`, `user.name`, and `commit.gpgsign = false`
    /// so commits succeed in any environment.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn init() -> Self {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("RemoteFixture: tempdir failed: {e}"));
        let location = dir.path().to_string_lossy().into_owned();
        let fixture = Self { dir, location };

        fixture.git(&["init", "--initial-branch=main"]);
        fixture.git(&["config", "user.email", "test@test.com"]);
        fixture.git(&["config", "user.name", "Test User"]);
        fixture.git(&["config", "commit.gpgsign", "false"]);
        fixture.write("README.md", "# Fixture\n");
        fixture.commit_all("Initial commit");
        fixture
    }

    /// The location string install/checkout code should use for this remote.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write (or overwrite) a file relative to the repository root.
    ///
    /// # Panics
    /// Panics on filesystem failure.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("RemoteFixture: create_dir_all failed: {e}"));
        }
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("RemoteFixture: write {rel} failed: {e}"));
    }

    /// Stage everything and commit, returning the new commit's full hex id.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn commit_all(&self, message: &str) -> String {
        self.git(&["add", "."]);
        self.git(&["commit", "--allow-empty", "-m", message]);
        self.git(&["rev-parse", "HEAD"]).trim().to_string()
    }

    /// Create a tag at the current head.
    pub fn tag(&self, name: &str) {
        self.git(&["tag", name]);
    }

    /// Delete a tag.
    pub fn delete_tag(&self, name: &str) {
        self.git(&["tag", "-d", name]);
    }

    /// Create a branch at the current head without switching to it.
    pub fn branch(&self, name: &str) {
        self.git(&["branch", name]);
    }

    fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.dir.path())
            .output()
            .unwrap_or_else(|e| panic!("RemoteFixture: failed to run `git {args:?}`: {e}"));
        if !output.status.success() {
            panic!(
                "RemoteFixture: `git {args:?}` failed:\n{}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}
