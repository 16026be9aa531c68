//! Install flow
//!
//! Installing a repository classifies its reference, materializes the
//! checkout into the library, copies artifact content into the per-scope
//! install root, and records provenance, in that order, so an interrupted
//! install never leaves records pointing at content that was not written.
//!
//! Moving a pinned (tag/commit) namespace to a newer immutable reference is
//! exactly this operation with [`NamespacePolicy::Overwrite`]: re-install
//! under the new reference. It is never an implicit side effect of update.

use std::fs;
use std::path::Path;

use kit_fs::Fingerprint;
use kit_git::{CheckoutManager, RefClassifier};
use kit_meta::{MANIFEST_FILE, Manifest};

use crate::config::{RuntimeContext, Scope};
use crate::tracker::{InstallRecord, InstallStore};
use crate::{Error, Result};

/// How to resolve an install-time namespace collision. Never silent: the
/// default is to reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamespacePolicy {
    /// Fail with [`Error::NamespaceConflict`].
    #[default]
    Reject,
    /// Leave the existing installation alone and report the skip.
    Skip,
    /// Uninstall the existing namespace first, then install fresh.
    Overwrite,
    /// Install under the first free `name-2`, `name-3`, … namespace.
    Rename,
}

/// Result of one install invocation.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub namespace: String,
    /// Qualified names that were installed and recorded.
    pub installed: Vec<String>,
    /// Per-artifact failures; siblings were still installed.
    pub errors: Vec<String>,
    /// True when [`NamespacePolicy::Skip`] left an existing install alone.
    pub skipped: bool,
}

/// Derive the default namespace from a repository location.
///
/// Takes the last path segment (handling `:` in scp-style locations),
/// strips a `.git` suffix, and maps anything outside `[a-z0-9_-]` to `-`.
pub fn derive_namespace(location: &str) -> String {
    let trimmed = location.trim_end_matches('/');
    let tail = trimmed
        .rsplit(['/', '\\', ':'])
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches(".git");
    let mut namespace: String = tail
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' => c,
            _ => '-',
        })
        .collect();
    if namespace.is_empty() {
        namespace.push_str("repo");
    }
    namespace
}

/// Installs and uninstalls namespaces.
pub struct Installer<'a> {
    ctx: &'a RuntimeContext,
    classifier: RefClassifier,
    checkouts: CheckoutManager,
}

impl<'a> Installer<'a> {
    pub fn new(ctx: &'a RuntimeContext) -> Self {
        Self {
            ctx,
            classifier: RefClassifier::new(),
            checkouts: CheckoutManager::new(&ctx.library_root),
        }
    }

    /// Install every artifact of the repository at `location`.
    ///
    /// `reference` defaults to the remote's default branch; `namespace`
    /// defaults to [`derive_namespace`]. The reference is classified once
    /// here and persisted on every record.
    pub fn install(
        &self,
        location: &str,
        reference: Option<&str>,
        namespace: Option<&str>,
        scope: Scope,
        policy: NamespacePolicy,
    ) -> Result<InstallOutcome> {
        let store = InstallStore::open(self.ctx, scope);
        let mut namespace = namespace
            .map(str::to_string)
            .unwrap_or_else(|| derive_namespace(location));

        if store.contains_namespace(&namespace)? {
            match policy {
                NamespacePolicy::Reject => {
                    return Err(Error::NamespaceConflict { namespace, scope });
                }
                NamespacePolicy::Skip => {
                    tracing::info!(namespace, "namespace already installed, skipping");
                    return Ok(InstallOutcome {
                        namespace,
                        installed: Vec::new(),
                        errors: Vec::new(),
                        skipped: true,
                    });
                }
                NamespacePolicy::Overwrite => {
                    self.uninstall(&namespace, scope)?;
                }
                NamespacePolicy::Rename => {
                    let mut counter = 2;
                    let base = namespace.clone();
                    while store.contains_namespace(&namespace)? {
                        namespace = format!("{base}-{counter}");
                        counter += 1;
                    }
                    tracing::info!(from = %base, to = %namespace, "namespace renamed on conflict");
                }
            }
        }

        let resolved = self.classifier.classify(location, reference)?;
        // A leftover checkout without records (from a crashed uninstall)
        // must not block materialization.
        if self.checkouts.checkout_dir(&namespace).exists() {
            self.checkouts.remove(&namespace)?;
        }
        let checkout = self.checkouts.materialize(location, &resolved, &namespace)?;
        let manifest = Manifest::load(&checkout.join(MANIFEST_FILE))?;

        let install_root = self.ctx.install_root(scope).join(&namespace);
        let mut installed = Vec::new();
        let mut errors = Vec::new();
        for artifact in &manifest.artifacts {
            match install_artifact(
                &store,
                &checkout,
                &install_root,
                &namespace,
                location,
                &resolved.name,
                resolved.kind,
                scope,
                artifact,
            ) {
                Ok(qualified) => installed.push(qualified),
                Err(e) => errors.push(format!("{namespace}.{}: {e}", artifact.name)),
            }
        }

        tracing::info!(
            namespace,
            count = installed.len(),
            reference = %resolved.name,
            kind = %resolved.kind,
            "installed namespace"
        );
        Ok(InstallOutcome {
            namespace,
            installed,
            errors,
            skipped: false,
        })
    }

    /// Remove a namespace: records, installed content, and checkout.
    ///
    /// Returns how many records were removed.
    pub fn uninstall(&self, namespace: &str, scope: Scope) -> Result<usize> {
        let store = InstallStore::open(self.ctx, scope);
        let removed = store.remove_namespace(namespace)?;
        if removed == 0 {
            return Err(Error::NamespaceNotInstalled {
                namespace: namespace.to_string(),
            });
        }
        let install_root = self.ctx.install_root(scope).join(namespace);
        if install_root.exists() {
            fs::remove_dir_all(&install_root)
                .map_err(|e| kit_fs::Error::io(&install_root, e))?;
        }
        self.checkouts.remove(namespace)?;
        tracing::info!(namespace, removed, "uninstalled namespace");
        Ok(removed)
    }
}

#[allow(clippy::too_many_arguments)]
fn install_artifact(
    store: &InstallStore,
    checkout: &Path,
    install_root: &Path,
    namespace: &str,
    location: &str,
    ref_name: &str,
    ref_kind: kit_git::RefKind,
    scope: Scope,
    artifact: &kit_meta::ArtifactDef,
) -> Result<String> {
    let source_path = checkout.join(&artifact.path);
    let bytes = fs::read(&source_path).map_err(|e| kit_fs::Error::io(&source_path, e))?;
    let dest = install_root.join(&artifact.path);
    kit_fs::atomic_write(&dest, &bytes)?;

    let record = InstallRecord {
        namespace: namespace.to_string(),
        name: artifact.name.clone(),
        source: location.to_string(),
        ref_name: ref_name.to_string(),
        ref_kind,
        scope,
        installed_path: dest,
        fingerprint: Fingerprint::of_bytes(&bytes),
        installed_at: chrono::Utc::now(),
    };
    let qualified = record.qualified_name();
    store.record(record)?;
    Ok(qualified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kit_git::RefKind;
    use kit_test_utils::git::RemoteFixture;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    #[case("https://github.com/org/standards.git", "standards")]
    #[case("git@github.com:org/Standards.git", "standards")]
    #[case("/local/path/to/my-repo", "my-repo")]
    #[case("https://example.com/weird%20name", "weird-20name")]
    fn namespace_derivation(#[case] location: &str, #[case] expected: &str) {
        assert_eq!(derive_namespace(location), expected);
    }

    fn context(dir: &Path) -> RuntimeContext {
        RuntimeContext::with_roots(dir.join("library"), dir.join("global"), dir.join("project"))
    }

    fn fixture_with_manifest() -> RemoteFixture {
        let fixture = RemoteFixture::init();
        fixture.write(
            "kit.toml",
            r#"
            [[artifacts]]
            name = "rust-style"
            kind = "doc"
            path = "docs/rust-style.md"

            [[artifacts]]
            name = "github"
            kind = "mcp-server"
            path = "servers/github.json"
            env = [{ name = "API_TOKEN" }]

            [sets]
            dev = ["rust-style", "github"]
            "#,
        );
        fixture.write("docs/rust-style.md", "# Rust style\n");
        fixture.write("servers/github.json", r#"{"command": "npx"}"#);
        fixture.commit_all("manifest");
        fixture
    }

    #[test]
    fn install_records_every_artifact() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let fixture = fixture_with_manifest();

        let installer = Installer::new(&ctx);
        let outcome = installer
            .install(
                fixture.location(),
                None,
                Some("backend"),
                Scope::Project,
                NamespacePolicy::default(),
            )
            .unwrap();

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.installed, vec!["backend.rust-style", "backend.github"]);

        let store = InstallStore::open(&ctx, Scope::Project);
        let record = store.get("backend", "rust-style").unwrap().unwrap();
        assert_eq!(record.ref_kind, RefKind::Branch);
        assert_eq!(record.ref_name, "main");
        assert!(record.installed_path.exists());
        assert_eq!(
            record.fingerprint,
            Fingerprint::of_file(&record.installed_path).unwrap()
        );
    }

    #[test]
    fn conflicting_namespace_rejected_by_default() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let fixture = fixture_with_manifest();
        let installer = Installer::new(&ctx);

        installer
            .install(fixture.location(), None, Some("backend"), Scope::Project, NamespacePolicy::Reject)
            .unwrap();
        let err = installer
            .install(fixture.location(), None, Some("backend"), Scope::Project, NamespacePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, Error::NamespaceConflict { .. }));
    }

    #[test]
    fn skip_policy_reports_skip() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let fixture = fixture_with_manifest();
        let installer = Installer::new(&ctx);

        installer
            .install(fixture.location(), None, Some("backend"), Scope::Project, NamespacePolicy::Reject)
            .unwrap();
        let outcome = installer
            .install(fixture.location(), None, Some("backend"), Scope::Project, NamespacePolicy::Skip)
            .unwrap();
        assert!(outcome.skipped);
        assert!(outcome.installed.is_empty());
    }

    #[test]
    fn rename_policy_finds_free_namespace() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let fixture = fixture_with_manifest();
        let installer = Installer::new(&ctx);

        installer
            .install(fixture.location(), None, Some("backend"), Scope::Project, NamespacePolicy::Reject)
            .unwrap();
        let outcome = installer
            .install(fixture.location(), None, Some("backend"), Scope::Project, NamespacePolicy::Rename)
            .unwrap();
        assert_eq!(outcome.namespace, "backend-2");

        let store = InstallStore::open(&ctx, Scope::Project);
        assert!(store.contains_namespace("backend").unwrap());
        assert!(store.contains_namespace("backend-2").unwrap());
    }

    #[test]
    fn tag_install_is_history_free_and_pinned() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let fixture = fixture_with_manifest();
        fixture.tag("v1.0.0");

        let installer = Installer::new(&ctx);
        installer
            .install(
                fixture.location(),
                Some("v1.0.0"),
                Some("backend"),
                Scope::Project,
                NamespacePolicy::Reject,
            )
            .unwrap();

        let store = InstallStore::open(&ctx, Scope::Project);
        let record = store.get("backend", "github").unwrap().unwrap();
        assert_eq!(record.ref_kind, RefKind::Tag);
        assert!(!ctx.library_root.join("backend/.git").exists());
    }

    #[test]
    fn uninstall_removes_records_content_and_checkout() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let fixture = fixture_with_manifest();
        let installer = Installer::new(&ctx);
        installer
            .install(fixture.location(), None, Some("backend"), Scope::Project, NamespacePolicy::Reject)
            .unwrap();

        let removed = installer.uninstall("backend", Scope::Project).unwrap();
        assert_eq!(removed, 2);
        assert!(!ctx.install_root(Scope::Project).join("backend").exists());
        assert!(!ctx.library_root.join("backend").exists());

        let err = installer.uninstall("backend", Scope::Project).unwrap_err();
        assert!(matches!(err, Error::NamespaceNotInstalled { .. }));
    }
}
