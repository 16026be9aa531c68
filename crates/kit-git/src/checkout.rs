//! Checkout materialization
//!
//! Each installed repository version is materialized under
//! `{library root}/{namespace}/`. Immutable references (tags, commits) are
//! write-once: their checkout keeps no git metadata, so no later pull can
//! ever move them. Branch checkouts keep their metadata and are refreshed by
//! staging a fresh materialization into a temporary sibling directory and
//! swapping directories, so a failed or interrupted refresh leaves the
//! previous good checkout in place.

use std::fs;
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{FetchOptions, Oid, Repository};

use crate::refs::{RefKind, ResolvedRef};
use crate::{Error, Result};

/// Materializes and refreshes namespaced checkouts under a library root.
pub struct CheckoutManager {
    library_root: PathBuf,
}

impl CheckoutManager {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
        }
    }

    /// The directory a namespace's checkout lives in.
    pub fn checkout_dir(&self, namespace: &str) -> PathBuf {
        self.library_root.join(namespace)
    }

    /// Materialize `reference` from `location` into the namespace directory.
    ///
    /// Fails with [`Error::CheckoutExists`] if the namespace directory is
    /// already populated. Staging happens in a temporary sibling that is
    /// removed on any failure; the namespace directory appears only once the
    /// checkout is complete.
    pub fn materialize(
        &self,
        location: &str,
        reference: &ResolvedRef,
        namespace: &str,
    ) -> Result<PathBuf> {
        let dest = self.checkout_dir(namespace);
        if dest.exists() {
            return Err(Error::CheckoutExists {
                namespace: namespace.to_string(),
                path: dest,
            });
        }
        fs::create_dir_all(&self.library_root).map_err(|e| Error::io(&self.library_root, e))?;

        let staging = tempfile::Builder::new()
            .prefix(&format!(".{namespace}-staging-"))
            .tempdir_in(&self.library_root)
            .map_err(|e| Error::io(&self.library_root, e))?;
        let work = staging.path().join("checkout");

        self.fetch_into(location, reference, &work)?;
        if reference.kind.is_immutable() {
            strip_git_metadata(&work)?;
        }

        fs::rename(&work, &dest).map_err(|e| Error::io(&dest, e))?;
        tracing::info!(
            namespace,
            location,
            reference = %reference.name,
            kind = %reference.kind,
            "materialized checkout"
        );
        Ok(dest)
    }

    /// Remove a namespace's checkout entirely.
    pub fn remove(&self, namespace: &str) -> Result<()> {
        let dest = self.checkout_dir(namespace);
        if dest.exists() {
            fs::remove_dir_all(&dest).map_err(|e| Error::io(&dest, e))?;
        }
        Ok(())
    }

    /// Re-materialize a branch checkout from upstream.
    ///
    /// The fresh content is staged next to the existing checkout and swapped
    /// in atomically: the old directory is retired into the staging area,
    /// the new one renamed into place, and the retired copy deleted last. If
    /// the swap fails midway the previous checkout is restored before the
    /// error propagates.
    pub fn refresh(&self, location: &str, branch: &str, namespace: &str) -> Result<PathBuf> {
        let dest = self.checkout_dir(namespace);
        if !dest.exists() {
            return Err(Error::CheckoutMissing {
                namespace: namespace.to_string(),
                path: dest,
            });
        }

        let reference = ResolvedRef {
            name: branch.to_string(),
            kind: RefKind::Branch,
        };
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{namespace}-refresh-"))
            .tempdir_in(&self.library_root)
            .map_err(|e| Error::io(&self.library_root, e))?;
        let work = staging.path().join("checkout");

        // Fetch before touching the existing checkout: a network failure
        // here leaves it untouched.
        self.fetch_into(location, &reference, &work)?;

        let retired = staging.path().join("previous");
        fs::rename(&dest, &retired).map_err(|e| Error::io(&dest, e))?;
        if let Err(e) = fs::rename(&work, &dest) {
            // Put the previous checkout back before surfacing the error.
            let _ = fs::rename(&retired, &dest);
            return Err(Error::io(&dest, e));
        }

        tracing::info!(namespace, branch, "refreshed branch checkout");
        Ok(dest)
    }

    /// Clone/fetch `reference` into `dest` and check out its tree.
    fn fetch_into(&self, location: &str, reference: &ResolvedRef, dest: &Path) -> Result<()> {
        match reference.kind {
            RefKind::Branch => {
                git2::build::RepoBuilder::new()
                    .branch(&reference.name)
                    .clone(location, dest)
                    .map_err(|e| classify_fetch_error(location, &reference.name, e))?;
            }
            RefKind::Tag => {
                let repo = Repository::init(dest).map_err(Error::Git)?;
                let mut remote = repo.remote_anonymous(location).map_err(Error::Git)?;
                let refspec = format!("+refs/tags/{0}:refs/tags/{0}", reference.name);
                remote
                    .fetch(&[refspec.as_str()], Some(&mut FetchOptions::new()), None)
                    .map_err(|e| classify_fetch_error(location, &reference.name, e))?;
                let object = repo
                    .revparse_single(&format!("refs/tags/{}", reference.name))
                    .map_err(|_| Error::ReferenceGone {
                        location: location.to_string(),
                        name: reference.name.clone(),
                    })?;
                let commit = object.peel(git2::ObjectType::Commit).map_err(Error::Git)?;
                repo.checkout_tree(&commit, Some(CheckoutBuilder::new().force()))
                    .map_err(Error::Git)?;
                repo.set_head_detached(commit.id()).map_err(Error::Git)?;
            }
            RefKind::Commit => {
                let repo = Repository::init(dest).map_err(Error::Git)?;
                let mut remote = repo.remote_anonymous(location).map_err(Error::Git)?;
                // Fetch all heads; the commit must be reachable from one.
                remote
                    .fetch(
                        &["+refs/heads/*:refs/remotes/origin/*"],
                        Some(&mut FetchOptions::new()),
                        None,
                    )
                    .map_err(|e| classify_fetch_error(location, &reference.name, e))?;
                let oid = Oid::from_str(&reference.name).map_err(Error::Git)?;
                let commit = repo.find_commit(oid).map_err(|_| Error::ReferenceGone {
                    location: location.to_string(),
                    name: reference.name.clone(),
                })?;
                repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))
                    .map_err(Error::Git)?;
                repo.set_head_detached(oid).map_err(Error::Git)?;
            }
        }
        Ok(())
    }
}

/// A fetch failure is a network error for transport problems, otherwise the
/// reference disappeared upstream.
fn classify_fetch_error(location: &str, name: &str, err: git2::Error) -> Error {
    match Error::from_git(location, err) {
        network @ Error::Network { .. } => network,
        Error::Git(err) if err.code() == git2::ErrorCode::NotFound => Error::ReferenceGone {
            location: location.to_string(),
            name: name.to_string(),
        },
        other => other,
    }
}

/// Delete the `.git` directory of an immutable checkout.
fn strip_git_metadata(work: &Path) -> Result<()> {
    let git_dir = work.join(".git");
    if git_dir.exists() {
        fs::remove_dir_all(&git_dir).map_err(|e| Error::io(&git_dir, e))?;
    }
    Ok(())
}
