//! Reference classification
//!
//! Classification is a pure remote query: it never touches the local
//! filesystem and is safe to call repeatedly. The result is recorded once at
//! checkout time by the caller and never re-inferred implicitly; an
//! explicit [`RefClassifier::invalidate`] plus re-classification is the only
//! way to re-check a token against the remote.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The mutability class of a version-control reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// Immutable release pointer.
    Tag,
    /// Mutable head; the only kind that participates in routine updates.
    Branch,
    /// Immutable object id.
    Commit,
}

impl RefKind {
    /// Tags and commits are write-once; branches move.
    pub fn is_immutable(self) -> bool {
        !matches!(self, RefKind::Branch)
    }
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefKind::Tag => "tag",
            RefKind::Branch => "branch",
            RefKind::Commit => "commit",
        };
        f.write_str(s)
    }
}

/// A reference token together with its classified kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    pub name: String,
    pub kind: RefKind,
}

/// Returns true when `token` is a full 40-character hex object id.
pub fn is_commit_hash(token: &str) -> bool {
    token.len() == 40 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// One remote's advertised references, captured in a single listing.
#[derive(Debug, Clone)]
struct RemoteListing {
    refs: Vec<String>,
    default_branch: Option<String>,
}

/// Classifies reference tokens against remote repositories.
///
/// The listing for each location is fetched at most once per classifier
/// instance; construct one classifier per command invocation to get the
/// request-scoped caching the engine expects.
#[derive(Default)]
pub struct RefClassifier {
    listings: RefCell<HashMap<String, RemoteListing>>,
}

impl RefClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `token` against the repository at `location`.
    ///
    /// Resolution order: a 40-hex token is a commit, with no network round
    /// trip. Otherwise the remote's reference listing is consulted once; a
    /// tag wins over a branch of the same name. An absent token resolves to
    /// the remote's default branch, classified as a branch.
    pub fn classify(&self, location: &str, token: Option<&str>) -> Result<ResolvedRef> {
        if let Some(token) = token
            && is_commit_hash(token)
        {
            return Ok(ResolvedRef {
                name: token.to_ascii_lowercase(),
                kind: RefKind::Commit,
            });
        }

        self.with_listing(location, |listing| match token {
            Some(token) => {
                if listing.refs.iter().any(|r| r == &format!("refs/tags/{token}")) {
                    Ok(ResolvedRef {
                        name: token.to_string(),
                        kind: RefKind::Tag,
                    })
                } else if listing
                    .refs
                    .iter()
                    .any(|r| r == &format!("refs/heads/{token}"))
                {
                    Ok(ResolvedRef {
                        name: token.to_string(),
                        kind: RefKind::Branch,
                    })
                } else {
                    Err(Error::ReferenceNotFound {
                        location: location.to_string(),
                        name: token.to_string(),
                    })
                }
            }
            None => {
                let name = listing
                    .default_branch
                    .as_deref()
                    .and_then(|r| r.strip_prefix("refs/heads/"))
                    .ok_or_else(|| Error::ReferenceNotFound {
                        location: location.to_string(),
                        name: "HEAD".to_string(),
                    })?;
                Ok(ResolvedRef {
                    name: name.to_string(),
                    kind: RefKind::Branch,
                })
            }
        })
    }

    /// Drop the cached listing for `location`, forcing the next
    /// classification to re-check the remote.
    pub fn invalidate(&self, location: &str) {
        self.listings.borrow_mut().remove(location);
    }

    fn with_listing<T>(
        &self,
        location: &str,
        f: impl FnOnce(&RemoteListing) -> Result<T>,
    ) -> Result<T> {
        if let Some(listing) = self.listings.borrow().get(location) {
            return f(listing);
        }
        let listing = list_remote(location)?;
        let result = f(&listing);
        self.listings
            .borrow_mut()
            .insert(location.to_string(), listing);
        result
    }
}

/// Fetch the advertised reference list of a remote in one round trip.
fn list_remote(location: &str) -> Result<RemoteListing> {
    let mut remote =
        git2::Remote::create_detached(location).map_err(|e| Error::from_git(location, e))?;
    remote
        .connect(git2::Direction::Fetch)
        .map_err(|e| Error::from_git(location, e))?;

    let mut refs = Vec::new();
    let mut default_branch = None;
    for head in remote.list().map_err(|e| Error::from_git(location, e))? {
        if head.name() == "HEAD" {
            default_branch = head.symref_target().map(str::to_string);
        } else {
            refs.push(head.name().to_string());
        }
    }
    tracing::debug!(location, refs = refs.len(), "listed remote references");

    Ok(RemoteListing {
        refs,
        default_branch,
    })
}
