//! Three-way reconciliation
//!
//! During an update every artifact is classified from three fingerprints:
//! `current` (on-disk content right now), `original` (recorded at the last
//! successful install/sync), and `incoming` (freshly fetched upstream
//! content). Resolution of a genuine conflict goes through an injectable
//! policy so the detector itself never blocks on user I/O.

use std::path::PathBuf;

use kit_fs::Fingerprint;

/// Outcome of the three-way comparison for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateClass {
    /// Nothing changed anywhere.
    Unchanged,
    /// Only upstream changed; apply without prompting.
    SafeUpdate,
    /// Only the user changed it; leave it alone.
    LocalOnly,
    /// Both sides changed; resolution required.
    Conflict,
}

/// Classify one artifact's update.
pub fn classify(
    current: &Fingerprint,
    original: &Fingerprint,
    incoming: &Fingerprint,
) -> UpdateClass {
    match (current == original, incoming == original) {
        (true, true) => UpdateClass::Unchanged,
        (true, false) => UpdateClass::SafeUpdate,
        (false, true) => UpdateClass::LocalOnly,
        (false, false) => UpdateClass::Conflict,
    }
}

/// A doubly-modified artifact awaiting a decision.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub namespace: String,
    pub name: String,
    /// The installed file both sides modified.
    pub path: PathBuf,
    pub current: Fingerprint,
    pub original: Fingerprint,
    pub incoming: Fingerprint,
}

impl Conflict {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// How to resolve a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Discard incoming; no write, record untouched.
    KeepLocal,
    /// Discard local; adopt incoming and advance the record fingerprint.
    Overwrite,
    /// Write incoming under a disambiguated name with its own record; the
    /// local file and its record stay untouched.
    InstallBoth,
}

/// Injectable resolution strategy.
///
/// The interactive implementation lives in the CLI; fixed policies cover
/// unattended operation.
pub trait ResolutionPolicy {
    fn resolve(&self, conflict: &Conflict) -> Decision;
}

/// Always answer with one fixed decision.
pub struct FixedPolicy(pub Decision);

impl ResolutionPolicy for FixedPolicy {
    fn resolve(&self, conflict: &Conflict) -> Decision {
        tracing::debug!(
            artifact = %conflict.qualified_name(),
            decision = ?self.0,
            "fixed-policy conflict resolution"
        );
        self.0
    }
}
