//! Update flow
//!
//! Routine update touches only branch-tracked namespaces: tag and commit
//! installations are excluded from the update set and reported as pinned.
//! For each branch namespace the checkout is refreshed (atomic directory
//! swap), then every installed artifact is reconciled through the three-way
//! classification. Refreshes of independent namespaces run through the
//! bounded worker pool; everything within a namespace is sequential.

use std::fs;
use std::path::Path;

use kit_fs::Fingerprint;
use kit_git::CheckoutManager;
use kit_meta::{MANIFEST_FILE, Manifest};

use crate::config::{RuntimeContext, Scope};
use crate::conflict::{Conflict, Decision, ResolutionPolicy, UpdateClass, classify};
use crate::parallel::{DEFAULT_WORKERS, run_bounded};
use crate::tracker::{InstallRecord, InstallStore, NamespaceInfo};
use crate::{Error, Result};

/// What happened to one artifact during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactUpdate {
    /// Nothing changed anywhere.
    Unchanged { artifact: String },
    /// Upstream-only change applied and the record advanced.
    Applied { artifact: String },
    /// Local-only change left in place; the update was skipped.
    KeptLocal { artifact: String },
    /// A genuine conflict, resolved by the active policy.
    Resolved { artifact: String, decision: Decision },
    /// New upstream artifact installed during the update.
    Added { artifact: String },
    /// Upstream no longer defines this artifact; local copy untouched.
    RemovedUpstream { artifact: String },
}

/// One namespace's update outcome.
#[derive(Debug, Clone, Default)]
pub struct NamespaceUpdate {
    pub namespace: String,
    /// Pinned to an immutable reference; excluded from the update set.
    pub pinned: bool,
    pub artifacts: Vec<ArtifactUpdate>,
    pub errors: Vec<String>,
}

/// Aggregate report; the overall exit status reflects the worst outcome.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub namespaces: Vec<NamespaceUpdate>,
}

impl UpdateReport {
    pub fn success(&self) -> bool {
        self.namespaces.iter().all(|n| n.errors.is_empty())
    }
}

/// Drives the update flow for one scope.
pub struct Updater<'a> {
    ctx: &'a RuntimeContext,
    checkouts: CheckoutManager,
}

impl<'a> Updater<'a> {
    pub fn new(ctx: &'a RuntimeContext) -> Self {
        Self {
            ctx,
            checkouts: CheckoutManager::new(&ctx.library_root),
        }
    }

    /// Update every namespace in `scope`, or just `namespace` if given.
    ///
    /// Refreshes run in parallel (bounded); reconciliation and record
    /// writes are sequential so the record store never sees concurrent
    /// writers. A failure in one namespace never aborts its siblings.
    pub fn update(
        &self,
        scope: Scope,
        namespace: Option<&str>,
        policy: &dyn ResolutionPolicy,
    ) -> Result<UpdateReport> {
        let store = InstallStore::open(self.ctx, scope);
        let infos: Vec<NamespaceInfo> = store
            .namespaces()?
            .into_iter()
            .filter(|i| namespace.is_none_or(|ns| i.namespace == ns))
            .collect();
        if let Some(ns) = namespace
            && infos.is_empty()
        {
            return Err(Error::NamespaceNotInstalled {
                namespace: ns.to_string(),
            });
        }

        let mut report = UpdateReport::default();
        let mut to_reconcile = Vec::new();
        for info in infos {
            if info.ref_kind.is_immutable() {
                tracing::debug!(namespace = %info.namespace, "pinned namespace excluded from update");
                report.namespaces.push(NamespaceUpdate {
                    namespace: info.namespace,
                    pinned: true,
                    ..Default::default()
                });
            } else {
                to_reconcile.push(info);
            }
        }

        // Phase 1: network-bound refreshes, embarrassingly parallel.
        let refreshed = run_bounded(&to_reconcile, DEFAULT_WORKERS, |info| {
            self.checkouts
                .refresh(&info.source, &info.ref_name, &info.namespace)
                .map(|_| ())
        });

        // Phase 2: sequential reconciliation.
        for (info, refresh) in to_reconcile.iter().zip(refreshed) {
            let mut ns_report = NamespaceUpdate {
                namespace: info.namespace.clone(),
                ..Default::default()
            };
            match refresh {
                Ok(()) => self.reconcile_namespace(&store, info, policy, &mut ns_report),
                Err(e) => ns_report.errors.push(e.to_string()),
            }
            report.namespaces.push(ns_report);
        }
        Ok(report)
    }

    fn reconcile_namespace(
        &self,
        store: &InstallStore,
        info: &NamespaceInfo,
        policy: &dyn ResolutionPolicy,
        report: &mut NamespaceUpdate,
    ) {
        let checkout = self.checkouts.checkout_dir(&info.namespace);
        let manifest = match Manifest::load(&checkout.join(MANIFEST_FILE)) {
            Ok(m) => m,
            Err(e) => {
                report.errors.push(format!("manifest: {e}"));
                return;
            }
        };
        let records = match store.list(Some(&info.namespace)) {
            Ok(r) => r,
            Err(e) => {
                report.errors.push(e.to_string());
                return;
            }
        };

        for record in &records {
            let qualified = record.qualified_name();
            let Some(def) = manifest.artifact(&record.name) else {
                report
                    .artifacts
                    .push(ArtifactUpdate::RemovedUpstream { artifact: qualified });
                continue;
            };
            match self.reconcile_artifact(store, record, &checkout.join(&def.path), policy) {
                Ok(update) => report.artifacts.push(update),
                Err(e) => report.errors.push(format!("{qualified}: {e}")),
            }
        }

        // Artifacts added upstream since install are brought in as part of
        // applying the branch's current state.
        for def in &manifest.artifacts {
            if records.iter().any(|r| r.name == def.name) {
                continue;
            }
            match self.install_new_artifact(store, info, def, &checkout) {
                Ok(artifact) => report.artifacts.push(ArtifactUpdate::Added { artifact }),
                Err(e) => report
                    .errors
                    .push(format!("{}.{}: {e}", info.namespace, def.name)),
            }
        }
    }

    fn reconcile_artifact(
        &self,
        store: &InstallStore,
        record: &InstallRecord,
        incoming_path: &Path,
        policy: &dyn ResolutionPolicy,
    ) -> Result<ArtifactUpdate> {
        let qualified = record.qualified_name();
        let incoming_bytes =
            fs::read(incoming_path).map_err(|e| kit_fs::Error::io(incoming_path, e))?;
        let incoming = Fingerprint::of_bytes(&incoming_bytes);

        // A locally deleted file counts as a local edit: leave it deleted.
        if !record.installed_path.exists() {
            return Ok(ArtifactUpdate::KeptLocal { artifact: qualified });
        }
        let current = Fingerprint::of_file(&record.installed_path)?;

        match classify(&current, &record.fingerprint, &incoming) {
            UpdateClass::Unchanged => Ok(ArtifactUpdate::Unchanged { artifact: qualified }),
            UpdateClass::SafeUpdate => {
                kit_fs::atomic_write(&record.installed_path, &incoming_bytes)?;
                store.update_fingerprint(&record.namespace, &record.name, incoming)?;
                tracing::info!(artifact = %qualified, "applied upstream change");
                Ok(ArtifactUpdate::Applied { artifact: qualified })
            }
            UpdateClass::LocalOnly => {
                tracing::debug!(artifact = %qualified, "local edit kept, upstream unchanged");
                Ok(ArtifactUpdate::KeptLocal { artifact: qualified })
            }
            UpdateClass::Conflict => {
                let conflict = Conflict {
                    namespace: record.namespace.clone(),
                    name: record.name.clone(),
                    path: record.installed_path.clone(),
                    current,
                    original: record.fingerprint.clone(),
                    incoming: incoming.clone(),
                };
                let decision = policy.resolve(&conflict);
                self.apply_decision(store, record, decision, &incoming_bytes, incoming)?;
                Ok(ArtifactUpdate::Resolved {
                    artifact: qualified,
                    decision,
                })
            }
        }
    }

    /// Apply a conflict decision.
    ///
    /// - keep local: no write, record untouched
    /// - overwrite: adopt incoming and advance the record fingerprint
    /// - both: incoming goes under a `-upstream` disambiguated name with a
    ///   second record; the local file and its record stay untouched
    fn apply_decision(
        &self,
        store: &InstallStore,
        record: &InstallRecord,
        decision: Decision,
        incoming_bytes: &[u8],
        incoming: Fingerprint,
    ) -> Result<()> {
        match decision {
            Decision::KeepLocal => Ok(()),
            Decision::Overwrite => {
                kit_fs::atomic_write(&record.installed_path, incoming_bytes)?;
                store.update_fingerprint(&record.namespace, &record.name, incoming)
            }
            Decision::InstallBoth => {
                let renamed_path = disambiguate(&record.installed_path);
                kit_fs::atomic_write(&renamed_path, incoming_bytes)?;
                store.record(InstallRecord {
                    name: format!("{}-upstream", record.name),
                    installed_path: renamed_path,
                    fingerprint: incoming,
                    installed_at: chrono::Utc::now(),
                    ..record.clone()
                })
            }
        }
    }

    fn install_new_artifact(
        &self,
        store: &InstallStore,
        info: &NamespaceInfo,
        def: &kit_meta::ArtifactDef,
        checkout: &Path,
    ) -> Result<String> {
        let source_path = checkout.join(&def.path);
        let bytes = fs::read(&source_path).map_err(|e| kit_fs::Error::io(&source_path, e))?;
        let dest = self
            .ctx
            .install_root(store.scope())
            .join(&info.namespace)
            .join(&def.path);
        kit_fs::atomic_write(&dest, &bytes)?;
        let record = InstallRecord {
            namespace: info.namespace.clone(),
            name: def.name.clone(),
            source: info.source.clone(),
            ref_name: info.ref_name.clone(),
            ref_kind: info.ref_kind,
            scope: store.scope(),
            installed_path: dest,
            fingerprint: Fingerprint::of_bytes(&bytes),
            installed_at: chrono::Utc::now(),
        };
        let qualified = record.qualified_name();
        store.record(record)?;
        Ok(qualified)
    }
}

/// `docs/style.md` → `docs/style-upstream.md`
fn disambiguate(path: &Path) -> std::path::PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-upstream.{}", ext.to_string_lossy()),
        None => format!("{stem}-upstream"),
    };
    path.with_file_name(name)
}
