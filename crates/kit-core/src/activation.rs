//! Set activation state machine
//!
//! Two states exist per project: no active set, or exactly one named set
//! active. Activation resolves the set's member list (dependency closure
//! included), drives the sync engine restricted to exactly that list, and
//! persists the new record as a single write only after the sync call
//! returns. Two sets are never simultaneously active in tracked state,
//! even when the sync itself is partial. Deactivation clears the record
//! without undoing already-synced configuration; removal is a deliberate,
//! separate operation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use kit_meta::{MANIFEST_FILE, Manifest};
use serde::{Deserialize, Serialize};

use crate::config::{RuntimeContext, Scope};
use crate::credentials::CredentialResolver;
use crate::sync::{SurfaceTarget, SyncEngine, SyncItem, SyncOptions, SyncReport};
use crate::tracker::InstallStore;
use crate::{Error, Result};

/// The persisted record of the one active set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSetRecord {
    pub namespace: String,
    pub set: String,
    pub activated_at: DateTime<Utc>,
    /// Namespace-qualified names actually activated. Under partial
    /// activation this is the resolvable subset, not the nominal full set.
    pub artifacts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ActiveSetFile {
    #[serde(default)]
    active: Option<ActiveSetRecord>,
}

/// Outcome of a taken activation transition.
#[derive(Debug, Clone)]
pub struct ActivationReport {
    /// The record written after the sync returned.
    pub record: ActiveSetRecord,
    pub sync: SyncReport,
}

/// Drives activate/deactivate transitions for one project.
pub struct ActivationManager<'a> {
    ctx: &'a RuntimeContext,
}

impl<'a> ActivationManager<'a> {
    pub fn new(ctx: &'a RuntimeContext) -> Self {
        Self { ctx }
    }

    /// The currently active set, if any.
    pub fn current(&self) -> Result<Option<ActiveSetRecord>> {
        let path = self.ctx.active_set_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = kit_fs::read_to_string_locked(&path)?;
        let file: ActiveSetFile = toml::from_str(&content).map_err(|e| Error::MalformedStore {
            path,
            message: e.to_string(),
        })?;
        Ok(file.active)
    }

    /// Activate `set` from `namespace`, replacing any previously active set.
    ///
    /// With `allow_partial` false, any member with unresolvable required
    /// credentials fails the transition before a single filesystem write.
    /// With it true, the resolvable subset syncs and the record reflects
    /// exactly that subset.
    pub fn activate(
        &self,
        namespace: &str,
        set: &str,
        targets: &[SurfaceTarget],
        resolver: &CredentialResolver,
        options: SyncOptions,
        allow_partial: bool,
    ) -> Result<ActivationReport> {
        let records = self.namespace_records(namespace)?;
        let manifest = Manifest::load(&self.ctx.library_root.join(namespace).join(MANIFEST_FILE))?;
        let members = manifest.sets.get(set).ok_or_else(|| Error::SetNotFound {
            namespace: namespace.to_string(),
            set: set.to_string(),
        })?;
        let resolved_members = manifest.closure(members)?;

        let mut items = Vec::new();
        for name in &resolved_members {
            let def = manifest
                .artifact(name)
                .ok_or_else(|| kit_meta::Error::UnknownArtifact { name: name.clone() })?
                .clone();
            let record = records
                .iter()
                .find(|r| &r.name == name)
                .ok_or_else(|| Error::RecordNotFound {
                    namespace: namespace.to_string(),
                    name: name.clone(),
                })?
                .clone();
            items.push(SyncItem { record, def });
        }

        if !allow_partial {
            let mut missing = BTreeSet::new();
            for item in &items {
                if let Err(Error::MissingCredentials { missing: gaps, .. }) =
                    resolver.resolve(namespace, &item.def)
                {
                    missing.extend(gaps);
                }
            }
            if !missing.is_empty() {
                return Err(Error::MissingCredentials {
                    artifact: format!("{namespace}:{set}"),
                    missing: missing.into_iter().collect(),
                });
            }
        }

        let engine = SyncEngine::new(resolver, options);
        let report = engine.sync(targets, &items)?;

        // The record is written after the sync returns, as one transition:
        // the previous active set is replaced, never joined.
        let active: Vec<String> = resolved_members
            .iter()
            .map(|name| format!("{namespace}.{name}"))
            .filter(|qualified| !report.skipped.iter().any(|s| &s.artifact == qualified))
            .collect();
        let record = ActiveSetRecord {
            namespace: namespace.to_string(),
            set: set.to_string(),
            activated_at: Utc::now(),
            artifacts: active,
        };
        self.persist(Some(record.clone()))?;
        tracing::info!(namespace, set, artifacts = record.artifacts.len(), "set activated");

        Ok(ActivationReport {
            record,
            sync: report,
        })
    }

    /// Return to the no-active-set state. Already-synced configuration is
    /// left in place. Returns the previously active record, if any.
    pub fn deactivate(&self) -> Result<Option<ActiveSetRecord>> {
        let previous = self.current()?;
        if previous.is_some() {
            self.persist(None)?;
            tracing::info!("set deactivated");
        }
        Ok(previous)
    }

    fn persist(&self, active: Option<ActiveSetRecord>) -> Result<()> {
        let content = toml::to_string_pretty(&ActiveSetFile { active })?;
        kit_fs::atomic_write(&self.ctx.active_set_path(), content.as_bytes())?;
        Ok(())
    }

    /// Find the namespace's records, preferring project scope.
    fn namespace_records(&self, namespace: &str) -> Result<Vec<crate::tracker::InstallRecord>> {
        for scope in [Scope::Project, Scope::Global] {
            let records = InstallStore::open(self.ctx, scope).list(Some(namespace))?;
            if !records.is_empty() {
                return Ok(records);
            }
        }
        Err(Error::NamespaceNotInstalled {
            namespace: namespace.to_string(),
        })
    }
}
