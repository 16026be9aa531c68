//! Installation record store
//!
//! One TOML document per scope holds every installation record for that
//! scope. The document is read wholesale and rewritten wholesale through
//! the atomic-replace discipline, so a concurrent reader never observes a
//! half-written store. The store owns only metadata; the filesystem owns
//! artifact content.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use kit_fs::Fingerprint;
use kit_git::RefKind;
use serde::{Deserialize, Serialize};

use crate::config::{RuntimeContext, Scope};
use crate::{Error, Result};

/// Provenance of one installed artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub namespace: String,
    pub name: String,
    /// Repository location the artifact came from.
    pub source: String,
    pub ref_name: String,
    /// Classified once at install; never re-inferred implicitly.
    pub ref_kind: RefKind,
    pub scope: Scope,
    pub installed_path: PathBuf,
    /// Content fingerprint at install or last successful sync.
    pub fingerprint: Fingerprint,
    pub installed_at: DateTime<Utc>,
}

impl InstallRecord {
    /// The structurally collision-free identifier of this artifact.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// One installed repository version within a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub namespace: String,
    pub source: String,
    pub ref_name: String,
    pub ref_kind: RefKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    version: String,
    #[serde(default)]
    records: Vec<InstallRecord>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            records: Vec::new(),
        }
    }
}

/// CRUD over installation records, keyed by (scope, namespace, name).
pub struct InstallStore {
    path: PathBuf,
    scope: Scope,
}

impl InstallStore {
    /// Open the record store for `scope` within `ctx`.
    pub fn open(ctx: &RuntimeContext, scope: Scope) -> Self {
        Self {
            path: ctx.records_path(scope),
            scope,
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    fn load_file(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }
        let content = kit_fs::read_to_string_locked(&self.path)?;
        toml::from_str(&content).map_err(|e| Error::MalformedStore {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn save_file(&self, file: &StoreFile) -> Result<()> {
        let content = toml::to_string_pretty(file)?;
        kit_fs::atomic_write(&self.path, content.as_bytes())?;
        Ok(())
    }

    /// Insert or replace the record for (namespace, name).
    ///
    /// Enforces the namespace invariant: every record of a namespace shares
    /// one source and reference, so a namespace that exists with a different
    /// source is a conflict the caller must resolve explicitly.
    pub fn record(&self, record: InstallRecord) -> Result<()> {
        let mut file = self.load_file()?;
        let clash = file.records.iter().any(|r| {
            r.namespace == record.namespace
                && (r.source != record.source || r.ref_name != record.ref_name)
        });
        if clash {
            return Err(Error::NamespaceConflict {
                namespace: record.namespace,
                scope: self.scope,
            });
        }
        file.records
            .retain(|r| !(r.namespace == record.namespace && r.name == record.name));
        tracing::debug!(
            namespace = %record.namespace,
            name = %record.name,
            fingerprint = %record.fingerprint,
            "recording installation"
        );
        file.records.push(record);
        self.save_file(&file)
    }

    pub fn get(&self, namespace: &str, name: &str) -> Result<Option<InstallRecord>> {
        let file = self.load_file()?;
        Ok(file
            .records
            .into_iter()
            .find(|r| r.namespace == namespace && r.name == name))
    }

    /// All records, optionally filtered to one namespace.
    pub fn list(&self, namespace: Option<&str>) -> Result<Vec<InstallRecord>> {
        let file = self.load_file()?;
        Ok(file
            .records
            .into_iter()
            .filter(|r| namespace.is_none_or(|ns| r.namespace == ns))
            .collect())
    }

    /// Distinct installed namespaces with their shared provenance.
    pub fn namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        let file = self.load_file()?;
        let mut infos: Vec<NamespaceInfo> = Vec::new();
        for record in &file.records {
            if !infos.iter().any(|i| i.namespace == record.namespace) {
                infos.push(NamespaceInfo {
                    namespace: record.namespace.clone(),
                    source: record.source.clone(),
                    ref_name: record.ref_name.clone(),
                    ref_kind: record.ref_kind,
                });
            }
        }
        Ok(infos)
    }

    pub fn contains_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self
            .load_file()?
            .records
            .iter()
            .any(|r| r.namespace == namespace))
    }

    /// Advance a record's fingerprint after a successful update or conflict
    /// resolution. Only branch-tracked records ever reach this.
    pub fn update_fingerprint(
        &self,
        namespace: &str,
        name: &str,
        fingerprint: Fingerprint,
    ) -> Result<()> {
        let mut file = self.load_file()?;
        let record = file
            .records
            .iter_mut()
            .find(|r| r.namespace == namespace && r.name == name)
            .ok_or_else(|| Error::RecordNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        record.fingerprint = fingerprint;
        record.installed_at = Utc::now();
        self.save_file(&file)
    }

    /// Delete one record. Returns whether it existed.
    pub fn remove(&self, namespace: &str, name: &str) -> Result<bool> {
        let mut file = self.load_file()?;
        let before = file.records.len();
        file.records
            .retain(|r| !(r.namespace == namespace && r.name == name));
        let removed = file.records.len() != before;
        if removed {
            self.save_file(&file)?;
        }
        Ok(removed)
    }

    /// Delete every record of a namespace. Returns how many were removed.
    pub fn remove_namespace(&self, namespace: &str) -> Result<usize> {
        let mut file = self.load_file()?;
        let before = file.records.len();
        file.records.retain(|r| r.namespace != namespace);
        let removed = before - file.records.len();
        if removed > 0 {
            self.save_file(&file)?;
        }
        Ok(removed)
    }
}
