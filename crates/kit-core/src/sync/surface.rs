//! One tool's configuration surface
//!
//! A surface is a JSON document with a managed object under the tool's
//! `servers_key` plus arbitrary sibling keys that are never interpreted.
//! State is read fresh before every sync and committed only when the
//! managed section changed.

use std::path::{Path, PathBuf};

use kit_fs::Fingerprint;
use kit_meta::TargetSpec;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// A concrete surface: a registry spec resolved against a project root.
#[derive(Debug, Clone)]
pub struct SurfaceTarget {
    pub slug: String,
    pub path: PathBuf,
    pub servers_key: String,
}

impl SurfaceTarget {
    pub fn from_spec(spec: &TargetSpec, project_root: &Path) -> Self {
        Self {
            slug: spec.slug.to_string(),
            path: project_root.join(spec.config_path),
            servers_key: spec.servers_key.to_string(),
        }
    }
}

/// Parsed surface state plus the managed section as it was read, for
/// change detection.
#[derive(Debug)]
pub struct SurfaceState {
    target: SurfaceTarget,
    doc: Map<String, Value>,
    original_managed: Map<String, Value>,
}

impl SurfaceState {
    /// Read the surface fresh from disk.
    ///
    /// A missing file yields an empty opaque blob and an empty managed
    /// section; an unparsable one is a [`Error::MalformedStore`].
    pub fn read(target: SurfaceTarget) -> Result<Self> {
        let doc = if target.path.exists() {
            let content = kit_fs::read_to_string_locked(&target.path)?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                let value: Value =
                    serde_json::from_str(&content).map_err(|e| Error::MalformedStore {
                        path: target.path.clone(),
                        message: e.to_string(),
                    })?;
                match value {
                    Value::Object(map) => map,
                    _ => {
                        return Err(Error::MalformedStore {
                            path: target.path.clone(),
                            message: "top level is not a JSON object".to_string(),
                        });
                    }
                }
            }
        } else {
            Map::new()
        };

        let original_managed = match doc.get(&target.servers_key) {
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(Error::MalformedStore {
                    path: target.path.clone(),
                    message: format!("'{}' is not a JSON object", target.servers_key),
                });
            }
            None => Map::new(),
        };

        Ok(Self {
            target,
            doc,
            original_managed,
        })
    }

    pub fn target(&self) -> &SurfaceTarget {
        &self.target
    }

    fn managed_mut(&mut self) -> &mut Map<String, Value> {
        let key = self.target.servers_key.clone();
        let entry = self
            .doc
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        // read() rejects a non-object managed section before we get here.
        entry.as_object_mut().expect("managed section is an object")
    }

    fn managed(&self) -> Option<&Map<String, Value>> {
        self.doc
            .get(&self.target.servers_key)
            .and_then(Value::as_object)
    }

    /// Insert or replace one managed entry.
    pub fn upsert(&mut self, qualified_name: &str, entry: Value) {
        self.managed_mut().insert(qualified_name.to_string(), entry);
    }

    /// Remove one managed entry. Returns whether it existed.
    pub fn remove(&mut self, qualified_name: &str) -> bool {
        self.managed_mut().remove(qualified_name).is_some()
    }

    pub fn managed_entry(&self, qualified_name: &str) -> Option<&Value> {
        self.managed().and_then(|m| m.get(qualified_name))
    }

    /// Whether a managed key differs from what was read.
    pub fn is_dirty(&self) -> bool {
        let current = self.managed().cloned().unwrap_or_default();
        current != self.original_managed
    }

    /// Write the merged state if and only if a managed key changed.
    ///
    /// The previous file is backed up first unless suppressed, the new
    /// content is staged and renamed atomically, and the written bytes are
    /// verified against what was staged. Returns whether a write happened.
    pub fn commit(&self, backup: bool) -> Result<bool> {
        if !self.is_dirty() {
            tracing::debug!(surface = %self.target.slug, "surface unchanged, skipping write");
            return Ok(false);
        }
        if backup {
            kit_fs::backup_file(&self.target.path)?;
        }
        let mut content = serde_json::to_string_pretty(&Value::Object(self.doc.clone()))?;
        content.push('\n');
        kit_fs::atomic_write(&self.target.path, content.as_bytes())?;

        let staged = Fingerprint::of_bytes(content.as_bytes());
        if Fingerprint::of_file(&self.target.path)? != staged {
            return Err(Error::SurfaceVerification {
                path: self.target.path.clone(),
            });
        }
        tracing::info!(surface = %self.target.slug, path = %self.target.path.display(), "surface written");
        Ok(true)
    }
}
