//! Target-surface synchronization
//!
//! The sync engine merges resolved artifacts into each tool's configuration
//! file: the managed server map is updated under namespace-qualified keys
//! while every sibling key round-trips untouched, and a surface is only
//! rewritten (atomically, after a backup) when a managed key actually
//! changed.

mod engine;
mod surface;

pub use engine::{SkippedArtifact, SyncEngine, SyncItem, SyncOptions, SyncReport};
pub use surface::{SurfaceState, SurfaceTarget};

use kit_meta::{MANIFEST_FILE, Manifest};

use crate::config::{RuntimeContext, Scope};
use crate::tracker::InstallStore;
use crate::Result;

/// Gather every installed artifact across both scopes, pairing each record
/// with its manifest definition.
///
/// Namespaces whose library checkout lost its manifest are skipped with a
/// warning rather than failing the whole sync; records without a matching
/// definition (e.g. conflict copies) are left out, as they have no surface
/// entry to render.
pub fn collect_items(ctx: &RuntimeContext) -> Result<Vec<SyncItem>> {
    let mut items = Vec::new();
    for scope in [Scope::Global, Scope::Project] {
        let store = InstallStore::open(ctx, scope);
        for info in store.namespaces()? {
            let manifest_path = ctx.library_root.join(&info.namespace).join(MANIFEST_FILE);
            let manifest = match Manifest::load(&manifest_path) {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!(namespace = %info.namespace, error = %e, "skipping namespace without loadable manifest");
                    continue;
                }
            };
            for record in store.list(Some(&info.namespace))? {
                if let Some(def) = manifest.artifact(&record.name) {
                    items.push(SyncItem {
                        record,
                        def: def.clone(),
                    });
                }
            }
        }
    }
    Ok(items)
}
