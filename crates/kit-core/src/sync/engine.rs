//! SyncEngine implementation
//!
//! For each target surface the engine reads the current persisted state,
//! merges every resolvable artifact into the managed section, and commits
//! only when something actually changed. An artifact whose credentials do
//! not fully resolve is skipped and reported, never failed, and never
//! partially written.

use std::collections::BTreeMap;

use kit_meta::{ArtifactDef, ArtifactKind, ServerDef};
use serde_json::{Map, Value, json};

use crate::credentials::CredentialResolver;
use crate::tracker::InstallRecord;
use crate::{Error, Result};

use super::surface::{SurfaceState, SurfaceTarget};

/// One artifact handed to the engine: its manifest definition plus the
/// installation record pointing at the content on disk.
#[derive(Debug, Clone)]
pub struct SyncItem {
    pub record: InstallRecord,
    pub def: ArtifactDef,
}

impl SyncItem {
    fn qualified_name(&self) -> String {
        self.record.qualified_name()
    }
}

/// Options for sync operations
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Back up each surface before its first modification.
    pub backup: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { backup: true }
    }
}

/// An artifact that could not sync because credentials were missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArtifact {
    pub artifact: String,
    pub missing: Vec<String>,
}

/// Report from a sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Surfaces rewritten because a managed key changed.
    pub written: Vec<String>,
    /// Surfaces processed without any managed change.
    pub unchanged: Vec<String>,
    /// Qualified names merged into the managed sections.
    pub applied: Vec<String>,
    /// Artifacts skipped for missing credentials, with the gaps named.
    pub skipped: Vec<SkippedArtifact>,
    /// Per-unit failures; siblings keep processing.
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// A sync that touched zero surfaces is reported as such, not silently
    /// treated as a write.
    pub fn touched_any_surface(&self) -> bool {
        !self.written.is_empty()
    }
}

/// Engine for merging artifacts into target surfaces.
pub struct SyncEngine<'a> {
    resolver: &'a CredentialResolver,
    options: SyncOptions,
}

impl<'a> SyncEngine<'a> {
    pub fn new(resolver: &'a CredentialResolver, options: SyncOptions) -> Self {
        Self { resolver, options }
    }

    /// Merge `items` into every surface in `targets`.
    ///
    /// Artifacts resolve and render once; surfaces are then processed
    /// independently, each with its own fresh read and conditional atomic
    /// write. Failures stay local to their unit of work.
    pub fn sync(&self, targets: &[SurfaceTarget], items: &[SyncItem]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut rendered: Vec<(String, Value)> = Vec::new();

        for item in items {
            if item.def.kind != ArtifactKind::McpServer {
                continue;
            }
            let qualified = item.qualified_name();
            match self.render(item) {
                Ok(entry) => {
                    report.applied.push(qualified.clone());
                    rendered.push((qualified, entry));
                }
                Err(Error::MissingCredentials { artifact, missing }) => {
                    tracing::warn!(%artifact, ?missing, "skipping artifact: unresolved credentials");
                    report.skipped.push(SkippedArtifact { artifact, missing });
                }
                Err(e) => report.errors.push(format!("{qualified}: {e}")),
            }
        }

        for target in targets {
            let slug = target.slug.clone();
            match self.sync_surface(target.clone(), &rendered) {
                Ok(true) => report.written.push(slug),
                Ok(false) => report.unchanged.push(slug),
                Err(e) => report.errors.push(format!("{slug}: {e}")),
            }
        }

        Ok(report)
    }

    fn sync_surface(&self, target: SurfaceTarget, rendered: &[(String, Value)]) -> Result<bool> {
        let mut state = SurfaceState::read(target)?;
        for (qualified, entry) in rendered {
            state.upsert(qualified, entry.clone());
        }
        state.commit(self.options.backup)
    }

    /// Render an artifact's surface entry with fully resolved environment.
    ///
    /// The entry's env starts from the declared variables' resolved values;
    /// the server definition's own env entries are substituted on top. A
    /// `${NAME}` placeholder with no resolved value counts as a missing
    /// credential, so nothing half-rendered can escape.
    fn render(&self, item: &SyncItem) -> Result<Value> {
        let resolved = self.resolver.resolve(&item.record.namespace, &item.def)?;
        let server = ServerDef::load(&item.record.installed_path).map_err(Error::Meta)?;

        let mut unresolved: Vec<String> = server
            .placeholders()
            .into_iter()
            .filter(|name| !resolved.contains_key(name))
            .collect();
        if !unresolved.is_empty() {
            unresolved.sort();
            return Err(Error::MissingCredentials {
                artifact: item.qualified_name(),
                missing: unresolved,
            });
        }

        let mut env: BTreeMap<String, String> = resolved.clone();
        for (name, value) in &server.env {
            env.insert(name.clone(), substitute(value, &resolved));
        }

        let mut entry = Map::new();
        entry.insert("command".to_string(), json!(server.command));
        if !server.args.is_empty() {
            entry.insert("args".to_string(), json!(server.args));
        }
        if !env.is_empty() {
            entry.insert("env".to_string(), json!(env));
        }
        Ok(Value::Object(entry))
    }
}

/// Replace `${NAME}` placeholders from the resolved view.
fn substitute(value: &str, resolved: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        match tail.find('}') {
            Some(end) => {
                let name = &tail[..end];
                match resolved.get(name) {
                    Some(replacement) => out.push_str(replacement),
                    // render() guarantees every placeholder resolves; keep
                    // the literal if a caller bypasses it.
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuntimeContext, Scope};
    use crate::credentials::CredentialStore;
    use chrono::Utc;
    use kit_fs::Fingerprint;
    use kit_git::RefKind;
    use kit_meta::EnvVarDecl;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::tempdir;

    fn context(dir: &Path) -> RuntimeContext {
        let ctx =
            RuntimeContext::with_roots(dir.join("library"), dir.join("global"), dir.join("project"));
        std::fs::create_dir_all(&ctx.project_root).unwrap();
        ctx
    }

    fn server_item(ctx: &RuntimeContext, namespace: &str, name: &str, env: Vec<EnvVarDecl>) -> SyncItem {
        let path = ctx
            .install_root(Scope::Project)
            .join(namespace)
            .join(format!("{name}.json"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let env_json: BTreeMap<String, String> = env
            .iter()
            .map(|v| (v.name.clone(), format!("${{{}}}", v.name)))
            .collect();
        let def = serde_json::json!({"command": "npx", "args": ["-y", name], "env": env_json});
        std::fs::write(&path, serde_json::to_string_pretty(&def).unwrap()).unwrap();

        SyncItem {
            record: InstallRecord {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source: "https://example.com/repo.git".to_string(),
                ref_name: "main".to_string(),
                ref_kind: RefKind::Branch,
                scope: Scope::Project,
                installed_path: path.clone(),
                fingerprint: Fingerprint::of_file(&path).unwrap(),
                installed_at: Utc::now(),
            },
            def: ArtifactDef {
                name: name.to_string(),
                kind: ArtifactKind::McpServer,
                path: format!("servers/{name}.json"),
                env,
                requires: Vec::new(),
            },
        }
    }

    fn claude_target(ctx: &RuntimeContext) -> SurfaceTarget {
        SurfaceTarget {
            slug: "claude".to_string(),
            path: ctx.project_root.join(".mcp.json"),
            servers_key: "mcpServers".to_string(),
        }
    }

    fn required(name: &str) -> EnvVarDecl {
        EnvVarDecl {
            name: name.to_string(),
            default: None,
        }
    }

    #[test]
    fn resolvable_artifact_lands_on_surface() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        CredentialStore::open(&ctx, Scope::Project)
            .set("API_TOKEN", "secret-1")
            .unwrap();

        let resolver = CredentialResolver::new(&ctx);
        let engine = SyncEngine::new(&resolver, SyncOptions::default());
        let items = vec![server_item(&ctx, "backend", "github", vec![required("API_TOKEN")])];
        let targets = vec![claude_target(&ctx)];

        let report = engine.sync(&targets, &items).unwrap();
        assert!(report.success());
        assert_eq!(report.written, vec!["claude"]);
        assert_eq!(report.applied, vec!["backend.github"]);

        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(ctx.project_root.join(".mcp.json")).unwrap(),
        )
        .unwrap();
        let entry = &written["mcpServers"]["backend.github"];
        assert_eq!(entry["command"], "npx");
        assert_eq!(entry["env"]["API_TOKEN"], "secret-1");
    }

    #[test]
    fn missing_credentials_skip_artifact_but_not_siblings() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        CredentialStore::open(&ctx, Scope::Project)
            .set("GOOD_TOKEN", "ok")
            .unwrap();

        let resolver = CredentialResolver::new(&ctx);
        let engine = SyncEngine::new(&resolver, SyncOptions::default());
        let items = vec![
            server_item(&ctx, "backend", "broken", vec![required("API_TOKEN")]),
            server_item(&ctx, "backend", "good", vec![required("GOOD_TOKEN")]),
        ];
        let targets = vec![claude_target(&ctx)];

        let report = engine.sync(&targets, &items).unwrap();
        assert!(report.success(), "skips are not failures: {:?}", report.errors);
        assert_eq!(report.applied, vec!["backend.good"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].artifact, "backend.broken");
        assert_eq!(report.skipped[0].missing, vec!["API_TOKEN"]);

        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(ctx.project_root.join(".mcp.json")).unwrap(),
        )
        .unwrap();
        assert!(written["mcpServers"].get("backend.broken").is_none());
        assert!(written["mcpServers"].get("backend.good").is_some());
    }

    #[test]
    fn sync_twice_is_idempotent() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let resolver = CredentialResolver::new(&ctx);
        let engine = SyncEngine::new(&resolver, SyncOptions::default());
        let items = vec![server_item(&ctx, "backend", "plain", vec![])];
        let targets = vec![claude_target(&ctx)];

        let first = engine.sync(&targets, &items).unwrap();
        assert_eq!(first.written, vec!["claude"]);
        let bytes_after_first = std::fs::read(ctx.project_root.join(".mcp.json")).unwrap();

        let second = engine.sync(&targets, &items).unwrap();
        assert_eq!(second.written, Vec::<String>::new());
        assert_eq!(second.unchanged, vec!["claude"]);
        let bytes_after_second = std::fs::read(ctx.project_root.join(".mcp.json")).unwrap();
        assert_eq!(bytes_after_first, bytes_after_second);
    }

    #[test]
    fn namespaces_do_not_clobber_each_other() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let resolver = CredentialResolver::new(&ctx);
        let engine = SyncEngine::new(&resolver, SyncOptions::default());
        let targets = vec![claude_target(&ctx)];

        let backend = vec![server_item(&ctx, "backend", "github", vec![])];
        engine.sync(&targets, &backend).unwrap();
        let frontend = vec![server_item(&ctx, "frontend", "github", vec![])];
        engine.sync(&targets, &frontend).unwrap();

        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(ctx.project_root.join(".mcp.json")).unwrap(),
        )
        .unwrap();
        assert!(written["mcpServers"].get("backend.github").is_some());
        assert!(written["mcpServers"].get("frontend.github").is_some());
    }

    #[test]
    fn non_server_artifacts_never_reach_surfaces() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let resolver = CredentialResolver::new(&ctx);
        let engine = SyncEngine::new(&resolver, SyncOptions::default());
        let targets = vec![claude_target(&ctx)];

        let mut item = server_item(&ctx, "backend", "style", vec![]);
        item.def.kind = ArtifactKind::Doc;

        let report = engine.sync(&targets, &[item]).unwrap();
        assert!(report.applied.is_empty());
        assert!(!report.touched_any_surface());
        assert!(!ctx.project_root.join(".mcp.json").exists());
    }

    #[test]
    fn default_value_substituted_into_placeholders() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let resolver = CredentialResolver::new(&ctx);
        let engine = SyncEngine::new(&resolver, SyncOptions::default());
        let targets = vec![claude_target(&ctx)];

        let items = vec![server_item(
            &ctx,
            "backend",
            "hosted",
            vec![EnvVarDecl {
                name: "HOST".to_string(),
                default: Some("github.com".to_string()),
            }],
        )];

        let report = engine.sync(&targets, &items).unwrap();
        assert!(report.success());

        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(ctx.project_root.join(".mcp.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(
            written["mcpServers"]["backend.hosted"]["env"]["HOST"],
            "github.com"
        );
    }

    #[test]
    fn substitute_handles_multiple_placeholders() {
        let mut resolved = BTreeMap::new();
        resolved.insert("A".to_string(), "1".to_string());
        resolved.insert("B".to_string(), "2".to_string());
        assert_eq!(substitute("${A}:${B}:${A}", &resolved), "1:2:1");
        assert_eq!(substitute("no placeholders", &resolved), "no placeholders");
        assert_eq!(substitute("${open", &resolved), "${open");
    }
}
