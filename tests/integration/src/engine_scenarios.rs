//! End-to-end engine scenarios: install, update, sync, and activation
//! driven against real git fixtures and isolated temporary roots.

use std::path::Path;

use kit_core::{
    ActivationManager, CredentialResolver, CredentialStore, Decision, FixedPolicy, InstallStore,
    Installer, NamespacePolicy, RuntimeContext, Scope, SurfaceTarget, SyncEngine, SyncOptions,
    Updater, collect_items,
};
use kit_fs::Fingerprint;
use kit_test_utils::git::RemoteFixture;
use pretty_assertions::assert_eq;
use serde_json::Value;

fn context(dir: &Path) -> RuntimeContext {
    let ctx = RuntimeContext::with_roots(dir.join("library"), dir.join("global"), dir.join("project"));
    std::fs::create_dir_all(&ctx.project_root).unwrap();
    ctx
}

fn claude_target(ctx: &RuntimeContext) -> SurfaceTarget {
    SurfaceTarget {
        slug: "claude".to_string(),
        path: ctx.project_root.join(".mcp.json"),
        servers_key: "mcpServers".to_string(),
    }
}

fn standards_fixture() -> RemoteFixture {
    let fixture = RemoteFixture::init();
    fixture.write(
        "kit.toml",
        r#"
        [[artifacts]]
        name = "style"
        kind = "doc"
        path = "docs/style.md"

        [[artifacts]]
        name = "github"
        kind = "mcp-server"
        path = "servers/github.json"
        env = [{ name = "API_TOKEN" }]

        [[artifacts]]
        name = "search"
        kind = "mcp-server"
        path = "servers/search.json"

        [sets]
        dev = ["style", "search"]
        prod = ["github", "search"]
        "#,
    );
    fixture.write("docs/style.md", "# Style v1\n");
    fixture.write(
        "servers/github.json",
        r#"{"command": "npx", "args": ["-y", "server-github"], "env": {"API_TOKEN": "${API_TOKEN}"}}"#,
    );
    fixture.write("servers/search.json", r#"{"command": "npx", "args": ["-y", "server-search"]}"#);
    fixture.commit_all("initial artifacts");
    fixture
}

fn install(ctx: &RuntimeContext, fixture: &RemoteFixture, namespace: &str, reference: Option<&str>) {
    Installer::new(ctx)
        .install(
            fixture.location(),
            reference,
            Some(namespace),
            Scope::Project,
            NamespacePolicy::Reject,
        )
        .unwrap();
}

fn surface_json(ctx: &RuntimeContext) -> Value {
    serde_json::from_str(&std::fs::read_to_string(ctx.project_root.join(".mcp.json")).unwrap())
        .unwrap()
}

#[test]
fn double_sync_produces_byte_identical_surface() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let fixture = standards_fixture();
    install(&ctx, &fixture, "backend", None);
    CredentialStore::open(&ctx, Scope::Project)
        .set("API_TOKEN", "secret")
        .unwrap();

    let resolver = CredentialResolver::new(&ctx);
    let engine = SyncEngine::new(&resolver, SyncOptions::default());
    let items = collect_items(&ctx).unwrap();
    let targets = vec![claude_target(&ctx)];

    engine.sync(&targets, &items).unwrap();
    let first = std::fs::read(ctx.project_root.join(".mcp.json")).unwrap();

    let report = engine.sync(&targets, &items).unwrap();
    let second = std::fs::read(ctx.project_root.join(".mcp.json")).unwrap();

    assert_eq!(first, second);
    assert!(!report.touched_any_surface());
}

#[test]
fn opaque_content_is_preserved_verbatim_when_managed_keys_are_stable() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let fixture = standards_fixture();
    install(&ctx, &fixture, "backend", None);
    CredentialStore::open(&ctx, Scope::Project)
        .set("API_TOKEN", "secret")
        .unwrap();

    let resolver = CredentialResolver::new(&ctx);
    let engine = SyncEngine::new(&resolver, SyncOptions::default());
    let items = collect_items(&ctx).unwrap();
    let targets = vec![claude_target(&ctx)];
    engine.sync(&targets, &items).unwrap();

    // A user hand-edits unrelated keys, with odd formatting on purpose.
    let path = ctx.project_root.join(".mcp.json");
    let mut doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    doc["customSetting"] = serde_json::json!({"keep": [1, 2, 3]});
    let hand_edited = format!("{}   \n", serde_json::to_string(&doc).unwrap());
    std::fs::write(&path, &hand_edited).unwrap();

    // No managed key changes, so the file is not rewritten at all.
    let report = engine.sync(&targets, &items).unwrap();
    assert!(!report.touched_any_surface());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), hand_edited);
}

#[test]
fn tag_installed_namespace_survives_update_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let fixture = standards_fixture();
    fixture.tag("v1.0.0");
    install(&ctx, &fixture, "backend", Some("v1.0.0"));

    let store = InstallStore::open(&ctx, Scope::Project);
    let records_before = store.list(None).unwrap();
    let doc_path = ctx.install_root(Scope::Project).join("backend/docs/style.md");
    let content_before = std::fs::read_to_string(&doc_path).unwrap();

    fixture.write("docs/style.md", "# Style v2\n");
    fixture.commit_all("v2");

    let report = Updater::new(&ctx)
        .update(Scope::Project, None, &FixedPolicy(Decision::Overwrite))
        .unwrap();

    assert!(report.success());
    assert!(report.namespaces[0].pinned, "pinned namespace must be reported as skipped");
    assert_eq!(std::fs::read_to_string(&doc_path).unwrap(), content_before);
    assert_eq!(store.list(None).unwrap(), records_before);
}

#[test]
fn branch_update_applies_untouched_upstream_change() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let fixture = standards_fixture();
    install(&ctx, &fixture, "backend", None);

    fixture.write("docs/style.md", "# Style v2\n");
    fixture.commit_all("v2");

    let report = Updater::new(&ctx)
        .update(Scope::Project, None, &FixedPolicy(Decision::KeepLocal))
        .unwrap();
    assert!(report.success());

    let doc_path = ctx.install_root(Scope::Project).join("backend/docs/style.md");
    assert_eq!(std::fs::read_to_string(&doc_path).unwrap(), "# Style v2\n");

    let record = InstallStore::open(&ctx, Scope::Project)
        .get("backend", "style")
        .unwrap()
        .unwrap();
    assert_eq!(record.fingerprint, Fingerprint::of_bytes(b"# Style v2\n"));
}

#[test]
fn conflict_resolutions_behave_per_decision() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let fixture = standards_fixture();
    install(&ctx, &fixture, "backend", None);

    let doc_path = ctx.install_root(Scope::Project).join("backend/docs/style.md");
    std::fs::write(&doc_path, "my local version\n").unwrap();
    fixture.write("docs/style.md", "# Style v2\n");
    fixture.commit_all("v2");

    // Keep: on-disk content and record fingerprint unchanged.
    let store = InstallStore::open(&ctx, Scope::Project);
    let record_before = store.get("backend", "style").unwrap().unwrap();
    Updater::new(&ctx)
        .update(Scope::Project, None, &FixedPolicy(Decision::KeepLocal))
        .unwrap();
    assert_eq!(std::fs::read_to_string(&doc_path).unwrap(), "my local version\n");
    assert_eq!(
        store.get("backend", "style").unwrap().unwrap().fingerprint,
        record_before.fingerprint
    );

    // Overwrite: on-disk equals upstream, record equals the new digest.
    Updater::new(&ctx)
        .update(Scope::Project, None, &FixedPolicy(Decision::Overwrite))
        .unwrap();
    assert_eq!(std::fs::read_to_string(&doc_path).unwrap(), "# Style v2\n");
    assert_eq!(
        store.get("backend", "style").unwrap().unwrap().fingerprint,
        Fingerprint::of_bytes(b"# Style v2\n")
    );
}

#[test]
fn missing_credential_skips_only_the_affected_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let fixture = standards_fixture();
    install(&ctx, &fixture, "backend", None);
    // API_TOKEN deliberately unset.

    let resolver = CredentialResolver::new(&ctx);
    let engine = SyncEngine::new(&resolver, SyncOptions::default());
    let items = collect_items(&ctx).unwrap();
    let report = engine.sync(&[claude_target(&ctx)], &items).unwrap();

    assert!(report.success(), "a skip is not a failure");
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].artifact, "backend.github");
    assert_eq!(report.skipped[0].missing, vec!["API_TOKEN"]);

    let doc = surface_json(&ctx);
    assert!(doc["mcpServers"].get("backend.github").is_none());
    assert!(doc["mcpServers"].get("backend.search").is_some());
}

#[test]
fn same_artifact_name_from_two_namespaces_coexists() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let backend = standards_fixture();
    let frontend = standards_fixture();
    install(&ctx, &backend, "backend", None);
    install(&ctx, &frontend, "frontend", None);
    CredentialStore::open(&ctx, Scope::Project)
        .set("API_TOKEN", "secret")
        .unwrap();

    let resolver = CredentialResolver::new(&ctx);
    let engine = SyncEngine::new(&resolver, SyncOptions::default());
    let items = collect_items(&ctx).unwrap();
    engine.sync(&[claude_target(&ctx)], &items).unwrap();

    let doc = surface_json(&ctx);
    assert!(doc["mcpServers"].get("backend.search").is_some());
    assert!(doc["mcpServers"].get("frontend.search").is_some());
}

#[test]
fn activating_a_second_set_replaces_the_first() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let fixture = standards_fixture();
    install(&ctx, &fixture, "backend", None);
    CredentialStore::open(&ctx, Scope::Project)
        .set("API_TOKEN", "secret")
        .unwrap();

    let resolver = CredentialResolver::new(&ctx);
    let manager = ActivationManager::new(&ctx);
    let targets = vec![claude_target(&ctx)];

    manager
        .activate("backend", "dev", &targets, &resolver, SyncOptions::default(), false)
        .unwrap();
    manager
        .activate("backend", "prod", &targets, &resolver, SyncOptions::default(), false)
        .unwrap();

    let active = manager.current().unwrap().unwrap();
    assert_eq!(active.set, "prod");
    // Exactly prod's resolved list, never a union of both sets.
    assert_eq!(active.artifacts, vec!["backend.github", "backend.search"]);
}

#[test]
fn reinstalling_under_new_tag_is_the_explicit_pin_move() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let fixture = standards_fixture();
    fixture.tag("v1.0.0");
    install(&ctx, &fixture, "backend", Some("v1.0.0"));

    fixture.write("docs/style.md", "# Style v2\n");
    fixture.commit_all("v2");
    fixture.tag("v2.0.0");

    Installer::new(&ctx)
        .install(
            fixture.location(),
            Some("v2.0.0"),
            Some("backend"),
            Scope::Project,
            NamespacePolicy::Overwrite,
        )
        .unwrap();

    let record = InstallStore::open(&ctx, Scope::Project)
        .get("backend", "style")
        .unwrap()
        .unwrap();
    assert_eq!(record.ref_name, "v2.0.0");
    let doc_path = ctx.install_root(Scope::Project).join("backend/docs/style.md");
    assert_eq!(std::fs::read_to_string(&doc_path).unwrap(), "# Style v2\n");
}
