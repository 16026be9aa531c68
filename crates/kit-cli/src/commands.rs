//! Command implementations
//!
//! Each command builds its components from the shared [`RuntimeContext`],
//! prints a human-readable account of what happened, and returns an error
//! only when the overall operation's worst outcome was a failure.

use colored::Colorize;
use kit_core::{
    ActivationManager, ArtifactUpdate, CredentialResolver, CredentialStore, Decision, FixedPolicy,
    InstallStore, Installer, NamespacePolicy, ResolutionPolicy, RuntimeContext, Scope,
    SurfaceTarget, SyncEngine, SyncOptions, SyncReport, Updater, collect_items, masked,
};
use kit_meta::target_specs;

use crate::cli::{OnConflict, ResolveMode};
use crate::error::{Error, Result};
use crate::prompt::InteractivePolicy;

fn scope_of(global: bool) -> Scope {
    if global { Scope::Global } else { Scope::Project }
}

/// Resolve the surfaces a sync-like command should touch.
fn surfaces(ctx: &RuntimeContext, only: &[String]) -> Vec<SurfaceTarget> {
    target_specs()
        .iter()
        .filter(|spec| only.is_empty() || only.iter().any(|slug| slug == spec.slug))
        .map(|spec| SurfaceTarget::from_spec(spec, &ctx.project_root))
        .collect()
}

pub fn run_install(
    ctx: &RuntimeContext,
    location: &str,
    reference: Option<&str>,
    namespace: Option<&str>,
    global: bool,
    on_conflict: Option<OnConflict>,
) -> Result<()> {
    let policy = match on_conflict {
        None => NamespacePolicy::Reject,
        Some(OnConflict::Skip) => NamespacePolicy::Skip,
        Some(OnConflict::Overwrite) => NamespacePolicy::Overwrite,
        Some(OnConflict::Rename) => NamespacePolicy::Rename,
    };
    let outcome =
        Installer::new(ctx).install(location, reference, namespace, scope_of(global), policy)?;

    if outcome.skipped {
        println!(
            "{} namespace {} already installed, skipped",
            "ok".green().bold(),
            outcome.namespace.bold()
        );
        return Ok(());
    }
    println!(
        "{} installed {} artifact(s) under {}",
        "ok".green().bold(),
        outcome.installed.len(),
        outcome.namespace.bold()
    );
    for name in &outcome.installed {
        println!("  {name}");
    }
    finish(&outcome.errors)
}

pub fn run_uninstall(ctx: &RuntimeContext, namespace: &str, global: bool) -> Result<()> {
    let removed = Installer::new(ctx).uninstall(namespace, scope_of(global))?;
    println!(
        "{} removed {removed} artifact(s) from {}",
        "ok".green().bold(),
        namespace.bold()
    );
    Ok(())
}

pub fn run_list(ctx: &RuntimeContext, namespace: Option<&str>) -> Result<()> {
    let mut total = 0;
    for scope in [Scope::Project, Scope::Global] {
        let records = InstallStore::open(ctx, scope).list(namespace)?;
        if records.is_empty() {
            continue;
        }
        println!("{} scope:", scope.to_string().bold());
        for record in records {
            println!(
                "  {}  {} @ {} ({})",
                record.qualified_name().bold(),
                record.source,
                record.ref_name,
                record.ref_kind
            );
            total += 1;
        }
    }
    if total == 0 {
        println!("nothing installed");
    }
    Ok(())
}

pub fn run_update(
    ctx: &RuntimeContext,
    namespace: Option<&str>,
    resolve: Option<ResolveMode>,
    global: bool,
) -> Result<()> {
    let fixed;
    let interactive;
    let policy: &dyn ResolutionPolicy = match resolve {
        Some(mode) => {
            fixed = FixedPolicy(match mode {
                ResolveMode::Keep => Decision::KeepLocal,
                ResolveMode::Overwrite => Decision::Overwrite,
                ResolveMode::Both => Decision::InstallBoth,
            });
            &fixed
        }
        None => {
            interactive = InteractivePolicy;
            &interactive
        }
    };

    let report = Updater::new(ctx).update(scope_of(global), namespace, policy)?;
    let mut errors = Vec::new();
    for ns in &report.namespaces {
        if ns.pinned {
            println!(
                "{} {} is pinned to an immutable reference, skipped",
                "--".dimmed(),
                ns.namespace.bold()
            );
            continue;
        }
        for update in &ns.artifacts {
            match update {
                ArtifactUpdate::Unchanged { artifact } => {
                    println!("{} {artifact} unchanged", "--".dimmed());
                }
                ArtifactUpdate::Applied { artifact } => {
                    println!("{} {artifact} updated", "ok".green().bold());
                }
                ArtifactUpdate::KeptLocal { artifact } => {
                    println!("{} {artifact} has local edits, kept", "--".yellow());
                }
                ArtifactUpdate::Resolved { artifact, decision } => {
                    println!("{} {artifact} conflict resolved: {decision:?}", "ok".green().bold());
                }
                ArtifactUpdate::Added { artifact } => {
                    println!("{} {artifact} added from upstream", "ok".green().bold());
                }
                ArtifactUpdate::RemovedUpstream { artifact } => {
                    println!("{} {artifact} no longer exists upstream, kept", "--".yellow());
                }
            }
        }
        for error in &ns.errors {
            eprintln!("{} {}: {error}", "error".red().bold(), ns.namespace);
            errors.push(error.clone());
        }
    }
    finish(&errors)
}

pub fn run_config_set(
    ctx: &RuntimeContext,
    name: &str,
    value: Option<&str>,
    global: bool,
) -> Result<()> {
    let value = match value {
        Some(v) => v.to_string(),
        None => dialoguer::Password::new()
            .with_prompt(format!("Value for {name}"))
            .interact()?,
    };
    CredentialStore::open(ctx, scope_of(global)).set(name, &value)?;
    println!("{} stored {}", "ok".green().bold(), name.bold());
    Ok(())
}

pub fn run_config_unset(ctx: &RuntimeContext, name: &str, global: bool) -> Result<()> {
    if CredentialStore::open(ctx, scope_of(global)).unset(name)? {
        println!("{} removed {}", "ok".green().bold(), name.bold());
    } else {
        println!("{name} was not set");
    }
    Ok(())
}

pub fn run_config_list(ctx: &RuntimeContext) -> Result<()> {
    let mut empty = true;
    for scope in [Scope::Project, Scope::Global] {
        let entries = CredentialStore::open(ctx, scope).load()?;
        if entries.is_empty() {
            continue;
        }
        empty = false;
        println!("{} scope:", scope.to_string().bold());
        for (name, value) in entries {
            // Only the masked form ever reaches the terminal.
            println!("  {name}={}", masked(&value));
        }
    }
    if empty {
        println!("no credentials stored");
    }
    Ok(())
}

pub fn run_sync(ctx: &RuntimeContext, no_backup: bool, only: &[String]) -> Result<()> {
    let resolver = CredentialResolver::new(ctx);
    let engine = SyncEngine::new(&resolver, SyncOptions { backup: !no_backup });
    let items = collect_items(ctx)?;
    let report = engine.sync(&surfaces(ctx, only), &items)?;
    print_sync_report(&report);
    finish(&report.errors)
}

pub fn run_activate(
    ctx: &RuntimeContext,
    set_spec: &str,
    allow_partial: bool,
    no_backup: bool,
) -> Result<()> {
    let (namespace, set) = set_spec.split_once(':').ok_or_else(|| {
        Error::Partial(format!("expected namespace:set, got '{set_spec}'"))
    })?;
    let resolver = CredentialResolver::new(ctx);
    let report = ActivationManager::new(ctx).activate(
        namespace,
        set,
        &surfaces(ctx, &[]),
        &resolver,
        SyncOptions { backup: !no_backup },
        allow_partial,
    )?;

    print_sync_report(&report.sync);
    println!(
        "{} set {} active with {} artifact(s)",
        "ok".green().bold(),
        format!("{namespace}:{set}").bold(),
        report.record.artifacts.len()
    );
    finish(&report.sync.errors)
}

pub fn run_deactivate(ctx: &RuntimeContext) -> Result<()> {
    match ActivationManager::new(ctx).deactivate()? {
        Some(previous) => println!(
            "{} deactivated {}:{} (synced configuration left in place)",
            "ok".green().bold(),
            previous.namespace,
            previous.set
        ),
        None => println!("no set was active"),
    }
    Ok(())
}

fn print_sync_report(report: &SyncReport) {
    for slug in &report.written {
        println!("{} {} updated", "ok".green().bold(), slug.bold());
    }
    for slug in &report.unchanged {
        println!("{} {} already up to date", "--".dimmed(), slug);
    }
    for skip in &report.skipped {
        println!(
            "{} {} skipped, missing: {}",
            "--".yellow(),
            skip.artifact,
            skip.missing.join(", ")
        );
    }
    for error in &report.errors {
        eprintln!("{} {error}", "error".red().bold());
    }
    if !report.touched_any_surface() {
        println!("no surface needed changes");
    }
}

/// Per-unit failures never abort siblings; they decide the exit status here.
fn finish(errors: &[String]) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Partial(format!("{} unit(s) failed", errors.len())))
    }
}
