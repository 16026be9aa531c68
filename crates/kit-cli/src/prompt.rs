//! Interactive conflict resolution
//!
//! Implements [`ResolutionPolicy`] over a dialoguer select so the core
//! detector never blocks on terminal I/O itself. Unattended runs use
//! [`kit_core::FixedPolicy`] via `--resolve` instead.

use colored::Colorize;
use dialoguer::Select;
use kit_core::{Conflict, Decision, ResolutionPolicy};

pub struct InteractivePolicy;

impl ResolutionPolicy for InteractivePolicy {
    fn resolve(&self, conflict: &Conflict) -> Decision {
        println!(
            "{} both you and upstream changed {}",
            "conflict:".yellow().bold(),
            conflict.qualified_name().bold()
        );
        println!("  file: {}", conflict.path.display());

        let selection = Select::new()
            .with_prompt("How should this be resolved?")
            .items(&[
                "Keep my version (skip the upstream change)",
                "Take upstream (overwrite my edits)",
                "Keep both (upstream copy installed under a new name)",
            ])
            .default(0)
            .interact();

        match selection {
            Ok(1) => Decision::Overwrite,
            Ok(2) => Decision::InstallBoth,
            // Default and fallback: never destroy local edits by accident.
            _ => Decision::KeepLocal,
        }
    }
}
