//! kit CLI
//!
//! Distributes coding standards, IDE commands, and MCP server definitions
//! from git repositories into local AI-tool configuration surfaces.

mod cli;
mod commands;
mod error;
mod prompt;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigAction};
use error::Result;
use kit_core::RuntimeContext;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("KIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let project_root = match &cli.project {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    let ctx = RuntimeContext::for_project(&project_root)?;

    match cli.command {
        Commands::Install {
            location,
            reference,
            namespace,
            global,
            on_conflict,
        } => commands::run_install(
            &ctx,
            &location,
            reference.as_deref(),
            namespace.as_deref(),
            global,
            on_conflict,
        ),
        Commands::Uninstall { namespace, global } => {
            commands::run_uninstall(&ctx, &namespace, global)
        }
        Commands::List { namespace } => commands::run_list(&ctx, namespace.as_deref()),
        Commands::Update {
            namespace,
            resolve,
            global,
        } => commands::run_update(&ctx, namespace.as_deref(), resolve, global),
        Commands::Config { action } => match action {
            ConfigAction::Set {
                name,
                value,
                global,
            } => commands::run_config_set(&ctx, &name, value.as_deref(), global),
            ConfigAction::Unset { name, global } => {
                commands::run_config_unset(&ctx, &name, global)
            }
            ConfigAction::List => commands::run_config_list(&ctx),
        },
        Commands::Sync { no_backup, target } => commands::run_sync(&ctx, no_backup, &target),
        Commands::Activate {
            set,
            allow_partial,
            no_backup,
        } => commands::run_activate(&ctx, &set, allow_partial, no_backup),
        Commands::Deactivate => commands::run_deactivate(&ctx),
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            clap_complete::generate(shell, &mut Cli::command(), "kit", &mut std::io::stdout());
            Ok(())
        }
    }
}
