//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// kit - distribute coding standards, commands, and MCP servers from git
#[derive(Parser, Debug)]
#[command(name = "kit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (or set KIT_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// How to resolve an install-time namespace collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnConflict {
    Skip,
    Overwrite,
    Rename,
}

/// Fixed conflict resolution for unattended updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolveMode {
    Keep,
    Overwrite,
    Both,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Install a repository's artifacts under a namespace
    ///
    /// Examples:
    ///   kit install https://github.com/org/standards.git
    ///   kit install https://github.com/org/standards.git --ref v1.2.0
    ///   kit install ../local/standards --namespace backend --global
    Install {
        /// Repository location (URL or local path)
        location: String,

        /// Tag, branch, or commit to install (defaults to the default branch)
        #[arg(long = "ref")]
        reference: Option<String>,

        /// Namespace override (defaults to the repository name)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Install into the global scope instead of the project
        #[arg(short, long)]
        global: bool,

        /// What to do when the namespace already exists
        #[arg(long, value_enum)]
        on_conflict: Option<OnConflict>,
    },

    /// Remove a namespace: records, installed content, and checkout
    Uninstall {
        namespace: String,

        /// Uninstall from the global scope
        #[arg(short, long)]
        global: bool,
    },

    /// List installed artifacts
    List {
        /// Limit to one namespace
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Refresh branch-tracked namespaces and reconcile local edits
    ///
    /// Tag- and commit-pinned namespaces are reported and left untouched.
    Update {
        /// Limit to one namespace
        namespace: Option<String>,

        /// Fixed conflict resolution instead of interactive prompts
        #[arg(long, value_enum)]
        resolve: Option<ResolveMode>,

        /// Update global-scope installations instead of the project's
        #[arg(short, long)]
        global: bool,
    },

    /// Manage credentials
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Merge installed artifacts into the tool configuration surfaces
    Sync {
        /// Skip the pre-write backup of each surface
        #[arg(long)]
        no_backup: bool,

        /// Limit to specific target surfaces (default: all known)
        #[arg(short, long)]
        target: Vec<String>,
    },

    /// Activate a named set: sync exactly its artifacts
    Activate {
        /// Set to activate, as namespace:set
        set: String,

        /// Sync the resolvable subset even if some credentials are missing
        #[arg(long)]
        allow_partial: bool,

        /// Skip the pre-write backup of each surface
        #[arg(long)]
        no_backup: bool,
    },

    /// Return to the no-active-set state (synced config is left in place)
    Deactivate,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Store a credential (NAME=value files, project scope by default)
    Set {
        /// Credential name (UPPER_SNAKE_CASE)
        name: String,

        /// Value; read interactively when omitted
        value: Option<String>,

        /// Store in the global scope
        #[arg(short, long)]
        global: bool,
    },

    /// Remove a credential
    Unset {
        name: String,

        /// Remove from the global scope
        #[arg(short, long)]
        global: bool,
    },

    /// List credential names with masked values
    List,
}
