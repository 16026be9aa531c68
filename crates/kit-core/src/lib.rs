//! Installation and synchronization engine.
//!
//! This crate coordinates the layer-0 crates into the flows a command
//! invocation runs:
//!
//! - **install**: classify a reference, materialize the checkout, copy
//!   artifacts into the per-scope install root, record provenance
//! - **configure**: persist credentials into the layered stores
//! - **sync / activate**: resolve credentials and merge artifacts into the
//!   target configuration surfaces
//! - **update**: refresh branch checkouts, reconcile local edits against
//!   upstream changes, advance installation records
//!
//! # Architecture
//!
//! `kit-core` sits above the layer-0 crates and below the CLI:
//!
//! ```text
//!            kit-cli
//!               |
//!            kit-core
//!               |
//!     +------+--+-------+
//!     |      |          |
//!  kit-fs kit-git   kit-meta
//! ```

pub mod activation;
pub mod config;
pub mod conflict;
pub mod credentials;
pub mod error;
pub mod install;
pub mod parallel;
pub mod sync;
pub mod tracker;
pub mod update;

pub use activation::{ActivationManager, ActivationReport, ActiveSetRecord};
pub use config::{RuntimeContext, Scope};
pub use conflict::{Conflict, Decision, FixedPolicy, ResolutionPolicy, UpdateClass, classify};
pub use credentials::{CredentialResolver, CredentialStore, masked, validate_name};
pub use error::{Error, Result};
pub use install::{InstallOutcome, Installer, NamespacePolicy, derive_namespace};
pub use sync::{
    SkippedArtifact, SurfaceState, SurfaceTarget, SyncEngine, SyncItem, SyncOptions, SyncReport,
    collect_items,
};
pub use tracker::{InstallRecord, InstallStore, NamespaceInfo};
pub use update::{ArtifactUpdate, NamespaceUpdate, UpdateReport, Updater};
