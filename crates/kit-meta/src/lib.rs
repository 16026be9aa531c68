//! Manifest model and target-surface registry.
//!
//! A repository that distributes artifacts carries a `kit.toml` manifest
//! enumerating them: documents, IDE commands, and MCP server definitions,
//! each with content path, environment variable declarations, dependencies,
//! and named sets grouping them. The manifest is consumed purely as typed
//! data, validated once at load time with field-level errors.
//!
//! The [`targets`] module is the data table of known AI-tool configuration
//! surfaces the sync engine can merge into.

pub mod error;
pub mod manifest;
pub mod server;
pub mod targets;

pub use error::{Error, Result};
pub use manifest::{ArtifactDef, ArtifactKind, EnvVarDecl, MANIFEST_FILE, Manifest};
pub use server::ServerDef;
pub use targets::{TargetSpec, target_spec, target_specs};
