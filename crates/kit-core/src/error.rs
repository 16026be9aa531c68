//! Error types for kit-core
//!
//! Failures local to one artifact (missing credential, unresolved conflict)
//! are carried inside reports so sibling artifacts keep processing; the
//! variants here abort the operation that raised them.

use std::path::PathBuf;

use crate::config::Scope;

/// Result type for kit-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kit-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Install-time namespace collision; resolved only by explicit policy.
    #[error("Namespace '{namespace}' is already installed in {scope} scope")]
    NamespaceConflict { namespace: String, scope: Scope },

    #[error("Namespace '{namespace}' is not installed")]
    NamespaceNotInstalled { namespace: String },

    #[error("Artifact '{artifact}' is missing credentials: {}", missing.join(", "))]
    MissingCredentials {
        artifact: String,
        missing: Vec<String>,
    },

    /// An update conflict was left unresolved by the active policy.
    #[error("Unresolved conflict for '{artifact}'")]
    ConflictDetected { artifact: String },

    /// A persisted store failed to parse; refuse to proceed rather than
    /// guess. The message carries enough position detail to fix by hand.
    #[error("Malformed store file {path}: {message}")]
    MalformedStore { path: PathBuf, message: String },

    #[error(
        "Invalid credential name '{name}': use uppercase letters, digits and underscores, starting with a letter"
    )]
    InvalidCredentialName { name: String },

    #[error("Record not found: {namespace}.{name}")]
    RecordNotFound { namespace: String, name: String },

    #[error("Set '{set}' is not defined by namespace '{namespace}'")]
    SetNotFound { namespace: String, set: String },

    #[error("Verification failed after writing {path}: content does not match what was staged")]
    SurfaceVerification { path: PathBuf },

    #[error("Could not determine a home directory for global state")]
    HomeDirNotFound,

    // Transparent wrappers for underlying crate errors
    #[error(transparent)]
    Fs(#[from] kit_fs::Error),

    #[error(transparent)]
    Git(#[from] kit_git::Error),

    #[error(transparent)]
    Meta(#[from] kit_meta::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
