//! Error types for kit-meta

use std::path::PathBuf;

/// Result type for kit-meta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kit-meta operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse manifest at {path}: {message}")]
    ManifestParse { path: PathBuf, message: String },

    #[error("Invalid manifest field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Artifact dependency cycle: {chain}")]
    DependencyCycle { chain: String },

    #[error("Unknown artifact '{name}'")]
    UnknownArtifact { name: String },

    #[error("Failed to parse server definition at {path}: {message}")]
    ServerParse { path: PathBuf, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
