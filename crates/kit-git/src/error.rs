//! Error types for kit-git

use std::path::PathBuf;

/// Result type for kit-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kit-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested reference does not exist on the remote.
    #[error("Reference '{name}' not found in {location}")]
    ReferenceNotFound { location: String, name: String },

    /// A previously-resolved reference no longer exists on the remote.
    #[error("Reference '{name}' no longer exists in {location}")]
    ReferenceGone { location: String, name: String },

    /// Transient network failure; nothing local was mutated.
    #[error("Network failure talking to {location}: {message}")]
    Network { location: String, message: String },

    #[error("Checkout for '{namespace}' already exists at {path}")]
    CheckoutExists { namespace: String, path: PathBuf },

    #[error("No checkout for '{namespace}' at {path}")]
    CheckoutMissing { namespace: String, path: PathBuf },

    #[error(transparent)]
    Git(#[from] git2::Error),

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

    /// Wrap a git2 error, surfacing transport failures as [`Error::Network`].
    pub(crate) fn from_git(location: &str, err: git2::Error) -> Self {
        use git2::ErrorClass;
        match err.class() {
            ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssh | ErrorClass::Ssl => {
                Self::Network {
                    location: location.to_string(),
                    message: err.message().to_string(),
                }
            }
            _ => Self::Git(err),
        }
    }
}
