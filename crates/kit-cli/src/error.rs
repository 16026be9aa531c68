//! Error type for the CLI layer

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] kit_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    /// One or more units of work failed; details were already printed.
    #[error("{0}")]
    Partial(String),
}
