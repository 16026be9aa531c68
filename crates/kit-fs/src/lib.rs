//! Filesystem primitives for the kit workspace.
//!
//! Every persisted file in the workspace goes through this crate's atomic
//! write discipline, and every content comparison goes through
//! [`Fingerprint`]. Nothing in here knows about artifacts, namespaces, or
//! git; it is the bottom layer.

pub mod backup;
pub mod error;
pub mod fingerprint;
pub mod io;

pub use backup::backup_file;
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use io::{atomic_write, read_locked, read_to_string_locked};
