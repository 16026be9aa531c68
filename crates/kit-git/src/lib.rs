//! Reference classification and checkout materialization.
//!
//! Two components live here:
//!
//! - [`RefClassifier`] decides whether a reference token names an immutable
//!   tag, an immutable commit, or a mutable branch, with at most one remote
//!   listing per repository per process.
//! - [`CheckoutManager`] materializes a classified reference into the
//!   library, one namespaced directory per installed repository version.
//!   Immutable refs become history-free, write-once checkouts; branch
//!   checkouts can be refreshed through an atomic directory swap.

pub mod checkout;
pub mod error;
pub mod refs;

pub use checkout::CheckoutManager;
pub use error::{Error, Result};
pub use refs::{RefClassifier, RefKind, ResolvedRef, is_commit_hash};
