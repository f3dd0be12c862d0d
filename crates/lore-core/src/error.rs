//! Engine error taxonomy
//!
//! Only terminal failures surface as errors. Conditions the engine can
//! step around (a busy lock, a pull that didn't apply, a rejected push, a
//! conflict reset) are reported through [`crate::sync::SyncOutcome`] so
//! best-effort background callers never crash on them.

use thiserror::Error;

use crate::git::GitError;
use crate::lock::LockError;
use crate::store::StoreError;

/// Terminal failures of engine operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// No remote URL configured, or the working copy was never initialized
    #[error("knowledge store is not configured: set a remote URL and run init")]
    ConfigurationMissing,

    /// Cloning the remote failed; nothing was left behind locally
    #[error("failed to clone '{remote}': {source}")]
    CloneFailed {
        remote: String,
        #[source]
        source: GitError,
    },

    /// Store metadata could not be encoded for seeding
    #[error("failed to encode store metadata: {0}")]
    MetaEncode(#[from] toml::ser::Error),

    /// An unexpected version-control failure
    #[error(transparent)]
    Git(#[from] GitError),

    /// Lock bookkeeping failed (a busy lock is an outcome, not an error)
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Document storage failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for engine operations
pub type SyncResult<T> = Result<T, SyncError>;
