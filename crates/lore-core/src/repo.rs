//! Working copy bootstrap
//!
//! Owns the local clone of the knowledge store: creating it on first run,
//! recognizing it on later runs, and keeping enough local git identity
//! around for background commits to succeed on machines that never set one
//! up.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::git::{Git, GitError};
use crate::recover::{self, RecoverOutcome};
use crate::store;

/// Remote every working copy syncs with
pub const REMOTE_NAME: &str = "origin";

/// Schema version written into fresh store metadata
pub const STORE_VERSION: u32 = 1;

/// Metadata seeded into a store whose remote had no history yet
///
/// Deliberately content-deterministic: two machines that both bootstrap
/// against an empty remote produce byte-identical seed files, so the
/// loser's replayed seed commit resolves cleanly instead of conflicting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub version: u32,
}

impl StoreMeta {
    fn current() -> Self {
        Self {
            version: STORE_VERSION,
        }
    }
}

/// The local clone of the shared knowledge store
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    root: PathBuf,
    git: Git,
}

impl WorkingCopy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let git = Git::new(&root);
        Self { root, git }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    /// Whether version-control metadata is present at the root
    pub fn is_initialized(&self) -> bool {
        self.root.join(".git").exists()
    }

    /// Create or attach the working copy for `remote_url`
    ///
    /// Idempotent. An already-initialized copy is left exactly as it is; if
    /// it tracks a different remote than requested, that is logged but not
    /// treated as an error. A fresh clone whose remote turns out to have no
    /// history gets the store metadata file and an initial commit, so the
    /// first push has ancestry to build on.
    pub fn init(&self, remote_url: &str) -> SyncResult<()> {
        if self.is_initialized() {
            match self.git.remote_url(REMOTE_NAME)? {
                Some(existing) if existing != remote_url => warn!(
                    configured = %existing,
                    requested = %remote_url,
                    "working copy already tracks a different remote, leaving it unchanged"
                ),
                Some(_) => debug!(path = %self.root.display(), "working copy already initialized"),
                None => warn!(
                    path = %self.root.display(),
                    "working copy is missing its sync remote, leaving it unchanged"
                ),
            }
            return Ok(());
        }

        if let Some(parent) = self.root.parent() {
            fs::create_dir_all(parent).map_err(|source| {
                SyncError::Store(store::StoreError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })
            })?;
        }

        info!(remote = %remote_url, path = %self.root.display(), "cloning knowledge store");
        Git::clone_repository(remote_url, &self.root).map_err(|source| SyncError::CloneFailed {
            remote: remote_url.to_string(),
            source,
        })?;

        if self.git.head_commit()?.is_none() {
            info!("remote has no history yet, seeding initial store layout");
            self.seed_initial_commit()?;
        }

        Ok(())
    }

    /// Bring the working copy back to an operable state
    ///
    /// See [`crate::recover`] for what this repairs.
    pub fn recover(&self) -> Result<RecoverOutcome, GitError> {
        recover::recover(&self.git)
    }

    /// Branch the working copy currently has checked out
    pub fn current_branch(&self) -> Result<String, GitError> {
        self.git.current_branch()
    }

    /// Commit whatever is staged under the service identity
    pub(crate) fn commit(&self, message: &str) -> Result<(), GitError> {
        self.ensure_commit_identity()?;
        self.git.run(&["commit", "-q", "-m", message])?;
        Ok(())
    }

    /// Make sure `git commit` has an author to work with
    ///
    /// Only fills in repository-local values when nothing is configured, so
    /// a person's own identity always wins.
    pub fn ensure_commit_identity(&self) -> Result<(), GitError> {
        if !self.git.succeeds(&["config", "user.email"])? {
            self.git.run(&["config", "user.email", "lore@localhost"])?;
        }
        if !self.git.succeeds(&["config", "user.name"])? {
            self.git.run(&["config", "user.name", "lore"])?;
        }
        Ok(())
    }

    /// Write `.lore.toml` and commit it as the store's first history entry
    fn seed_initial_commit(&self) -> SyncResult<()> {
        let meta = StoreMeta::current();
        let content = toml::to_string_pretty(&meta)?;
        store::atomic_write(&self.root.join(".lore.toml"), content.as_bytes())?;

        self.git.run(&["add", "-A"])?;
        self.commit("Initialize knowledge store")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bare_remote(temp: &TempDir) -> String {
        let path = temp.path().join("remote.git");
        let git = Git::new(temp.path());
        git.run(&["init", "-q", "--bare", path.to_str().unwrap()])
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_init_seeds_empty_remote() {
        let temp = TempDir::new().unwrap();
        let remote = bare_remote(&temp);
        let copy = WorkingCopy::new(temp.path().join("store"));

        assert!(!copy.is_initialized());
        copy.init(&remote).unwrap();

        assert!(copy.is_initialized());
        assert!(copy.root().join(".lore.toml").exists());
        assert!(copy.git().head_commit().unwrap().is_some());

        let subject = copy.git().run(&["log", "-1", "--format=%s"]).unwrap();
        assert_eq!(subject, "Initialize knowledge store");

        let raw = std::fs::read_to_string(copy.root().join(".lore.toml")).unwrap();
        let meta: StoreMeta = toml::from_str(&raw).unwrap();
        assert_eq!(meta.version, STORE_VERSION);
    }

    #[test]
    fn test_init_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let remote = bare_remote(&temp);
        let copy = WorkingCopy::new(temp.path().join("store"));

        copy.init(&remote).unwrap();
        copy.init(&remote).unwrap();

        let commits = copy
            .git()
            .run(&["rev-list", "--count", "HEAD"])
            .unwrap();
        assert_eq!(commits, "1");
    }

    #[test]
    fn test_init_with_different_remote_warns_but_keeps_existing() {
        let temp = TempDir::new().unwrap();
        let remote = bare_remote(&temp);
        let copy = WorkingCopy::new(temp.path().join("store"));
        copy.init(&remote).unwrap();

        copy.init("https://elsewhere.example/other.git").unwrap();

        let configured = copy.git().remote_url(REMOTE_NAME).unwrap();
        assert_eq!(configured.as_deref(), Some(remote.as_str()));
    }

    #[test]
    fn test_failed_clone_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("no-such-remote.git");
        let copy = WorkingCopy::new(temp.path().join("store"));

        let err = copy
            .init(missing.to_string_lossy().as_ref())
            .unwrap_err();
        assert!(matches!(err, SyncError::CloneFailed { .. }));
        assert!(!copy.is_initialized());
    }

    #[test]
    fn test_commit_works_without_preexisting_identity() {
        let temp = TempDir::new().unwrap();
        let copy = WorkingCopy::new(temp.path().join("repo"));
        std::fs::create_dir_all(copy.root()).unwrap();
        copy.git().run(&["init", "-q"]).unwrap();

        std::fs::write(copy.root().join("doc.md"), "content\n").unwrap();
        copy.git().run(&["add", "-A"]).unwrap();
        copy.commit("add doc").unwrap();

        assert!(copy.git().head_commit().unwrap().is_some());
    }
}
