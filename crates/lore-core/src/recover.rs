//! Repair of interrupted version-control state
//!
//! A writer can die mid-merge or mid-rebase, leaving the working copy in a
//! state where every later operation fails. Recovery aborts whatever was in
//! flight, then hunts for conflict markers in pending changes and resets
//! any file carrying them back to its last committed content. Losing the
//! marked-up local edit is the accepted cost of keeping the store clean for
//! every other process.

use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::git::{Git, GitError};

/// Result of a recovery pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverOutcome {
    /// Nothing was wrong, or only an interrupted operation was aborted
    Clean,
    /// Conflict markers were found; the listed paths were reset
    ConflictsDetected { reset: Vec<String> },
}

impl RecoverOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, RecoverOutcome::Clean)
    }
}

/// Bring the working copy back to an operable state
///
/// Idempotent and safe to call speculatively; a healthy repository comes
/// back as [`RecoverOutcome::Clean`] with nothing touched.
pub fn recover(git: &Git) -> Result<RecoverOutcome, GitError> {
    abort_interrupted_operations(git)?;

    let conflicted = find_marker_paths(git)?;
    if conflicted.is_empty() {
        return Ok(RecoverOutcome::Clean);
    }

    for path in &conflicted {
        reset_path(git, path)?;
    }
    warn!(
        count = conflicted.len(),
        paths = ?conflicted,
        "conflict markers found, affected paths reset to last committed state"
    );
    Ok(RecoverOutcome::ConflictsDetected { reset: conflicted })
}

/// Paths with pending changes whose on-disk content carries conflict markers
pub fn find_marker_paths(git: &Git) -> Result<Vec<String>, GitError> {
    let mut paths = Vec::new();
    for entry in git.status()? {
        let full = git.workdir().join(&entry.path);
        // Deletions show up in status but have nothing on disk to scan;
        // binary content is not marker territory either
        let content = match fs::read_to_string(&full) {
            Ok(content) => content,
            Err(_) => continue,
        };
        if content_has_markers(&content) {
            paths.push(entry.path);
        }
    }
    Ok(paths)
}

/// Whether any line starts with a conflict marker
///
/// Only `<<<<<<<` and `>>>>>>>` count. A bare `=======` line is a markdown
/// setext underline far more often than it is a divider between conflict
/// hunks, and on its own proves nothing.
pub(crate) fn content_has_markers(content: &str) -> bool {
    content
        .lines()
        .any(|line| line.starts_with("<<<<<<<") || line.starts_with(">>>>>>>"))
}

/// Abort an interrupted merge or rebase, falling back to removing the
/// state files directly when git refuses
fn abort_interrupted_operations(git: &Git) -> Result<(), GitError> {
    let git_dir = resolve_git_dir(git)?;

    if git_dir.join("MERGE_HEAD").exists() {
        info!("aborting interrupted merge");
        if !git.succeeds(&["merge", "--abort"])? {
            warn!("merge --abort refused, removing merge state directly");
            for name in ["MERGE_HEAD", "MERGE_MSG", "MERGE_MODE"] {
                remove_state_file(git_dir.join(name))?;
            }
        }
    }

    let rebase_dirs = ["rebase-merge", "rebase-apply"];
    if rebase_dirs.iter().any(|dir| git_dir.join(dir).exists()) {
        info!("aborting interrupted rebase");
        if !git.succeeds(&["rebase", "--abort"])? {
            warn!("rebase --abort refused, removing rebase state directly");
            for dir in rebase_dirs {
                remove_state_dir(git_dir.join(dir))?;
            }
        }
    }

    Ok(())
}

/// Put a single path back to its last committed content
///
/// A path that never made it into a commit has no committed content to
/// restore; it is unstaged and deleted instead.
fn reset_path(git: &Git, path: &str) -> Result<(), GitError> {
    if git.succeeds(&["checkout", "HEAD", "--", path])? {
        return Ok(());
    }

    git.succeeds(&["rm", "-f", "--cached", "--ignore-unmatch", "--", path])?;
    let full = git.workdir().join(path);
    match fs::remove_file(&full) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(GitError::Io { path: full, source }),
    }
}

/// Location of the repository metadata directory
///
/// Asked of git itself rather than assumed to be `.git`, which may be a
/// pointer file in linked worktrees.
fn resolve_git_dir(git: &Git) -> Result<PathBuf, GitError> {
    let out = git.run(&["rev-parse", "--git-dir"])?;
    let path = PathBuf::from(out);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(git.workdir().join(path))
    }
}

fn remove_state_file(path: PathBuf) -> Result<(), GitError> {
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(GitError::Io { path, source }),
    }
}

fn remove_state_dir(path: PathBuf) -> Result<(), GitError> {
    match fs::remove_dir_all(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(GitError::Io { path, source }),
    }
}
