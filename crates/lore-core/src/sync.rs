//! Pull/push orchestration
//!
//! Every operation here follows the same shape: take the store lock, run
//! the recovery guard, do the work, release the lock on every path. A
//! combined sync holds the lock across both halves so no other local
//! process can interleave. Conditions worth retrying (busy lock, failed
//! pull, rejected push) come back as [`SyncOutcome`] values rather than
//! errors; a call that observed conflict markers anywhere never creates a
//! commit.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::git::{GitError, StatusEntry};
use crate::lock::{LockError, LockManager, ProcessProbe};
use crate::recover::RecoverOutcome;
use crate::repo::{WorkingCopy, REMOTE_NAME};

/// Which half (or both) of the cycle to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Pull,
    Push,
    Both,
}

impl SyncMode {
    fn pulls(self) -> bool {
        matches!(self, SyncMode::Pull | SyncMode::Both)
    }

    fn pushes(self) -> bool {
        matches!(self, SyncMode::Push | SyncMode::Both)
    }
}

/// Why the engine stepped aside instead of finishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferCause {
    /// Another live process holds the store lock
    LockBusy { holder: Option<u32> },
    /// Remote history could not be fetched and replayed
    PullFailed { detail: String },
    /// The remote refused or never received our history
    PushRejected { detail: String },
}

/// What a completed call actually did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Remote commits were applied to the working copy
    pub pulled: bool,
    /// Subject of the commit this call created, if any
    pub committed: Option<String>,
    /// Local history reached the remote
    pub pushed: bool,
}

impl SyncReport {
    fn changed(&self) -> bool {
        self.pulled || self.committed.is_some() || self.pushed
    }
}

/// Result contract of every orchestrator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote changes applied and/or local changes published
    Synced(SyncReport),
    /// Nothing to pull, nothing to publish
    UpToDate,
    /// A recoverable condition; safe to retry later
    Deferred(DeferCause),
    /// Conflict markers were found; the listed paths were reset and nothing
    /// was committed
    ConflictsDetected { reset: Vec<String> },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Synced(_) | SyncOutcome::UpToDate)
    }
}

/// Snapshot of engine state for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub configured: bool,
    pub data_dir: PathBuf,
    pub remote_url: Option<String>,
    pub branch: Option<String>,
    pub head: Option<String>,
    pub pending_changes: usize,
    pub lock_holder: Option<u32>,
}

/// Lock-guarded driver of the pull/push cycle
pub struct SyncEngine {
    config: Config,
    copy: WorkingCopy,
    lock: LockManager,
}

impl SyncEngine {
    pub fn new(config: Config) -> Self {
        let copy = WorkingCopy::new(&config.data_dir);
        let lock = LockManager::new(config.lock_path());
        Self { config, copy, lock }
    }

    /// Engine with a caller-supplied process liveness probe
    pub fn with_probe(config: Config, probe: Box<dyn ProcessProbe>) -> Self {
        let copy = WorkingCopy::new(&config.data_dir);
        let lock = LockManager::with_probe(config.lock_path(), probe);
        Self { config, copy, lock }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn working_copy(&self) -> &WorkingCopy {
        &self.copy
    }

    /// Whether sync operations can run at all
    ///
    /// True iff a remote URL is configured and the working copy has been
    /// initialized.
    pub fn is_configured(&self) -> bool {
        self.config.remote_url.is_some() && self.copy.is_initialized()
    }

    /// Clone or attach the working copy using the configured remote
    pub fn init(&self) -> SyncResult<()> {
        let remote = self
            .config
            .remote_url
            .as_deref()
            .ok_or(SyncError::ConfigurationMissing)?;
        self.copy.init(remote)
    }

    /// Run the recovery guard by itself, under the lock
    pub fn recover_repository(&self) -> SyncResult<RecoverOutcome> {
        self.require_configured()?;
        let guard = self.lock.acquire(self.config.lock_timeout())?;
        let outcome = self.copy.recover();
        guard.release();
        Ok(outcome?)
    }

    /// Fetch and replay remote history onto the working copy
    pub fn pull(&self) -> SyncResult<SyncOutcome> {
        self.run_cycle(SyncMode::Pull, None)
    }

    /// Commit all pending changes with `message` and publish them
    pub fn push(&self, message: &str) -> SyncResult<SyncOutcome> {
        self.run_cycle(SyncMode::Push, Some(message))
    }

    /// Run the requested halves of the cycle under one lock acquisition
    ///
    /// A combined sync generates its own commit message from the staged
    /// change counts.
    pub fn sync(&self, mode: SyncMode) -> SyncResult<SyncOutcome> {
        self.run_cycle(mode, None)
    }

    /// Current engine state for status displays
    pub fn status(&self) -> SyncResult<EngineStatus> {
        let configured = self.is_configured();
        let (branch, head, pending_changes) = if self.copy.is_initialized() {
            (
                Some(self.copy.current_branch()?),
                self.copy.git().head_commit()?,
                self.copy.git().status()?.len(),
            )
        } else {
            (None, None, 0)
        };

        Ok(EngineStatus {
            configured,
            data_dir: self.config.data_dir.clone(),
            remote_url: self.config.remote_url.clone(),
            branch,
            head,
            pending_changes,
            lock_holder: self.lock.holder_pid(),
        })
    }

    fn require_configured(&self) -> SyncResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(SyncError::ConfigurationMissing)
        }
    }

    fn run_cycle(&self, mode: SyncMode, message: Option<&str>) -> SyncResult<SyncOutcome> {
        self.require_configured()?;

        let guard = match self.lock.acquire(self.config.lock_timeout()) {
            Ok(guard) => guard,
            Err(LockError::Timeout { holder }) => {
                // A busy lock is a skip, not a crash; callers retry later
                return Ok(SyncOutcome::Deferred(DeferCause::LockBusy { holder }));
            }
            Err(err) => return Err(err.into()),
        };

        let result = self.locked_cycle(mode, message);
        guard.release();
        result
    }

    /// The cycle body; the caller holds the lock for the whole call
    fn locked_cycle(&self, mode: SyncMode, message: Option<&str>) -> SyncResult<SyncOutcome> {
        let git = self.copy.git();
        let mut report = SyncReport::default();
        let mut reset_paths: Vec<String> = Vec::new();
        let mut deferred: Option<DeferCause> = None;

        if let RecoverOutcome::ConflictsDetected { reset } = self.copy.recover()? {
            reset_paths.extend(reset);
        }

        // Resolved only after recovery: an interrupted rebase parks HEAD in
        // a detached state until the guard aborts it
        let branch = self.copy.current_branch()?;

        if mode.pulls() {
            let before = git.head_commit()?;
            match git.run(&["pull", "--rebase", "--autostash", REMOTE_NAME, &branch]) {
                Ok(_) => {
                    report.pulled = git.head_commit()? != before;
                    if report.pulled {
                        info!(branch = %branch, "applied remote changes");
                    }
                }
                Err(GitError::Exit { stderr, .. }) => {
                    warn!(detail = %stderr, "pull failed, leaving a clean tree and moving on");
                    // The guard clears any rebase state the failed pull left
                    if let RecoverOutcome::ConflictsDetected { reset } = self.copy.recover()? {
                        reset_paths.extend(reset);
                    }
                    deferred = Some(DeferCause::PullFailed { detail: stderr });
                }
                Err(err) => return Err(err.into()),
            }
        }

        if mode.pushes() && reset_paths.is_empty() {
            git.run(&["add", "-A"])?;
            if git.has_staged_changes()? {
                // The single non-negotiable gate: even a pull that reported
                // success can leave markers behind (an autostash replay that
                // conflicts still exits zero)
                if let RecoverOutcome::ConflictsDetected { reset } = self.copy.recover()? {
                    reset_paths.extend(reset);
                }

                if reset_paths.is_empty() {
                    let staged = git.status()?;
                    let message = match message {
                        Some(message) => message.to_string(),
                        None => commit_summary(&staged),
                    };
                    self.copy.commit(&message)?;
                    debug!(subject = %message, "created commit");
                    report.committed = Some(message);

                    match git.run(&["push", "-q", REMOTE_NAME, &branch]) {
                        Ok(_) => {
                            report.pushed = true;
                            info!(branch = %branch, "published local changes");
                        }
                        Err(GitError::Exit { stderr, .. }) => {
                            warn!(
                                detail = %stderr,
                                "push rejected, keeping the commit for a later retry"
                            );
                            deferred = Some(DeferCause::PushRejected { detail: stderr });
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            } else {
                debug!("nothing to publish");
            }
        }

        if !reset_paths.is_empty() {
            return Ok(SyncOutcome::ConflictsDetected { reset: reset_paths });
        }
        match deferred {
            // A successful publish outweighs an earlier pull failure
            Some(DeferCause::PullFailed { .. }) if report.pushed => {
                Ok(SyncOutcome::Synced(report))
            }
            Some(cause) => Ok(SyncOutcome::Deferred(cause)),
            None if report.changed() => Ok(SyncOutcome::Synced(report)),
            None => Ok(SyncOutcome::UpToDate),
        }
    }
}

/// Commit subject generated from staged change counts
fn commit_summary(staged: &[StatusEntry]) -> String {
    let mut added = 0;
    let mut modified = 0;
    let mut deleted = 0;
    for entry in staged {
        match entry.index {
            'A' => added += 1,
            'M' | 'R' | 'C' | 'T' => modified += 1,
            'D' => deleted += 1,
            _ => {}
        }
    }

    let mut parts = Vec::new();
    if added > 0 {
        parts.push(format!("+{added}"));
    }
    if modified > 0 {
        parts.push(format!("~{modified}"));
    }
    if deleted > 0 {
        parts.push(format!("-{deleted}"));
    }

    if parts.is_empty() {
        "lore: update".to_string()
    } else {
        format!("lore: {}", parts.join(" "))
    }
}
