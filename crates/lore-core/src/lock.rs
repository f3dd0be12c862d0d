//! Store-wide mutual exclusion for local writers
//!
//! The lock is a marker directory created with exclusive semantics; the
//! holder's process id lives in a `pid` file inside it. Any process on the
//! machine can inspect the marker, decide whether the holder is still
//! alive, and break the lock when it is not. Liveness checking sits behind
//! [`ProcessProbe`] so tests can simulate dead holders.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Fixed sleep between acquisition attempts while the holder is alive
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Attempts per acquisition pass before backing off to the poll sleep
const CLEANUP_RETRIES: u32 = 3;

/// Errors from lock acquisition and release
#[derive(Debug, Error)]
pub enum LockError {
    /// The holder stayed alive for the whole timeout window
    #[error("timed out waiting for the store lock")]
    Timeout { holder: Option<u32> },

    /// Filesystem bookkeeping around the marker failed
    #[error("lock bookkeeping failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Capability to ask whether a process id belongs to a live process
pub trait ProcessProbe: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probe backed by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessProbe;

impl ProcessProbe for SystemProcessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        is_process_alive(pid)
    }
}

/// Acquires and releases the store lock marker
pub struct LockManager {
    path: PathBuf,
    probe: Box<dyn ProcessProbe>,
}

impl LockManager {
    /// Manager for the marker at `path`, probing liveness via the OS
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_probe(path, Box::new(SystemProcessProbe))
    }

    /// Manager with a caller-supplied liveness probe
    pub fn with_probe(path: impl Into<PathBuf>, probe: Box<dyn ProcessProbe>) -> Self {
        Self {
            path: path.into(),
            probe,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the lock, waiting up to `timeout` for a live holder to let go
    ///
    /// A marker whose holder is provably dead is broken immediately, no
    /// matter how recently it was created. The first attempt always runs,
    /// so a zero timeout still succeeds on an uncontended lock.
    pub fn acquire(&self, timeout: Duration) -> Result<LockGuard, LockError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(guard) = self.try_acquire(0)? {
                debug!(path = %self.path.display(), "store lock acquired");
                return Ok(guard);
            }

            if Instant::now() >= deadline {
                let holder = self.holder_pid();
                warn!(
                    path = %self.path.display(),
                    holder = ?holder,
                    "timed out waiting for the store lock"
                );
                return Err(LockError::Timeout { holder });
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Remove the marker unconditionally
    ///
    /// Safe to call when no lock exists; releasing twice is not an error.
    pub fn release(&self) -> Result<(), LockError> {
        remove_marker(&self.path)
    }

    /// Process id recorded in the current marker, if one can be read
    pub fn holder_pid(&self) -> Option<u32> {
        let content = fs::read_to_string(self.path.join("pid")).ok()?;
        content.trim().parse().ok()
    }

    /// One acquisition pass: create the marker or deal with an existing one
    ///
    /// `Ok(None)` means the lock is legitimately held by a live process and
    /// the caller should wait.
    fn try_acquire(&self, attempt: u32) -> Result<Option<LockGuard>, LockError> {
        if attempt >= CLEANUP_RETRIES {
            // Lost the post-cleanup race repeatedly; let the outer loop wait
            return Ok(None);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        match fs::create_dir(&self.path) {
            Ok(()) => self.write_pid().map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                self.inspect_existing(attempt)
            }
            Err(source) => Err(LockError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Record our pid inside a marker we just created
    fn write_pid(&self) -> Result<LockGuard, LockError> {
        let pid = std::process::id();
        let pid_path = self.path.join("pid");
        if let Err(source) = fs::write(&pid_path, format!("{pid}\n")) {
            // Do not leave an anonymous marker behind
            let _ = fs::remove_dir_all(&self.path);
            return Err(LockError::Io {
                path: pid_path,
                source,
            });
        }
        Ok(LockGuard {
            path: self.path.clone(),
            released: false,
        })
    }

    /// Decide whether an existing marker is live, stale, or unreadable
    fn inspect_existing(&self, attempt: u32) -> Result<Option<LockGuard>, LockError> {
        let pid_path = self.path.join("pid");
        let mut content = fs::read_to_string(&pid_path);
        if matches!(&content, Err(err) if err.kind() == std::io::ErrorKind::NotFound) {
            // The pid record lands one write after the marker itself; give
            // an in-flight acquire a moment to finish before calling the
            // marker abandoned
            std::thread::sleep(Duration::from_millis(10));
            content = fs::read_to_string(&pid_path);
        }

        match content {
            Ok(content) => {
                if let Ok(pid) = content.trim().parse::<u32>() {
                    if self.probe.is_alive(pid) {
                        return Ok(None);
                    }
                    warn!(pid, "breaking stale lock left by dead process");
                } else {
                    warn!(
                        path = %self.path.display(),
                        "lock marker has an unreadable pid record, treating as stale"
                    );
                }
                remove_marker(&self.path)?;
                self.try_acquire(attempt + 1)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // Marker without a pid record proves no holder; either the
                // holder died mid-acquire or the marker was just released
                remove_marker(&self.path)?;
                self.try_acquire(attempt + 1)
            }
            Err(source) => Err(LockError::Io {
                path: pid_path,
                source,
            }),
        }
    }
}

/// RAII handle to a held lock
///
/// Dropping the guard removes the marker, on every exit path including
/// unwinding. [`LockGuard::release`] is the explicit form.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    /// Release now instead of at end of scope
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(err) = remove_marker(&self.path) {
                warn!(path = %self.path.display(), error = %err, "failed to remove lock marker");
            } else {
                debug!(path = %self.path.display(), "store lock released");
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Remove a marker directory, tolerating its absence
fn remove_marker(path: &Path) -> Result<(), LockError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LockError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Check if a process with the given PID is still alive.
///
/// On Linux, reads /proc/{pid}/stat; zombies keep a /proc entry, so the
/// stat file is the reliable signal. On other Unix systems, asks `kill -0`.
/// Where liveness cannot be determined the holder is treated as alive and
/// the lock is never broken.
#[cfg(target_os = "linux")]
fn is_process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}/stat", pid)).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}
