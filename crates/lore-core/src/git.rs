//! Thin wrapper around the `git` binary
//!
//! Every repository operation in this crate goes through a synchronous
//! subprocess call. Commands run with the working copy as their current
//! directory; output is captured, never inherited.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Errors from running the `git` binary
#[derive(Debug, Error)]
pub enum GitError {
    /// The git binary could not be started at all
    #[error("failed to launch `git {command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// git ran and exited with a non-zero status
    #[error("`git {command}` exited with status {code}: {stderr}")]
    Exit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Direct filesystem access to repository state failed
    #[error("failed to touch repository state at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GitError {
    /// Trimmed stderr of a failed command, empty when no command ran
    pub fn stderr(&self) -> &str {
        match self {
            GitError::Exit { stderr, .. } => stderr,
            _ => "",
        }
    }
}

/// One line of `git status --porcelain` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Index (staged) status character
    pub index: char,
    /// Worktree (unstaged) status character
    pub worktree: char,
    /// Path relative to the repository root; for renames, the new path
    pub path: String,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.index == '?' && self.worktree == '?'
    }
}

/// Runner for git commands inside one working copy
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run a git command in the working copy and return trimmed stdout
    pub fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        run_command(cmd, args)
    }

    /// Run a git command, reporting only whether it exited zero
    ///
    /// A failure to launch the binary is still an error; a non-zero exit
    /// is `Ok(false)`.
    pub fn succeeds(&self, args: &[&str]) -> Result<bool, GitError> {
        match self.run(args) {
            Ok(_) => Ok(true),
            Err(GitError::Exit { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Clone `remote` into `target`
    ///
    /// Not bound to an existing working copy; the target directory may not
    /// exist yet.
    pub fn clone_repository(remote: &str, target: &Path) -> Result<(), GitError> {
        let target = target.to_string_lossy().into_owned();
        let args = ["clone", remote, target.as_str()];
        let mut cmd = Command::new("git");
        cmd.args(args);
        run_command(cmd, &args).map(|_| ())
    }

    /// Commit hash of HEAD, or `None` when the repository has no commit yet
    pub fn head_commit(&self) -> Result<Option<String>, GitError> {
        match self.run(&["rev-parse", "--verify", "--quiet", "HEAD"]) {
            Ok(hash) => Ok(Some(hash)),
            Err(GitError::Exit { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Name of the currently checked-out branch
    ///
    /// Works on a branch with no commits yet, which `rev-parse` does not.
    pub fn current_branch(&self) -> Result<String, GitError> {
        self.run(&["symbolic-ref", "--short", "HEAD"])
    }

    /// URL of a configured remote, or `None` when the remote is missing
    pub fn remote_url(&self, remote: &str) -> Result<Option<String>, GitError> {
        match self.run(&["remote", "get-url", remote]) {
            Ok(url) => Ok(Some(url)),
            Err(GitError::Exit { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Pending changes, staged and unstaged, untracked files included
    pub fn status(&self) -> Result<Vec<StatusEntry>, GitError> {
        // quotePath off so non-ASCII names arrive as raw bytes instead of
        // octal escapes; quotes, backslashes and control characters still
        // come through quoted and are unescaped by the parser
        let output = self.run(&["-c", "core.quotePath=false", "status", "--porcelain"])?;
        Ok(output.lines().filter_map(parse_status_line).collect())
    }

    /// Whether anything is staged for commit
    pub fn has_staged_changes(&self) -> Result<bool, GitError> {
        Ok(!self.succeeds(&["diff", "--cached", "--quiet"])?)
    }
}

/// Execute a prepared git command, logging and classifying the result
fn run_command(mut cmd: Command, args: &[&str]) -> Result<String, GitError> {
    let command = args.join(" ");
    // Background callers cannot answer credential prompts
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    debug!(command = %command, "running git");
    let output = cmd.output().map_err(|source| GitError::Launch {
        command: command.clone(),
        source,
    })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let code = output.status.code().unwrap_or(-1);
        debug!(command = %command, code, stderr = %stderr, "git command failed");
        Err(GitError::Exit {
            command,
            code,
            stderr,
        })
    }
}

/// Parse one `--porcelain` status line
///
/// Lines look like `XY path` or `XY old -> new` for renames. Git wraps a
/// path in double quotes and backslash-escapes it when it contains quotes,
/// backslashes or control characters; the escapes are undone here so the
/// returned path names the file as it exists on disk.
fn parse_status_line(line: &str) -> Option<StatusEntry> {
    if line.len() < 4 {
        return None;
    }
    let mut chars = line.chars();
    let index = chars.next()?;
    let worktree = chars.next()?;

    let mut path = &line[3..];
    if let Some(pos) = path.find(" -> ") {
        path = &path[pos + 4..];
    }

    Some(StatusEntry {
        index,
        worktree,
        path: unquote_path(path),
    })
}

/// Undo the C-style quoting git applies to unusual paths
///
/// `"caf\303\251.md"` comes back as `café.md`; unquoted input is returned
/// verbatim. Escape sequences follow git's own quoting: the single-letter
/// control escapes plus up to three octal digits per byte.
fn unquote_path(path: &str) -> String {
    let quoted = path
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'));
    let inner = match quoted {
        Some(inner) => inner.as_bytes(),
        None => return path.to_string(),
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        if inner[i] != b'\\' || i + 1 == inner.len() {
            bytes.push(inner[i]);
            i += 1;
            continue;
        }
        i += 1;
        match inner[i] {
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0c),
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'v' => bytes.push(0x0b),
            b'0'..=b'7' => {
                let mut value: u16 = 0;
                let mut digits = 0;
                while digits < 3 && matches!(inner.get(i), Some(b'0'..=b'7')) {
                    value = value * 8 + u16::from(inner[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                bytes.push(value as u8);
                continue;
            }
            other => bytes.push(other),
        }
        i += 1;
    }

    String::from_utf8_lossy(&bytes).into_owned()
}
