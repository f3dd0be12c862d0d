//! Per-project document storage
//!
//! Documents live inside the working copy as plain markdown files:
//! `projects/<project>/<category>/<name>.md`. All name components coming
//! from callers are sanitized before they touch the filesystem, and writes
//! go through an atomic temp-file-then-rename so a crash never leaves a
//! half-written document.
//!
//! These operations deliberately do not take the store lock; see the
//! concurrency notes on [`crate::sync::SyncEngine`].

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Categories every project starts with
pub const STANDARD_CATEGORIES: &[&str] = &["skills", "context"];

/// Errors that can occur during document storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// A caller-supplied name component is unusable as a path segment
    #[error("invalid name '{input}': {reason}")]
    InvalidName { input: String, reason: &'static str },

    /// The target or one of its parents is a symlink
    #[error("refusing to operate through symlink at '{path}'")]
    SymlinkRefused { path: PathBuf },

    /// Failed to create a directory
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read a document
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write a document
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Atomic write failed during rename
    #[error("Atomic write failed: could not rename '{from}' to '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                path,
                source: error,
            },
            _ if is_disk_full_error(&error) => StoreError::DiskFull {
                path,
                source: error,
            },
            _ => StoreError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Check if this error is recoverable by the operator
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::DiskFull { .. } | StoreError::PermissionDenied { .. }
        )
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Filesystem-backed document store rooted at the working copy
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    /// Store over the working copy at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding all projects
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// Create a project directory with the standard category skeleton
    ///
    /// Safe to call repeatedly; existing directories are left alone.
    pub fn ensure_project(&self, project: &str) -> StoreResult<PathBuf> {
        let project_dir = self.projects_dir().join(sanitize_component(project)?);
        reject_symlink(&project_dir)?;

        for category in STANDARD_CATEGORIES {
            let dir = project_dir.join(category);
            reject_symlink(&dir)?;
            fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(project_dir)
    }

    /// Absolute path a document would occupy, with all components sanitized
    ///
    /// Document names get a `.md` extension when they don't already carry
    /// one.
    pub fn document_path(&self, project: &str, category: &str, name: &str) -> StoreResult<PathBuf> {
        let file_name = normalize_document_name(name)?;
        Ok(self
            .projects_dir()
            .join(sanitize_component(project)?)
            .join(sanitize_component(category)?)
            .join(file_name))
    }

    /// Write a document, creating the project and category on demand
    ///
    /// Returns the path the document landed at.
    pub fn write_document(
        &self,
        project: &str,
        category: &str,
        name: &str,
        content: &str,
    ) -> StoreResult<PathBuf> {
        let path = self.document_path(project, category, name)?;
        self.refuse_symlinked_lineage(&path)?;

        // Parent is always present after document_path succeeded
        if let Some(category_dir) = path.parent() {
            fs::create_dir_all(category_dir).map_err(|source| StoreError::CreateDirectory {
                path: category_dir.to_path_buf(),
                source,
            })?;
        }

        atomic_write(&path, content.as_bytes())?;
        debug!(path = %path.display(), bytes = content.len(), "document written");
        Ok(path)
    }

    /// Read a document's raw content
    ///
    /// Returns `None` if the document doesn't exist.
    pub fn read_document(
        &self,
        project: &str,
        category: &str,
        name: &str,
    ) -> StoreResult<Option<String>> {
        let path = self.document_path(project, category, name)?;
        self.refuse_symlinked_lineage(&path)?;

        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::ReadError { path, source }),
        }
    }

    /// Delete a document, reporting whether it existed
    pub fn remove_document(&self, project: &str, category: &str, name: &str) -> StoreResult<bool> {
        let path = self.document_path(project, category, name)?;
        self.refuse_symlinked_lineage(&path)?;

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "document removed");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::WriteError { path, source }),
        }
    }

    /// Sorted document names (without extension) in a project category
    ///
    /// A category that doesn't exist yet lists as empty.
    pub fn list_documents(&self, project: &str, category: &str) -> StoreResult<Vec<String>> {
        let dir = self
            .projects_dir()
            .join(sanitize_component(project)?)
            .join(sanitize_component(category)?);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::ReadError { path: dir, source }),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::ReadError {
                path: dir.clone(),
                source,
            })?;
            let file_type = entry.file_type().map_err(|source| StoreError::ReadError {
                path: entry.path(),
                source,
            })?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".md") {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Sorted names of all projects in the store
    pub fn list_projects(&self) -> StoreResult<Vec<String>> {
        let dir = self.projects_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::ReadError { path: dir, source }),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::ReadError {
                path: dir.clone(),
                source,
            })?;
            let file_type = entry.file_type().map_err(|source| StoreError::ReadError {
                path: entry.path(),
                source,
            })?;
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Refuse to touch a path when it, or any ancestor inside the store,
    /// is a symlink
    fn refuse_symlinked_lineage(&self, path: &Path) -> StoreResult<()> {
        let mut current = path.to_path_buf();
        loop {
            reject_symlink(&current)?;
            match current.parent() {
                Some(parent) if parent.starts_with(&self.root) && parent != self.root => {
                    current = parent.to_path_buf();
                }
                _ => return Ok(()),
            }
        }
    }
}

/// Error when `path` exists and is a symlink; absent paths pass
fn reject_symlink(path: &Path) -> StoreResult<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Err(StoreError::SymlinkRefused {
            path: path.to_path_buf(),
        }),
        _ => Ok(()),
    }
}

/// Validate a caller-supplied path component
///
/// Separators, parent references, hidden names, and control characters are
/// rejected rather than repaired so the caller learns the name it asked
/// for is not the name that would be stored.
fn sanitize_component(input: &str) -> StoreResult<&str> {
    let trimmed = input.trim();
    let invalid = |reason| StoreError::InvalidName {
        input: input.to_string(),
        reason,
    };

    if trimmed.is_empty() {
        return Err(invalid("name is empty"));
    }
    if trimmed.contains("..") {
        return Err(invalid("parent directory references are not allowed"));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(invalid("path separators are not allowed"));
    }
    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(invalid("control characters are not allowed"));
    }
    if trimmed.starts_with('.') {
        return Err(invalid("names may not start with a dot"));
    }

    Ok(trimmed)
}

/// Sanitize a document name and normalize its extension
fn normalize_document_name(name: &str) -> StoreResult<String> {
    let base = sanitize_component(name)?;
    if base.ends_with(".md") {
        Ok(base.to_string())
    } else {
        Ok(format!("{base}.md"))
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // Temp file in the same directory so the rename stays on one filesystem
    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)
        .map_err(|source| StoreError::from_io(source, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|source| StoreError::from_io(source, temp_path.clone()))?;

    // Sync to disk before rename
    file.sync_all()
        .map_err(|source| StoreError::from_io(source, temp_path.clone()))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|source| StoreError::AtomicWriteFailed {
        from: temp_path,
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> ProjectStore {
        ProjectStore::new(temp.path())
    }

    #[test]
    fn test_ensure_project_creates_skeleton() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let dir = store.ensure_project("alpha").unwrap();
        assert!(dir.join("skills").is_dir());
        assert!(dir.join("context").is_dir());

        // Idempotent
        store.ensure_project("alpha").unwrap();
    }

    #[test]
    fn test_write_and_read_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let path = store
            .write_document("alpha", "skills", "parsing", "content\n")
            .unwrap();
        assert!(path.ends_with("projects/alpha/skills/parsing.md"));

        let content = store.read_document("alpha", "skills", "parsing").unwrap();
        assert_eq!(content.as_deref(), Some("content\n"));
    }

    #[test]
    fn test_read_missing_document_is_none() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        assert!(store
            .read_document("alpha", "skills", "ghost")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_extension_is_normalized_not_doubled() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let with_ext = store.document_path("p", "skills", "notes.md").unwrap();
        let without = store.document_path("p", "skills", "notes").unwrap();
        assert_eq!(with_ext, without);
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        for bad in ["", "   ", "a/b", "a\\b", "..", "../etc", ".hidden"] {
            let err = store.document_path(bad, "skills", "x").unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidName { .. }),
                "expected rejection for {bad:?}"
            );
        }

        assert!(store.document_path("p", "skills", "../../escape").is_err());
    }

    #[test]
    fn test_control_characters_are_rejected() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        // An embedded newline or tab would corrupt any line-oriented
        // listing of the store's paths
        for bad in ["a\nb", "a\tb", "a\rb", "nu\0ll", "bell\u{7}"] {
            let err = store.document_path("p", "skills", bad).unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidName { .. }),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn test_names_may_contain_spaces() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store
            .write_document("alpha", "context", "meeting notes", "x\n")
            .unwrap();
        assert_eq!(
            store.list_documents("alpha", "context").unwrap(),
            vec!["meeting notes"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_category_is_refused() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.ensure_project("alpha").unwrap();

        let outside = TempDir::new().unwrap();
        let link = temp.path().join("projects/alpha/leaked");
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();

        let err = store
            .write_document("alpha", "leaked", "doc", "x\n")
            .unwrap_err();
        assert!(matches!(err, StoreError::SymlinkRefused { .. }));

        let err = store.read_document("alpha", "leaked", "doc").unwrap_err();
        assert!(matches!(err, StoreError::SymlinkRefused { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_document_is_refused() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.ensure_project("alpha").unwrap();

        let target = temp.path().join("projects/alpha/skills/real.md");
        std::fs::write(&target, "real\n").unwrap();
        let link = temp.path().join("projects/alpha/skills/alias.md");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let err = store
            .write_document("alpha", "skills", "alias", "x\n")
            .unwrap_err();
        assert!(matches!(err, StoreError::SymlinkRefused { .. }));
    }

    #[test]
    fn test_list_documents_sorted_and_missing_category_empty() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store.write_document("alpha", "skills", "zeta", "z\n").unwrap();
        store.write_document("alpha", "skills", "alpha", "a\n").unwrap();

        assert_eq!(
            store.list_documents("alpha", "skills").unwrap(),
            vec!["alpha", "zeta"]
        );
        assert!(store.list_documents("alpha", "missing").unwrap().is_empty());
    }

    #[test]
    fn test_list_projects_skips_files_and_hidden_entries() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store.ensure_project("beta").unwrap();
        store.ensure_project("alpha").unwrap();
        std::fs::write(temp.path().join("projects/README.md"), "not a project\n").unwrap();
        std::fs::create_dir(temp.path().join("projects/.cache")).unwrap();

        assert_eq!(store.list_projects().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_remove_document_reports_existence() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store.write_document("alpha", "skills", "gone", "x\n").unwrap();
        assert!(store.remove_document("alpha", "skills", "gone").unwrap());
        assert!(!store.remove_document("alpha", "skills", "gone").unwrap());
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store.write_document("alpha", "skills", "doc", "x\n").unwrap();

        let category = temp.path().join("projects/alpha/skills");
        let leftovers: Vec<_> = std::fs::read_dir(category)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|ext| ext == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }
}
