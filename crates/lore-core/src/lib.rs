//! Lore Core Library
//!
//! This crate provides the core functionality for Lore, a shared knowledge
//! store kept consistent across processes and machines through an ordinary
//! git remote.
//!
//! # Architecture
//!
//! Multiple independent local processes read and write markdown documents
//! in one working copy. A directory-marker lock with liveness-based
//! staleness recovery serializes the writers; a recovery guard aborts
//! interrupted merges/rebases and refuses to commit conflict-marked
//! content; the sync engine drives the pull/commit/push cycle under that
//! lock through synchronous `git` subprocess calls.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let engine = SyncEngine::new(config.clone());
//! engine.init()?;
//!
//! let store = ProjectStore::new(&config.data_dir);
//! store.write_document("alpha", "skills", "parsing", "# Parsing\n")?;
//!
//! engine.sync(SyncMode::Both)?;
//! ```
//!
//! # Modules
//!
//! - `sync`: Lock-guarded pull/push orchestration (main entry point)
//! - `store`: Path-safe per-project document storage
//! - `document`: Front matter and body model for documents
//! - `lock`: Directory-marker mutual exclusion with stale-lock recovery
//! - `repo`: Working copy bootstrap
//! - `recover`: Interrupted-operation repair and conflict-marker reset
//! - `git`: Subprocess wrapper around the `git` binary
//! - `config`: Application configuration

pub mod config;
pub mod document;
pub mod error;
pub mod git;
pub mod lock;
pub mod recover;
pub mod repo;
pub mod store;
pub mod sync;

pub use config::Config;
pub use document::{Document, DocumentError, FrontMatter};
pub use error::{SyncError, SyncResult};
pub use git::{Git, GitError};
pub use lock::{LockError, LockGuard, LockManager, ProcessProbe, SystemProcessProbe};
pub use recover::RecoverOutcome;
pub use repo::WorkingCopy;
pub use store::{ProjectStore, StoreError, StoreResult};
pub use sync::{DeferCause, EngineStatus, SyncEngine, SyncMode, SyncOutcome, SyncReport};
