//! # lsif-xrepo - Cross-repository code intelligence
//!
//! Answers definition, reference and hover queries against per-repository
//! LSIF storage files, following monikers into other repositories when the
//! answer lives elsewhere.
//!
//! lsif-xrepo provides:
//! - Position lookup over the ordered ranges of a document
//! - Result-set chain walking and moniker ordering
//! - A bounded, single-flight document cache
//! - A bounded pool of SQLite handles to storage files
//! - A per-repository query engine with cross-repository fallback

pub mod position;
pub mod document;
pub mod graph;
pub mod moniker;
pub mod metrics;
pub mod storage;
pub mod cache;
pub mod uri;
pub mod xrepo;
pub mod database;
pub mod config;

use std::sync::Arc;

// Re-exports for convenient access
pub use cache::DocumentStore;
pub use database::{Database, EngineContext, Hover, Location, ReferencesPage};
pub use document::Document;
pub use position::{Position, Range};
pub use storage::ConnectionPool;
pub use uri::{RemoteUri, StorageLayout};
pub use xrepo::{PageToken, XrepoIndex};

/// Result type alias for lsif-xrepo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for lsif-xrepo operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Failed to decode document {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("Cross-repository index error: {0}")]
    Xrepo(String),

    #[error("Background task failed: {0}")]
    Task(String),

    /// A failure observed by every waiter of one shared load.
    #[error(transparent)]
    Shared(Arc<Error>),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}
