//! Aggregate repository seam.
//!
//! The repository rehydrates aggregates by root id. How an aggregate is
//! persisted (event streams, snapshots) is the storage backend's
//! concern; this crate only consumes the load capability.

mod memory;

pub use memory::MemoryRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::aggregate::AggregateRoot;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by aggregate storage.
///
/// A missing aggregate is not an error; `load` reports it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend failed: {0}")]
    Backend(String),

    #[error("Stored aggregate {id} is corrupt: {message}")]
    Corrupt { id: Uuid, message: String },
}

/// Loads aggregates by root id.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Load the aggregate identified by `id`.
    ///
    /// Returns `Ok(None)` when no such aggregate exists. A backend
    /// failure is fatal to the command execution that triggered the
    /// load; it is propagated, never retried here.
    async fn load(&self, id: Uuid) -> Result<Option<Box<dyn AggregateRoot>>>;
}
