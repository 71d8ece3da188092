//! Abstract storage contract for deployment records.
//!
//! The simulation engine only needs `create` and `update`; `get` and `list`
//! exist for callers that want to read records back. Backends decide how
//! records are persisted.

use thiserror::Error;

use crate::deployment::{DeploymentDescriptor, DeploymentId, DeploymentRecord, RecordUpdate};

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record not found.
    #[error("Deployment not found: {0}")]
    NotFound(DeploymentId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Storage trait for deployment records.
///
/// # Safety Considerations
/// - All mutations should be atomic where possible
/// - Implementations should handle concurrent access safely
pub trait DeploymentRecordSink: Send + Sync {
    /// Create a new record in the `in-progress` status.
    fn create(&self, descriptor: &DeploymentDescriptor) -> Result<DeploymentRecord, StorageError>;

    /// Merge `update` into an existing record. Returns `NotFound` if absent.
    fn update(&self, id: &DeploymentId, update: RecordUpdate) -> Result<DeploymentRecord, StorageError>;

    /// Get a record by ID.
    fn get(&self, id: &DeploymentId) -> Result<Option<DeploymentRecord>, StorageError>;

    /// List all records, newest first.
    fn list(&self) -> Result<Vec<DeploymentRecord>, StorageError>;
}
