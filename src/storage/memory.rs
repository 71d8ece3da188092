//! In-memory deployment record store.
//!
//! Thread-safe reference implementation of [`DeploymentRecordSink`], intended
//! for embedded usage, the CLI and tests. Data is lost when the process exits.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::deployment::{DeploymentDescriptor, DeploymentId, DeploymentRecord, RecordUpdate};
use crate::storage::traits::{DeploymentRecordSink, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct RecordState {
    by_id: HashMap<DeploymentId, DeploymentRecord>,
    // Number of updates that carried a terminal status, per record.
    terminal_updates: HashMap<DeploymentId, usize>,
}

/// In-memory deployment record store.
#[derive(Debug, Default)]
pub struct InMemoryDeploymentStore {
    state: RwLock<RecordState>,
}

impl InMemoryDeploymentStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record, e.g. for seeding.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if a record with the same id exists.
    pub fn insert(&self, record: DeploymentRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("records.insert"))?;
        if state.by_id.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey(record.id.to_string()));
        }
        state.by_id.insert(record.id.clone(), record);
        Ok(())
    }

    /// How many terminal updates `id` has received.
    ///
    /// # Errors
    ///
    /// Returns `Backend` if the lock is poisoned.
    pub fn terminal_updates(&self, id: &DeploymentId) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("records.terminal_updates"))?;
        Ok(state.terminal_updates.get(id).copied().unwrap_or(0))
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns `Backend` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("records.len"))?;
        Ok(state.by_id.len())
    }

    /// Returns true if no records are stored.
    ///
    /// # Errors
    ///
    /// Returns `Backend` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl DeploymentRecordSink for InMemoryDeploymentStore {
    fn create(&self, descriptor: &DeploymentDescriptor) -> Result<DeploymentRecord, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("records.create"))?;

        let mut id = DeploymentId::generate();
        while state.by_id.contains_key(&id) {
            id = DeploymentId::generate();
        }

        let record = DeploymentRecord::in_progress(id.clone(), descriptor, Utc::now());
        state.by_id.insert(id, record.clone());
        Ok(record)
    }

    fn update(&self, id: &DeploymentId, update: RecordUpdate) -> Result<DeploymentRecord, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("records.update"))?;

        let record = state
            .by_id
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;
        record.apply(&update);
        let updated = record.clone();

        if update.is_terminal() {
            *state.terminal_updates.entry(id.clone()).or_insert(0) += 1;
        }
        Ok(updated)
    }

    fn get(&self, id: &DeploymentId) -> Result<Option<DeploymentRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("records.get"))?;
        Ok(state.by_id.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<DeploymentRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("records.list"))?;
        let mut out: Vec<_> = state.by_id.values().cloned().collect();
        out.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }
}
