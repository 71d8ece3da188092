//! Registry of simulations by identifier.
//!
//! Created once alongside the engine. Entries are inserted on start and are
//! never removed: finished simulations stay queryable for the life of the
//! process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::deployment::DeploymentId;
use crate::error::{ExecutionError, SimError, SimResult};

use super::state::{SimulationState, SimulationStatus};

fn lock_err(context: &'static str) -> SimError {
    SimError::internal(format!("poisoned lock: {context}"))
}

/// Concurrency-safe mapping from simulation id to its state.
#[derive(Debug, Default)]
pub struct SimulationRegistry {
    entries: RwLock<HashMap<DeploymentId, Arc<SimulationState>>>,
}

impl SimulationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `state` under its id.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateSimulation` if the id is already registered.
    pub fn insert(&self, state: Arc<SimulationState>) -> SimResult<()> {
        let mut entries = self.entries.write().map_err(|_| lock_err("registry.insert"))?;
        if entries.contains_key(state.id()) {
            return Err(ExecutionError::DuplicateSimulation {
                id: state.id().clone(),
            }
            .into());
        }
        entries.insert(state.id().clone(), state);
        Ok(())
    }

    /// Looks up a simulation.
    ///
    /// # Errors
    ///
    /// Returns `SimulationNotFound` for an unknown id.
    pub fn get(&self, id: &DeploymentId) -> SimResult<Arc<SimulationState>> {
        let entries = self.entries.read().map_err(|_| lock_err("registry.get"))?;
        entries.get(id).cloned().ok_or_else(|| SimError::not_found(id))
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &DeploymentId) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(id))
            .unwrap_or(false)
    }

    /// Number of registered simulations, terminal ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns true if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of simulations still running.
    #[must_use]
    pub fn running(&self) -> usize {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .values()
                    .filter(|s| s.status() == SimulationStatus::Running)
                    .count()
            })
            .unwrap_or(0)
    }

    /// All registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<DeploymentId> {
        let mut ids: Vec<_> = self
            .entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}
