//! Deployment record storage.
//!
//! The record store is an external collaborator of the simulation engine.
//! This module defines its contract and an in-memory backend.

mod memory;
mod traits;

pub use memory::InMemoryDeploymentStore;
pub use traits::{DeploymentRecordSink, StorageError};
