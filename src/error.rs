//! Error types for deploysim.
//!
//! All errors are strongly typed using thiserror so callers can pattern
//! match on the condition instead of parsing messages. A probabilistic step
//! failure is *not* an error: it is a normal terminal outcome recorded on the
//! simulation state.

use thiserror::Error;

use crate::deployment::DeploymentId;
use crate::storage::StorageError;

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("{field} '{value}' is not offered by template '{template}'")]
    NotInTemplate {
        field: String,
        value: String,
        template: String,
    },

    #[error("Step catalog must contain at least one step")]
    EmptyCatalog,

    #[error("Step name at position {index} cannot be empty")]
    EmptyStepName {
        index: usize,
    },

    #[error("Success probability {value} for step '{step}' is out of range [0, 100]")]
    ProbabilityOutOfRange {
        step: String,
        value: u8,
    },

    #[error("Time scale {value} must be finite and non-negative")]
    InvalidTimeScale {
        value: f64,
    },
}

/// Execution errors that occur while driving or querying simulations.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Simulation not found: {id}")]
    SimulationNotFound {
        id: String,
    },

    #[error("Simulation already registered: {id}")]
    DuplicateSimulation {
        id: DeploymentId,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
    },
}

/// Top-level error type for deploysim.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl SimError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a not-found error for the given simulation id.
    #[must_use]
    pub fn not_found(id: impl ToString) -> Self {
        Self::Execution(ExecutionError::SimulationNotFound { id: id.to_string() })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if the referenced simulation is unknown.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::SimulationNotFound { .. }))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

impl From<StorageError> for SimError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => Self::not_found(id),
            other => Self::Execution(ExecutionError::Storage {
                message: other.to_string(),
            }),
        }
    }
}

/// Result type alias for deploysim operations.
pub type SimResult<T> = Result<T, SimError>;
