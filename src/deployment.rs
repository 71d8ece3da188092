//! Deployment records as seen by the external record store.
//!
//! The engine references these records but does not own their storage; it
//! creates one when a simulation starts and applies exactly one terminal
//! update when the simulation ends.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default `deployedBy` value for simulator-created deployments.
pub const DEFAULT_DEPLOYED_BY: &str = "simulator";

/// Identifier shared by a deployment record and its simulation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DeploymentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeploymentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// What to deploy, where, and on whose behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDescriptor {
    /// Service being deployed.
    pub service_name: String,
    /// Version label.
    pub version: String,
    /// Target environment name.
    pub environment: String,
    /// Actor requesting the deployment.
    #[serde(default)]
    pub deployed_by: Option<String>,
}

impl DeploymentDescriptor {
    /// Creates a descriptor without a `deployedBy` actor.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        version: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            version: version.into(),
            environment: environment.into(),
            deployed_by: None,
        }
    }

    /// Sets the actor requesting the deployment.
    #[must_use]
    pub fn deployed_by(mut self, actor: impl Into<String>) -> Self {
        self.deployed_by = Some(actor.into());
        self
    }

    /// Checks that the required fields are present.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` naming the first blank field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("serviceName", &self.service_name),
            ("version", &self.version),
            ("environment", &self.environment),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Lifecycle status of a deployment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStatus {
    /// Simulation is running.
    InProgress,
    /// Every step completed.
    Success,
    /// A step failed or the simulation faulted.
    Failed,
    /// Stopped on request.
    Cancelled,
}

impl DeploymentStatus {
    /// Returns true for every status except `InProgress`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted deployment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Record identifier (also the simulation identifier).
    pub id: DeploymentId,
    /// Service being deployed.
    pub service_name: String,
    /// Version label.
    pub version: String,
    /// Target environment name.
    pub environment: String,
    /// Actor requesting the deployment.
    pub deployed_by: String,
    /// Current status.
    pub status: DeploymentStatus,
    /// When the record was created.
    pub start_time: DateTime<Utc>,
    /// When the deployment reached a terminal status.
    pub end_time: Option<DateTime<Utc>>,
    /// Whole seconds between start and end.
    pub duration: Option<u64>,
}

impl DeploymentRecord {
    /// Creates an in-progress record for `descriptor`.
    #[must_use]
    pub fn in_progress(id: DeploymentId, descriptor: &DeploymentDescriptor, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            service_name: descriptor.service_name.clone(),
            version: descriptor.version.clone(),
            environment: descriptor.environment.clone(),
            deployed_by: descriptor
                .deployed_by
                .clone()
                .unwrap_or_else(|| DEFAULT_DEPLOYED_BY.to_string()),
            status: DeploymentStatus::InProgress,
            start_time,
            end_time: None,
            duration: None,
        }
    }

    /// Applies the `Some` fields of `update`.
    pub fn apply(&mut self, update: &RecordUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(end_time) = update.end_time {
            self.end_time = Some(end_time);
        }
        if let Some(duration) = update.duration {
            self.duration = Some(duration);
        }
    }
}

/// Partial update applied to a deployment record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUpdate {
    /// New status.
    pub status: Option<DeploymentStatus>,
    /// End timestamp.
    pub end_time: Option<DateTime<Utc>>,
    /// Duration in whole seconds.
    pub duration: Option<u64>,
}

impl RecordUpdate {
    /// The single update written when a simulation ends.
    #[must_use]
    pub const fn terminal(status: DeploymentStatus, end_time: DateTime<Utc>, duration: u64) -> Self {
        Self {
            status: Some(status),
            end_time: Some(end_time),
            duration: Some(duration),
        }
    }

    /// Returns true if this update moves the record into a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(DeploymentStatus::is_terminal)
    }
}
