//! # deploysim - Deployment Pipeline Simulator
//!
//! deploysim drives a named sequence of deployment phases forward over time,
//! producing a live, queryable progress trace and a final success, failure or
//! cancellation outcome. It simulates; it never touches real infrastructure.
//!
//! ## Core Concepts
//!
//! - **Step**: One named phase of the pipeline with a duration and success probability
//! - **Simulation**: One run through the step catalog, driven by its own task
//! - **Registry**: Lookup of every simulation by id, for status, logs and stop
//! - **Deployment record**: External record created at start and finalized exactly once
//!
//! ## Usage
//!
//! ```rust,ignore
//! use deploysim::{DeploymentDescriptor, SimulationEngine};
//!
//! let engine = SimulationEngine::builder().build()?;
//! let ack = engine.start(DeploymentDescriptor::new("User Service", "1.0.0", "Development"))?;
//!
//! let status = engine.status(&ack.id)?;
//! println!("{} at step {}/{}", status.status, status.ordinal, status.total_steps);
//!
//! let done = engine.wait_for_completion(&ack.id).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod deployment;
pub mod error;
pub mod simulation;
pub mod storage;
pub mod templates;

// Re-export primary types at crate root for convenience
pub use catalog::{StepCatalog, StepDefinition};
pub use config::{CliConfig, EngineConfig, SimulatorConfig};
pub use deployment::{DeploymentDescriptor, DeploymentId, DeploymentRecord, DeploymentStatus, RecordUpdate};
pub use error::{ExecutionError, SimError, SimResult, ValidationError};
pub use simulation::{
	Clock, FixedRandom, ImmediateTimer, LogEntry, LogLevel, RandomSource, ScriptedRandom, SeededRandom,
	SimulationEngine, SimulationEngineBuilder, SimulationRegistry, SimulationState, SimulationStatus,
	StartAck, StatusSnapshot, StepTimer, StopAck, SystemClock, TokioTimer,
};
pub use storage::{DeploymentRecordSink, InMemoryDeploymentStore, StorageError};
pub use templates::{builtin_templates, find_template, DeploymentTemplate};
