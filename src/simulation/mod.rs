//! Deployment simulation engine.
//!
//! Each simulation runs on its own tokio task, reports progress through a
//! lock-guarded [`SimulationState`], and is reachable by id through the
//! [`SimulationRegistry`] owned by the [`SimulationEngine`].

pub mod engine;
pub mod random;
pub mod registry;
pub mod state;
pub mod status;
pub mod timer;

pub use engine::{
	step_fails, SimulationEngine, SimulationEngineBuilder, StartAck, StopAck, COMPLETION_MESSAGE,
	SECONDARY_FAILURE_PROBABILITY,
};
pub use random::{FixedRandom, RandomSource, ScriptedRandom, SeededRandom};
pub use registry::SimulationRegistry;
pub use state::{LogEntry, LogLevel, ProgressView, SimulationState, SimulationStatus};
pub use status::{progress_percent, StatusSnapshot, COMPLETED_STEP_NAME};
pub use timer::{elapsed_secs_rounded, Clock, ImmediateTimer, StepTimer, SystemClock, TokioTimer};
