//! The simulation engine.
//!
//! `start` creates the deployment record, registers a fresh state and spawns
//! one supervisor task per simulation on the tokio runtime. The supervisor
//! runs the step driver as a child task, so a driver error or panic is caught
//! and turned into a failed outcome. Every outcome is committed through
//! [`SimulationState::try_finish`], which makes the terminal record update
//! happen exactly once per simulation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::catalog::{StepCatalog, StepDefinition};
use crate::config::EngineConfig;
use crate::deployment::{DeploymentDescriptor, DeploymentId, DeploymentRecord, RecordUpdate};
use crate::error::{SimError, SimResult};
use crate::storage::{DeploymentRecordSink, InMemoryDeploymentStore};
use crate::templates::{builtin_templates, DeploymentTemplate};

use super::random::{RandomSource, SeededRandom};
use super::registry::SimulationRegistry;
use super::state::{LogEntry, SimulationState, SimulationStatus};
use super::status::StatusSnapshot;
use super::timer::{elapsed_secs_rounded, Clock, StepTimer, SystemClock, TokioTimer};

/// Probability that a step whose primary draw failed actually fails.
pub const SECONDARY_FAILURE_PROBABILITY: f64 = 0.10;

/// Closing log message of a successful simulation.
pub const COMPLETION_MESSAGE: &str = "Deployment completed successfully!";

/// Returned by `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAck {
    /// Simulation and deployment record identifier.
    pub id: DeploymentId,
    /// Number of steps the simulation will attempt.
    pub total_steps: usize,
}

/// Returned by `stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopAck {
    /// Simulation identifier.
    pub id: DeploymentId,
    /// False if the simulation had already finished.
    pub cancellation_requested: bool,
}

#[derive(Debug)]
enum Outcome {
    Completed,
    Failed { step: String },
    Cancelled,
    Faulted(String),
}

struct Shared {
    catalog: Arc<StepCatalog>,
    sink: Arc<dyn DeploymentRecordSink>,
    random: Arc<dyn RandomSource>,
    timer: Arc<dyn StepTimer>,
    clock: Arc<dyn Clock>,
}

fn draw(random: &dyn RandomSource) -> SimResult<f64> {
    let x = random.next_unit();
    if (0.0..1.0).contains(&x) {
        Ok(x)
    } else {
        Err(SimError::internal(format!("random source produced out-of-range draw {x}")))
    }
}

/// Applies the compound failure rule to one step.
///
/// The step fails only if the primary draw misses the base success
/// probability *and* a second draw lands under
/// [`SECONDARY_FAILURE_PROBABILITY`]. The second draw is taken only when the
/// primary draw failed.
///
/// # Errors
///
/// Returns an internal error if a draw falls outside `[0, 1)`.
pub fn step_fails(step: &StepDefinition, random: &dyn RandomSource) -> SimResult<bool> {
    let primary_success = draw(random)? * 100.0 < f64::from(step.base_success_probability);
    if primary_success {
        return Ok(false);
    }
    Ok(draw(random)? < SECONDARY_FAILURE_PROBABILITY)
}

async fn drive(shared: Arc<Shared>, state: Arc<SimulationState>) -> SimResult<Outcome> {
    for (index, step) in shared.catalog.iter().enumerate() {
        if state.is_cancel_requested() {
            return Ok(Outcome::Cancelled);
        }

        state.append(LogEntry::info(shared.clock.now(), format!("Starting {}...", step.name)));
        debug!(deployment_id = %state.id(), step = %step.name, index, "step started");

        shared.timer.wait(step.nominal_duration()).await;

        if step_fails(step, shared.random.as_ref())? {
            return Ok(Outcome::Failed {
                step: step.name.clone(),
            });
        }

        state.complete_step(
            index,
            LogEntry::info(shared.clock.now(), format!("{} completed successfully", step.name)),
        );
    }

    // A stop that arrived during the last step is honoured here.
    if state.is_cancel_requested() {
        return Ok(Outcome::Cancelled);
    }
    Ok(Outcome::Completed)
}

async fn supervise(shared: Arc<Shared>, state: Arc<SimulationState>) {
    let driver = tokio::spawn(drive(Arc::clone(&shared), Arc::clone(&state)));
    let outcome = match driver.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => Outcome::Faulted(err.to_string()),
        Err(join_err) if join_err.is_panic() => Outcome::Faulted("simulation task panicked".to_string()),
        Err(join_err) => Outcome::Faulted(join_err.to_string()),
    };
    finalize(&shared, &state, outcome);
}

fn finalize(shared: &Shared, state: &SimulationState, outcome: Outcome) {
    let now = shared.clock.now();
    let (status, ordinal, closing) = match &outcome {
        Outcome::Completed => (
            SimulationStatus::Completed,
            Some(shared.catalog.len()),
            Some(LogEntry::info(now, COMPLETION_MESSAGE)),
        ),
        Outcome::Failed { step } => (
            SimulationStatus::Failed,
            None,
            Some(LogEntry::error(now, format!("{step} failed: Simulated error occurred"))),
        ),
        Outcome::Cancelled => (SimulationStatus::Cancelled, None, None),
        Outcome::Faulted(fault) => (
            SimulationStatus::Failed,
            None,
            Some(LogEntry::error(now, format!("Simulation error: {fault}"))),
        ),
    };

    if !state.try_finish(status, ordinal, closing) {
        debug!(deployment_id = %state.id(), "simulation already terminal; skipping finalization");
        return;
    }
    // Wakes waiters even if the sink panics below.
    let _notify = NotifyOnDrop(state);

    match &outcome {
        Outcome::Completed => info!(deployment_id = %state.id(), "simulation completed"),
        Outcome::Failed { step } => info!(deployment_id = %state.id(), step = %step, "simulation failed"),
        Outcome::Cancelled => info!(deployment_id = %state.id(), "simulation cancelled"),
        Outcome::Faulted(fault) => error!(deployment_id = %state.id(), fault = %fault, "simulation faulted"),
    }

    let duration = elapsed_secs_rounded(state.started_at(), now);
    let update = RecordUpdate::terminal(status.record_status(), now, duration);
    if let Err(err) = shared.sink.update(state.id(), update) {
        warn!(deployment_id = %state.id(), error = %err, "failed to finalize deployment record");
    }
}

struct NotifyOnDrop<'a>(&'a SimulationState);

impl Drop for NotifyOnDrop<'_> {
    fn drop(&mut self) {
        self.0.notify_finished();
    }
}

/// Drives deployment simulations and answers queries about them.
pub struct SimulationEngine {
    shared: Arc<Shared>,
    registry: Arc<SimulationRegistry>,
    runtime: Handle,
}

impl std::fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("total_steps", &self.shared.catalog.len())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl SimulationEngine {
    /// Returns a builder with production defaults.
    #[must_use]
    pub fn builder() -> SimulationEngineBuilder {
        SimulationEngineBuilder::default()
    }

    /// Starts a simulation and returns without waiting for any step.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record cannot be created, or
    /// `DuplicateSimulation` if the record id is already registered.
    pub fn start(&self, descriptor: DeploymentDescriptor) -> SimResult<StartAck> {
        let record = self.shared.sink.create(&descriptor)?;
        let state = Arc::new(SimulationState::new(record.id.clone(), self.shared.clock.now()));
        self.registry.insert(Arc::clone(&state))?;

        info!(
            deployment_id = %record.id,
            service = %record.service_name,
            version = %record.version,
            environment = %record.environment,
            total_steps = self.shared.catalog.len(),
            "simulation started"
        );

        self.runtime.spawn(supervise(Arc::clone(&self.shared), state));

        Ok(StartAck {
            id: record.id,
            total_steps: self.shared.catalog.len(),
        })
    }

    /// Current status of a simulation.
    ///
    /// # Errors
    ///
    /// Returns `SimulationNotFound` for an unknown id.
    pub fn status(&self, id: &DeploymentId) -> SimResult<StatusSnapshot> {
        let state = self.registry.get(id)?;
        Ok(StatusSnapshot::project(&state, &self.shared.catalog))
    }

    /// Full ordered log of a simulation.
    ///
    /// # Errors
    ///
    /// Returns `SimulationNotFound` for an unknown id.
    pub fn logs(&self, id: &DeploymentId) -> SimResult<Vec<LogEntry>> {
        Ok(self.registry.get(id)?.logs())
    }

    /// Requests cancellation; the engine task observes it at its next
    /// checkpoint. A no-op for a finished simulation.
    ///
    /// # Errors
    ///
    /// Returns `SimulationNotFound` for an unknown id.
    pub fn stop(&self, id: &DeploymentId) -> SimResult<StopAck> {
        let state = self.registry.get(id)?;
        let cancellation_requested = state.request_cancel();
        if cancellation_requested {
            info!(deployment_id = %id, "cancellation requested");
        } else {
            debug!(deployment_id = %id, "stop ignored; simulation already terminal");
        }
        Ok(StopAck {
            id: id.clone(),
            cancellation_requested,
        })
    }

    /// Waits until the simulation is terminal and its deployment record has
    /// been finalized, then returns its final status.
    ///
    /// # Errors
    ///
    /// Returns `SimulationNotFound` for an unknown id.
    pub async fn wait_for_completion(&self, id: &DeploymentId) -> SimResult<StatusSnapshot> {
        let state = self.registry.get(id)?;
        let mut rx = state.subscribe();
        rx.wait_for(|status| status.is_terminal())
            .await
            .map_err(|_| SimError::internal("simulation status channel closed"))?;
        Ok(StatusSnapshot::project(&state, &self.shared.catalog))
    }

    /// Reads the deployment record back from the record store.
    ///
    /// # Errors
    ///
    /// Returns `SimulationNotFound` if the store has no such record.
    pub fn record(&self, id: &DeploymentId) -> SimResult<DeploymentRecord> {
        self.shared.sink.get(id)?.ok_or_else(|| SimError::not_found(id))
    }

    /// Waits for the simulation to finish, then reads its finalized
    /// deployment record.
    ///
    /// # Errors
    ///
    /// Returns `SimulationNotFound` for an unknown id or a missing record.
    pub async fn finished_record(&self, id: &DeploymentId) -> SimResult<DeploymentRecord> {
        self.wait_for_completion(id).await?;
        self.record(id)
    }

    /// The step catalog shared by all simulations.
    #[must_use]
    pub fn catalog(&self) -> &StepCatalog {
        &self.shared.catalog
    }

    /// Built-in deployment templates.
    #[must_use]
    pub fn templates(&self) -> Vec<DeploymentTemplate> {
        builtin_templates()
    }

    /// The registry of every simulation started by this engine.
    #[must_use]
    pub fn registry(&self) -> &SimulationRegistry {
        &self.registry
    }
}

/// Builder for [`SimulationEngine`].
#[derive(Default)]
pub struct SimulationEngineBuilder {
    catalog: Option<StepCatalog>,
    sink: Option<Arc<dyn DeploymentRecordSink>>,
    random: Option<Arc<dyn RandomSource>>,
    timer: Option<Arc<dyn StepTimer>>,
    clock: Option<Arc<dyn Clock>>,
    runtime: Option<Handle>,
}

impl SimulationEngineBuilder {
    /// Creates a builder with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies engine configuration: time scale and random seed.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid time scale.
    pub fn config(self, config: &EngineConfig) -> SimResult<Self> {
        let timer = TokioTimer::scaled(config.time_scale)?;
        let random = config
            .seed
            .map_or_else(SeededRandom::from_entropy, SeededRandom::from_seed);
        Ok(self.timer(Arc::new(timer)).random(Arc::new(random)))
    }

    /// Overrides the step catalog.
    #[must_use]
    pub fn catalog(mut self, catalog: StepCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Sets the deployment record store.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn DeploymentRecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the random source used by the failure model.
    #[must_use]
    pub fn random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    /// Sets the step timer.
    #[must_use]
    pub fn timer(mut self, timer: Arc<dyn StepTimer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Sets the wall clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the runtime that simulation tasks are spawned on.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns an internal error if no runtime was given and the caller is
    /// not inside a tokio runtime.
    pub fn build(self) -> SimResult<SimulationEngine> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| SimError::internal(format!("no tokio runtime available: {e}")))?,
        };

        let shared = Shared {
            catalog: Arc::new(self.catalog.unwrap_or_default()),
            sink: self
                .sink
                .unwrap_or_else(|| Arc::new(InMemoryDeploymentStore::new())),
            random: self
                .random
                .unwrap_or_else(|| Arc::new(SeededRandom::from_entropy())),
            timer: self.timer.unwrap_or_else(|| Arc::new(TokioTimer::real_time())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        Ok(SimulationEngine {
            shared: Arc::new(shared),
            registry: Arc::new(SimulationRegistry::new()),
            runtime,
        })
    }
}
