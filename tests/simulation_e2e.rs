mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use deploysim::{
    DeploymentDescriptor, DeploymentId, DeploymentRecord, DeploymentRecordSink, DeploymentStatus, ExecutionError,
    FixedRandom, ImmediateTimer, InMemoryDeploymentStore, LogLevel, RecordUpdate, ScriptedRandom, SimError,
    SimulationEngine, SimulationStatus, StepCatalog, StepTimer, StorageError, TokioTimer,
};

use common::{certain_engine, descriptor, engine_with};

#[tokio::test]
async fn certain_steps_complete_with_seventeen_log_entries() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = certain_engine(&store);

    let ack = engine.start(descriptor()).unwrap();
    assert_eq!(ack.total_steps, 8);
    assert_eq!(engine.catalog().len(), 8);

    let done = engine.wait_for_completion(&ack.id).await.unwrap();
    assert_eq!(done.status, SimulationStatus::Completed);
    assert_eq!(done.ordinal, 8);
    assert_eq!(done.total_steps, 8);
    assert_eq!(done.current_step_name, "Completed");
    assert_eq!(done.progress_percent, 100);

    let logs = engine.logs(&ack.id).unwrap();
    assert_eq!(logs.len(), 17);
    assert!(logs.iter().all(|e| e.level == LogLevel::Info));
    for (i, step) in engine.catalog().iter().enumerate() {
        assert_eq!(logs[2 * i].message, format!("Starting {}...", step.name));
        assert_eq!(logs[2 * i + 1].message, format!("{} completed successfully", step.name));
    }
    assert_eq!(logs[16].message, "Deployment completed successfully!");
    assert!(logs.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let record = engine.record(&ack.id).unwrap();
    assert_eq!(record.status, DeploymentStatus::Success);
    assert_eq!(record.service_name, "User Service");
    assert_eq!(record.deployed_by, "simulator");
    assert!(record.end_time.is_some());
    assert_eq!(record.duration, Some(0));
    assert_eq!(store.terminal_updates(&ack.id).unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn status_right_after_start_is_running_at_zero() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = engine_with(
        &store,
        StepCatalog::standard(),
        Arc::new(FixedRandom(0.0)),
        Arc::new(TokioTimer::real_time()),
    );

    let ack = engine.start(DeploymentDescriptor::new("User Service", "1.0.0", "Development")).unwrap();
    let status = engine.status(&ack.id).unwrap();
    assert_eq!(status.status, SimulationStatus::Running);
    assert_eq!(status.ordinal, 0);
    assert_eq!(status.total_steps, 8);
    assert_eq!(status.current_step_name, "Initializing");
    assert_eq!(status.progress_percent, 0);

    let record = engine.record(&ack.id).unwrap();
    assert_eq!(record.status, DeploymentStatus::InProgress);
    assert!(record.end_time.is_none());
}

#[tokio::test(start_paused = true)]
async fn stop_before_first_step_cancels_and_finalizes_record() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = engine_with(
        &store,
        StepCatalog::standard(),
        Arc::new(FixedRandom(0.0)),
        Arc::new(TokioTimer::real_time()),
    );

    let ack = engine.start(descriptor()).unwrap();
    let stop = engine.stop(&ack.id).unwrap();
    assert!(stop.cancellation_requested);

    let done = engine.wait_for_completion(&ack.id).await.unwrap();
    assert_eq!(done.status, SimulationStatus::Cancelled);
    assert_eq!(done.ordinal, 0);
    assert!(done.logs.is_empty());

    let record = engine.record(&ack.id).unwrap();
    assert_eq!(record.status, DeploymentStatus::Cancelled);
    assert!(record.end_time.is_some());
    assert!(record.duration.is_some());
    assert_eq!(store.terminal_updates(&ack.id).unwrap(), 1);

    // Stopping a finished simulation is acknowledged but changes nothing.
    let again = engine.stop(&ack.id).unwrap();
    assert!(!again.cancellation_requested);
    assert_eq!(engine.status(&ack.id).unwrap().status, SimulationStatus::Cancelled);
    assert_eq!(store.terminal_updates(&ack.id).unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_mid_step_is_observed_at_next_checkpoint() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = engine_with(
        &store,
        StepCatalog::standard(),
        Arc::new(FixedRandom(0.0)),
        Arc::new(TokioTimer::real_time()),
    );

    let ack = engine.start(descriptor()).unwrap();

    // Initializing takes 2s; Building Application is in flight at 2.5s.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let mid = engine.status(&ack.id).unwrap();
    assert_eq!(mid.status, SimulationStatus::Running);
    assert_eq!(mid.ordinal, 1);
    assert_eq!(mid.current_step_name, "Building Application");
    assert_eq!(mid.progress_percent, 13);
    assert_eq!(mid.logs.len(), 3);

    engine.stop(&ack.id).unwrap();

    // The in-flight step still finishes before the checkpoint.
    let done = engine.wait_for_completion(&ack.id).await.unwrap();
    assert_eq!(done.status, SimulationStatus::Cancelled);
    assert_eq!(done.ordinal, 2);
    let messages: Vec<_> = done.logs.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Starting Initializing...",
            "Initializing completed successfully",
            "Starting Building Application...",
            "Building Application completed successfully",
        ]
    );
    assert_eq!(engine.record(&ack.id).unwrap().status, DeploymentStatus::Cancelled);
}

#[tokio::test]
async fn failing_step_ends_simulation_with_error_entry() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    // Step 0 passes its primary draw; step 1 misses (95 >= 90) and the
    // secondary draw (0.05) confirms the failure.
    let random = Arc::new(ScriptedRandom::new([0.0, 0.95, 0.05], 0.0));
    let engine = engine_with(&store, StepCatalog::standard(), random, Arc::new(ImmediateTimer));

    let ack = engine.start(descriptor()).unwrap();
    let done = engine.wait_for_completion(&ack.id).await.unwrap();

    assert_eq!(done.status, SimulationStatus::Failed);
    assert_eq!(done.ordinal, 1);
    assert_eq!(done.current_step_name, "Building Application");
    assert_eq!(done.logs.len(), 4);
    let last = done.logs.last().unwrap();
    assert_eq!(last.level, LogLevel::Error);
    assert_eq!(last.message, "Building Application failed: Simulated error occurred");
    assert!(!done.logs.iter().any(|e| e.message == "Deployment completed successfully!"));

    let record = engine.record(&ack.id).unwrap();
    assert_eq!(record.status, DeploymentStatus::Failed);
    assert!(record.end_time.is_some());
    assert_eq!(store.terminal_updates(&ack.id).unwrap(), 1);
}

#[tokio::test]
async fn primary_miss_alone_does_not_fail_a_step() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    // 0.99 misses every primary draw (p <= 98) but never passes the 10%
    // secondary draw, so every step still succeeds.
    let engine = engine_with(
        &store,
        StepCatalog::standard(),
        Arc::new(FixedRandom(0.99)),
        Arc::new(ImmediateTimer),
    );

    let ack = engine.start(descriptor()).unwrap();
    let done = engine.wait_for_completion(&ack.id).await.unwrap();
    assert_eq!(done.status, SimulationStatus::Completed);
    assert_eq!(done.logs.len(), 17);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = certain_engine(&store);
    let unknown = DeploymentId::new("unknown-id");

    assert!(engine.status(&unknown).unwrap_err().is_not_found());
    assert!(engine.logs(&unknown).unwrap_err().is_not_found());
    assert!(engine.stop(&unknown).unwrap_err().is_not_found());
    assert!(engine.wait_for_completion(&unknown).await.unwrap_err().is_not_found());
    assert!(engine.record(&unknown).unwrap_err().is_not_found());
}

#[tokio::test]
async fn out_of_range_draw_is_contained_as_failure() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = engine_with(
        &store,
        StepCatalog::standard(),
        Arc::new(FixedRandom(1.5)),
        Arc::new(ImmediateTimer),
    );

    let ack = engine.start(descriptor()).unwrap();
    let done = engine.wait_for_completion(&ack.id).await.unwrap();

    assert_eq!(done.status, SimulationStatus::Failed);
    assert_eq!(done.ordinal, 0);
    let last = done.logs.last().unwrap();
    assert_eq!(last.level, LogLevel::Error);
    assert!(last.message.starts_with("Simulation error:"));
    assert!(last.message.contains("out-of-range"));
    assert_eq!(engine.record(&ack.id).unwrap().status, DeploymentStatus::Failed);
    assert_eq!(store.terminal_updates(&ack.id).unwrap(), 1);
}

struct ExplodingTimer;

#[async_trait]
impl StepTimer for ExplodingTimer {
    async fn wait(&self, _nominal: Duration) {
        panic!("timer exploded");
    }
}

#[tokio::test]
async fn panicking_step_is_contained_as_failure() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = engine_with(
        &store,
        StepCatalog::standard(),
        Arc::new(FixedRandom(0.0)),
        Arc::new(ExplodingTimer),
    );

    let ack = engine.start(descriptor()).unwrap();
    let done = engine.wait_for_completion(&ack.id).await.unwrap();

    assert_eq!(done.status, SimulationStatus::Failed);
    let messages: Vec<_> = done.logs.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages[0], "Starting Initializing...");
    assert!(messages[1].contains("panicked"));
    assert_eq!(engine.record(&ack.id).unwrap().status, DeploymentStatus::Failed);
    assert_eq!(store.terminal_updates(&ack.id).unwrap(), 1);

    // The engine keeps serving new simulations afterwards.
    let other = engine.start(descriptor()).unwrap();
    assert_eq!(engine.status(&other.id).unwrap().total_steps, 8);
}

/// Record store that accepts creates but rejects every update.
#[derive(Default)]
struct ReadOnlyAfterCreate {
    inner: InMemoryDeploymentStore,
}

impl DeploymentRecordSink for ReadOnlyAfterCreate {
    fn create(&self, descriptor: &DeploymentDescriptor) -> Result<DeploymentRecord, StorageError> {
        self.inner.create(descriptor)
    }

    fn update(&self, _id: &DeploymentId, _update: RecordUpdate) -> Result<DeploymentRecord, StorageError> {
        Err(StorageError::Backend("read-only".to_string()))
    }

    fn get(&self, id: &DeploymentId) -> Result<Option<DeploymentRecord>, StorageError> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<DeploymentRecord>, StorageError> {
        self.inner.list()
    }
}

#[tokio::test]
async fn record_update_failure_does_not_block_terminal_state() {
    let sink = Arc::new(ReadOnlyAfterCreate::default());
    let engine = SimulationEngine::builder()
        .catalog(StepCatalog::standard().with_uniform_success(100))
        .sink(sink)
        .random(Arc::new(FixedRandom(0.5)))
        .timer(Arc::new(ImmediateTimer))
        .build()
        .unwrap();

    let ack = engine.start(descriptor()).unwrap();
    let done = engine.wait_for_completion(&ack.id).await.unwrap();
    assert_eq!(done.status, SimulationStatus::Completed);
    assert_eq!(engine.record(&ack.id).unwrap().status, DeploymentStatus::InProgress);
}

/// Record store that hands out the same id every time.
#[derive(Default)]
struct FixedIdStore {
    inner: InMemoryDeploymentStore,
}

impl DeploymentRecordSink for FixedIdStore {
    fn create(&self, descriptor: &DeploymentDescriptor) -> Result<DeploymentRecord, StorageError> {
        let id = DeploymentId::new("dep-fixed");
        Ok(self
            .inner
            .get(&id)?
            .unwrap_or_else(|| DeploymentRecord::in_progress(id, descriptor, chrono::Utc::now())))
    }

    fn update(&self, id: &DeploymentId, update: RecordUpdate) -> Result<DeploymentRecord, StorageError> {
        self.inner.update(id, update)
    }

    fn get(&self, id: &DeploymentId) -> Result<Option<DeploymentRecord>, StorageError> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<DeploymentRecord>, StorageError> {
        self.inner.list()
    }
}

#[tokio::test]
async fn starting_an_already_registered_id_is_rejected() {
    let engine = SimulationEngine::builder()
        .sink(Arc::new(FixedIdStore::default()))
        .timer(Arc::new(ImmediateTimer))
        .random(Arc::new(FixedRandom(0.0)))
        .build()
        .unwrap();

    let first = engine.start(descriptor()).unwrap();
    assert_eq!(first.id.as_str(), "dep-fixed");

    let err = engine.start(descriptor()).unwrap_err();
    assert!(matches!(
        err,
        SimError::Execution(ExecutionError::DuplicateSimulation { .. })
    ));
    assert_eq!(engine.registry().len(), 1);
}

#[tokio::test]
async fn finished_simulations_stay_queryable() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = certain_engine(&store);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let ack = engine.start(descriptor()).unwrap();
        engine.wait_for_completion(&ack.id).await.unwrap();
        ids.push(ack.id);
    }

    assert_eq!(engine.registry().len(), 3);
    assert_eq!(engine.registry().running(), 0);
    for id in &ids {
        assert_eq!(engine.status(id).unwrap().status, SimulationStatus::Completed);
        assert_eq!(engine.logs(id).unwrap().len(), 17);
    }
    assert_eq!(store.list().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn stop_during_last_step_cancels_after_it_finishes() {
    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = engine_with(
        &store,
        StepCatalog::standard(),
        Arc::new(FixedRandom(0.0)),
        Arc::new(TokioTimer::real_time()),
    );

    let ack = engine.start(descriptor()).unwrap();

    // Every step but Finalizing adds up to 35s; Finalizing runs 35s..37s.
    tokio::time::sleep(Duration::from_secs(36)).await;
    let mid = engine.status(&ack.id).unwrap();
    assert_eq!(mid.status, SimulationStatus::Running);
    assert_eq!(mid.ordinal, 7);
    assert_eq!(mid.current_step_name, "Finalizing");

    assert!(engine.stop(&ack.id).unwrap().cancellation_requested);

    let done = engine.wait_for_completion(&ack.id).await.unwrap();
    assert_eq!(done.status, SimulationStatus::Cancelled);
    assert_eq!(done.ordinal, 8);
    assert_eq!(done.logs.len(), 16);
    assert_eq!(done.logs.last().unwrap().message, "Finalizing completed successfully");
    assert!(!done.logs.iter().any(|e| e.message == "Deployment completed successfully!"));

    let record = engine.record(&ack.id).unwrap();
    assert_eq!(record.status, DeploymentStatus::Cancelled);
    assert_eq!(store.terminal_updates(&ack.id).unwrap(), 1);
}

/// Record store whose updates take a while to land.
#[derive(Default)]
struct SlowUpdateStore {
    inner: InMemoryDeploymentStore,
}

impl DeploymentRecordSink for SlowUpdateStore {
    fn create(&self, descriptor: &DeploymentDescriptor) -> Result<DeploymentRecord, StorageError> {
        self.inner.create(descriptor)
    }

    fn update(&self, id: &DeploymentId, update: RecordUpdate) -> Result<DeploymentRecord, StorageError> {
        std::thread::sleep(Duration::from_millis(300));
        self.inner.update(id, update)
    }

    fn get(&self, id: &DeploymentId) -> Result<Option<DeploymentRecord>, StorageError> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<DeploymentRecord>, StorageError> {
        self.inner.list()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn record_read_after_polling_to_terminal_is_finalized() {
    let engine = SimulationEngine::builder()
        .catalog(StepCatalog::standard().with_uniform_success(100))
        .sink(Arc::new(SlowUpdateStore::default()))
        .random(Arc::new(FixedRandom(0.5)))
        .timer(Arc::new(ImmediateTimer))
        .build()
        .unwrap();

    let ack = engine.start(descriptor()).unwrap();
    loop {
        if engine.status(&ack.id).unwrap().is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let record = engine.finished_record(&ack.id).await.unwrap();
    assert_eq!(record.status, DeploymentStatus::Success);
    assert!(record.end_time.is_some());
    assert!(record.duration.is_some());
}

/// Record store whose update panics.
#[derive(Default)]
struct PanickingUpdateStore {
    inner: InMemoryDeploymentStore,
}

impl DeploymentRecordSink for PanickingUpdateStore {
    fn create(&self, descriptor: &DeploymentDescriptor) -> Result<DeploymentRecord, StorageError> {
        self.inner.create(descriptor)
    }

    fn update(&self, _id: &DeploymentId, _update: RecordUpdate) -> Result<DeploymentRecord, StorageError> {
        panic!("record backend crashed");
    }

    fn get(&self, id: &DeploymentId) -> Result<Option<DeploymentRecord>, StorageError> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<DeploymentRecord>, StorageError> {
        self.inner.list()
    }
}

#[tokio::test]
async fn panicking_record_update_still_wakes_waiters() {
    let engine = SimulationEngine::builder()
        .catalog(StepCatalog::standard().with_uniform_success(100))
        .sink(Arc::new(PanickingUpdateStore::default()))
        .random(Arc::new(FixedRandom(0.5)))
        .timer(Arc::new(ImmediateTimer))
        .build()
        .unwrap();

    let ack = engine.start(descriptor()).unwrap();
    let done = tokio::time::timeout(Duration::from_secs(5), engine.wait_for_completion(&ack.id))
        .await
        .expect("waiter was never woken")
        .unwrap();
    assert_eq!(done.status, SimulationStatus::Completed);
    assert_eq!(engine.record(&ack.id).unwrap().status, DeploymentStatus::InProgress);
}
