//! Shared fixtures for the end-to-end tests.

#![allow(dead_code)]

use std::sync::Arc;

use deploysim::{
    DeploymentDescriptor, ImmediateTimer, InMemoryDeploymentStore, RandomSource, SimulationEngine, StepCatalog,
    StepTimer,
};

pub fn descriptor() -> DeploymentDescriptor {
    DeploymentDescriptor::new("User Service", "1.0.0", "Development")
}

pub fn engine_with(
    store: &Arc<InMemoryDeploymentStore>,
    catalog: StepCatalog,
    random: Arc<dyn RandomSource>,
    timer: Arc<dyn StepTimer>,
) -> SimulationEngine {
    SimulationEngine::builder()
        .catalog(catalog)
        .sink(store.clone())
        .random(random)
        .timer(timer)
        .build()
        .unwrap()
}

/// Engine whose steps always succeed and never wait.
pub fn certain_engine(store: &Arc<InMemoryDeploymentStore>) -> SimulationEngine {
    engine_with(
        store,
        StepCatalog::standard().with_uniform_success(100),
        Arc::new(deploysim::FixedRandom(0.999)),
        Arc::new(ImmediateTimer),
    )
}
