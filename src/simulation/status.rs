//! Status projection for queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::StepCatalog;
use crate::deployment::DeploymentId;

use super::state::{LogEntry, SimulationState, SimulationStatus};

/// Step name reported once every step has been passed.
pub const COMPLETED_STEP_NAME: &str = "Completed";

/// Point-in-time view of one simulation, as returned by `status(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Simulation identifier.
    pub id: DeploymentId,
    /// Current status.
    pub status: SimulationStatus,
    /// Zero-based ordinal of the step in progress.
    pub ordinal: usize,
    /// Number of steps in the catalog.
    pub total_steps: usize,
    /// Name of the step at `ordinal`, or `"Completed"`.
    pub current_step_name: String,
    /// `round(ordinal / total_steps * 100)`.
    pub progress_percent: u8,
    /// When the simulation was accepted.
    pub started_at: DateTime<Utc>,
    /// Full ordered log.
    pub logs: Vec<LogEntry>,
}

impl StatusSnapshot {
    /// Projects `state` against `catalog` from one consistent view.
    #[must_use]
    pub fn project(state: &SimulationState, catalog: &StepCatalog) -> Self {
        let view = state.view();
        let total_steps = catalog.len();
        let current_step_name = catalog
            .get(view.ordinal)
            .map_or_else(|| COMPLETED_STEP_NAME.to_string(), |s| s.name.clone());

        Self {
            id: state.id().clone(),
            status: view.status,
            ordinal: view.ordinal,
            total_steps,
            current_step_name,
            progress_percent: progress_percent(view.ordinal, total_steps),
            started_at: state.started_at(),
            logs: view.logs,
        }
    }

    /// Returns true once the simulation can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Rounded percentage of steps passed.
#[must_use]
pub fn progress_percent(ordinal: usize, total_steps: usize) -> u8 {
    if total_steps == 0 {
        return 100;
    }
    let ordinal = ordinal.min(total_steps);
    // Integer round-half-up of ordinal * 100 / total.
    let pct = (ordinal * 200 + total_steps) / (total_steps * 2);
    u8::try_from(pct).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rounds_like_math_round() {
        assert_eq!(progress_percent(0, 8), 0);
        assert_eq!(progress_percent(1, 8), 13); // 12.5
        assert_eq!(progress_percent(3, 8), 38); // 37.5
        assert_eq!(progress_percent(5, 8), 63); // 62.5
        assert_eq!(progress_percent(8, 8), 100);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(12, 8), 100);
    }

    #[test]
    fn projection_names_current_step_or_completed() {
        let catalog = StepCatalog::standard();
        let state = SimulationState::new(DeploymentId::new("p"), Utc::now());

        let snap = StatusSnapshot::project(&state, &catalog);
        assert_eq!(snap.status, SimulationStatus::Running);
        assert_eq!(snap.ordinal, 0);
        assert_eq!(snap.total_steps, 8);
        assert_eq!(snap.current_step_name, "Initializing");
        assert_eq!(snap.progress_percent, 0);

        state.complete_step(1, LogEntry::info(Utc::now(), "Building Application completed successfully"));
        let snap = StatusSnapshot::project(&state, &catalog);
        assert_eq!(snap.current_step_name, "Running Tests");
        assert_eq!(snap.progress_percent, 25);

        state.try_finish(SimulationStatus::Completed, Some(8), None);
        let snap = StatusSnapshot::project(&state, &catalog);
        assert_eq!(snap.current_step_name, COMPLETED_STEP_NAME);
        assert_eq!(snap.progress_percent, 100);
        assert!(snap.is_terminal());
    }
}
