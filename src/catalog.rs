//! The ordered catalog of deployment steps.
//!
//! A catalog is defined once at process start and shared read-only by every
//! simulation. Each step carries its nominal duration and the base
//! probability (in percent) that its primary draw succeeds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A single named phase of the simulated pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    /// Display name, used verbatim in log messages.
    pub name: String,

    /// How long the step takes before its outcome is drawn.
    pub nominal_duration_ms: u64,

    /// Primary success probability in percent (0..=100).
    pub base_success_probability: u8,
}

impl StepDefinition {
    /// Creates a step definition.
    #[must_use]
    pub fn new(name: impl Into<String>, nominal_duration_ms: u64, base_success_probability: u8) -> Self {
        Self {
            name: name.into(),
            nominal_duration_ms,
            base_success_probability,
        }
    }

    /// Nominal duration as a [`Duration`].
    #[must_use]
    pub const fn nominal_duration(&self) -> Duration {
        Duration::from_millis(self.nominal_duration_ms)
    }
}

/// Immutable, ordered sequence of step definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StepCatalog {
    steps: Vec<StepDefinition>,
}

impl StepCatalog {
    /// Number of steps in the standard pipeline.
    pub const STANDARD_LEN: usize = 8;

    /// Builds a catalog from custom steps.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the list is empty, a name is blank, or a
    /// probability exceeds 100.
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, ValidationError> {
        if steps.is_empty() {
            return Err(ValidationError::EmptyCatalog);
        }
        for (index, step) in steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(ValidationError::EmptyStepName { index });
            }
            if step.base_success_probability > 100 {
                return Err(ValidationError::ProbabilityOutOfRange {
                    step: step.name.clone(),
                    value: step.base_success_probability,
                });
            }
        }
        Ok(Self { steps })
    }

    /// The standard eight-step deployment pipeline.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            steps: vec![
                StepDefinition::new("Initializing", 2000, 95),
                StepDefinition::new("Building Application", 8000, 90),
                StepDefinition::new("Running Tests", 5000, 85),
                StepDefinition::new("Creating Docker Image", 6000, 92),
                StepDefinition::new("Pushing to Registry", 4000, 88),
                StepDefinition::new("Deploying to Environment", 7000, 93),
                StepDefinition::new("Health Checks", 3000, 90),
                StepDefinition::new("Finalizing", 2000, 98),
            ],
        }
    }

    /// Returns a copy of this catalog with every step's base success
    /// probability replaced by `probability` (clamped to 100).
    #[must_use]
    pub fn with_uniform_success(&self, probability: u8) -> Self {
        let probability = probability.min(100);
        Self {
            steps: self
                .steps
                .iter()
                .map(|s| StepDefinition {
                    base_success_probability: probability,
                    ..s.clone()
                })
                .collect(),
        }
    }

    /// Total number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a constructed catalog; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at `ordinal`, if any.
    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&StepDefinition> {
        self.steps.get(ordinal)
    }

    /// Iterates steps in pipeline order.
    pub fn iter(&self) -> std::slice::Iter<'_, StepDefinition> {
        self.steps.iter()
    }

    /// All steps as a slice.
    #[must_use]
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl<'a> IntoIterator for &'a StepCatalog {
    type Item = &'a StepDefinition;
    type IntoIter = std::slice::Iter<'a, StepDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
