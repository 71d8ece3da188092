//! Built-in deployment templates.

use serde::{Deserialize, Serialize};

use crate::deployment::DeploymentDescriptor;
use crate::error::ValidationError;

const ENVIRONMENTS: [&str; 3] = ["Development", "Staging", "Production"];

/// A named bundle of services and environments a user can pick from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTemplate {
    /// Stable identifier, e.g. `web-app`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Services the template deploys.
    pub services: Vec<String>,
    /// Environments the template targets.
    pub environments: Vec<String>,
}

impl DeploymentTemplate {
    fn new(id: &str, name: &str, description: &str, services: [&str; 3]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            services: services.iter().map(ToString::to_string).collect(),
            environments: ENVIRONMENTS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Builds a validated descriptor for one of this template's services.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` if a field is blank, or `NotInTemplate` if `service` or
    /// `environment` is not offered by this template.
    pub fn descriptor(
        &self,
        service: &str,
        version: &str,
        environment: &str,
    ) -> Result<DeploymentDescriptor, ValidationError> {
        let descriptor = DeploymentDescriptor::new(service, version, environment);
        descriptor.validate()?;
        if !self.services.iter().any(|s| s == service) {
            return Err(ValidationError::NotInTemplate {
                field: "serviceName".to_string(),
                value: service.to_string(),
                template: self.id.clone(),
            });
        }
        if !self.environments.iter().any(|e| e == environment) {
            return Err(ValidationError::NotInTemplate {
                field: "environment".to_string(),
                value: environment.to_string(),
                template: self.id.clone(),
            });
        }
        Ok(descriptor)
    }
}

/// The three templates shipped with the simulator.
#[must_use]
pub fn builtin_templates() -> Vec<DeploymentTemplate> {
    vec![
        DeploymentTemplate::new(
            "web-app",
            "Web Application",
            "Standard web application deployment",
            ["Frontend", "Backend", "Database"],
        ),
        DeploymentTemplate::new(
            "microservice",
            "Microservice",
            "Individual microservice deployment",
            ["User Service", "Payment Service", "Notification Service"],
        ),
        DeploymentTemplate::new(
            "mobile-backend",
            "Mobile Backend",
            "Mobile application backend services",
            ["API Gateway", "Auth Service", "Push Notifications"],
        ),
    ]
}

/// Looks up a built-in template by id.
#[must_use]
pub fn find_template(id: &str) -> Option<DeploymentTemplate> {
    builtin_templates().into_iter().find(|t| t.id == id)
}
