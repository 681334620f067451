//! Deployment error types
//!
//! Every deploy error is bound to a coordinate and an environment. Errors of
//! one run are accumulated into [EnvironmentDeploymentErrors], keyed by
//! environment name, and reported together after execution drains.

use monaco_types::Coordinate;
use std::collections::BTreeMap;
use std::fmt;

/// What went wrong with one configuration
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeployErrorKind {
    /// Rejected before any write (platform-only type, unknown reference, ...)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Parameter or template resolution failed
    #[error("{0}")]
    Resolution(String),

    /// The rendered payload is not valid JSON
    #[error("rendered template is not valid JSON: {0}")]
    InvalidJson(String),

    /// The tenant rejected the deployment, or the transport gave up
    #[error("{message}")]
    Client {
        status: Option<u16>,
        message: String,
    },

    /// Not deployed because a transitive ancestor failed
    #[error("skipped because {failed} failed to deploy")]
    SkippedDueToAncestor { failed: Coordinate },

    /// A dependency cycle makes the set undeployable
    #[error("dependency cycle: {}", format_cycle(.cycle))]
    DependencyCycle { cycle: Vec<Coordinate> },

    /// The run was cancelled while this configuration was in flight
    #[error("deployment cancelled")]
    Cancelled,
}

fn format_cycle(cycle: &[Coordinate]) -> String {
    cycle
        .iter()
        .map(Coordinate::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A failed (or ancestor-skipped) configuration deployment
#[derive(Debug, Clone, thiserror::Error)]
#[error("{environment}: {coordinate}: {kind}")]
pub struct DeployError {
    pub coordinate: Coordinate,
    pub environment: String,
    pub group: String,
    pub kind: DeployErrorKind,
}

impl DeployError {
    pub fn new(
        coordinate: Coordinate,
        environment: impl Into<String>,
        group: impl Into<String>,
        kind: DeployErrorKind,
    ) -> Self {
        Self {
            coordinate,
            environment: environment.into(),
            group: group.into(),
            kind,
        }
    }

    /// True for descendants marked skipped rather than actual failures.
    pub fn is_skip(&self) -> bool {
        matches!(self.kind, DeployErrorKind::SkippedDueToAncestor { .. })
    }
}

/// All deploy errors of one run, grouped per environment
#[derive(Debug, Default)]
pub struct EnvironmentDeploymentErrors {
    pub environments: BTreeMap<String, Vec<DeployError>>,
}

impl EnvironmentDeploymentErrors {
    pub fn is_empty(&self) -> bool {
        self.environments.values().all(Vec::is_empty)
    }

    pub fn error_count(&self) -> usize {
        self.environments.values().map(Vec::len).sum()
    }

    pub fn push(&mut self, error: DeployError) {
        self.environments
            .entry(error.environment.clone())
            .or_default()
            .push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = DeployError>) {
        for error in errors {
            self.push(error);
        }
    }

    /// All errors of one environment, empty slice when it had none.
    pub fn for_environment(&self, environment: &str) -> &[DeployError] {
        self.environments
            .get(environment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl fmt::Display for EnvironmentDeploymentErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deployment failed with {} error(s) across {} environment(s)",
            self.error_count(),
            self.environments.len()
        )
    }
}

impl std::error::Error for EnvironmentDeploymentErrors {}
