//! Error report
//!
//! After execution drains, every accumulated error is logged once, grouped by
//! environment, project and type, so operators can scan what failed where.

use crate::errors::{DeployError, EnvironmentDeploymentErrors};
use std::collections::BTreeMap;
use tracing::error;

/// Log the grouped error report.
pub fn log_report(errors: &EnvironmentDeploymentErrors) {
    for (environment, environment_errors) in &errors.environments {
        let failures = environment_errors.iter().filter(|e| !e.is_skip()).count();
        let skipped = environment_errors.len() - failures;
        error!(
            environment = environment.as_str(),
            failures, skipped, "Deployment errors"
        );

        for ((project, config_type), grouped) in group_by_project_and_type(environment_errors) {
            for e in grouped {
                error!(
                    environment = environment.as_str(),
                    project = project.as_str(),
                    r#type = config_type.as_str(),
                    config = e.coordinate.config_id.as_str(),
                    "{}",
                    e.kind
                );
            }
        }
    }
}

fn group_by_project_and_type(
    errors: &[DeployError],
) -> BTreeMap<(String, String), Vec<&DeployError>> {
    let mut grouped: BTreeMap<(String, String), Vec<&DeployError>> = BTreeMap::new();
    for e in errors {
        grouped
            .entry((e.coordinate.project.clone(), e.coordinate.config_type.clone()))
            .or_default()
            .push(e);
    }
    grouped
}
