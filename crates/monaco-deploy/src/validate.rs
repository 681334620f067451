//! Pre-deploy validation
//!
//! Runs over an environment's full configuration set before any write:
//! platform-only types on token-only environments, cyclic parameter
//! dependencies and references to unknown configurations all abort the
//! environment here. Skipped configurations are exempt; they never deploy.

use crate::errors::{DeployError, DeployErrorKind};
use crate::orchestrator::EnvironmentInfo;
use monaco_types::{api, validate_parameter_graph, Config, ConfigType, Coordinate};
use std::collections::HashSet;

pub(crate) fn validate_environment(
    configs: &[Config],
    environment: &EnvironmentInfo,
) -> Vec<DeployError> {
    let coordinates: HashSet<&Coordinate> = configs.iter().map(|c| &c.coordinate).collect();
    let mut errors = Vec::new();

    for config in configs {
        if config.skip {
            continue;
        }
        let fail = |kind: DeployErrorKind| {
            DeployError::new(
                config.coordinate.clone(),
                &environment.name,
                &environment.group,
                kind,
            )
        };

        if config.is_platform_only() && !environment.platform {
            errors.push(fail(DeployErrorKind::Validation(format!(
                "environment {:?} has no OAuth credentials, but the configuration is platform exclusive",
                environment.name
            ))));
        }

        if let ConfigType::Classic { api: api_name } = &config.config_type {
            if api::lookup(api_name).is_none() {
                errors.push(fail(DeployErrorKind::Validation(format!(
                    "unknown API {api_name:?}"
                ))));
            }
        }

        if let Err(e) = validate_parameter_graph(config) {
            errors.push(fail(DeployErrorKind::Resolution(e.to_string())));
        }

        for reference in config.cross_config_references() {
            if !coordinates.contains(&reference.config) {
                errors.push(fail(DeployErrorKind::Validation(format!(
                    "references unknown configuration {}",
                    reference.config
                ))));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use monaco_types::{AutomationResource, Parameter, ParameterReference, Template};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn environment(platform: bool) -> EnvironmentInfo {
        EnvironmentInfo {
            name: "dev".into(),
            group: "default".into(),
            platform,
        }
    }

    fn automation_config() -> Config {
        Config {
            coordinate: Coordinate::new("p", "workflow", "nightly"),
            config_type: ConfigType::Automation {
                resource: AutomationResource::Workflow,
            },
            template: Template::new("wf.json", "{}"),
            parameters: BTreeMap::new(),
            skip: false,
            origin_object_id: None,
            environment: "dev".into(),
            group: "default".into(),
        }
    }

    #[test]
    fn test_platform_only_type_rejected_without_oauth() {
        let errors = validate_environment(&[automation_config()], &environment(false));
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, DeployErrorKind::Validation(_)));
    }

    #[test]
    fn test_platform_only_type_allowed_with_oauth() {
        let errors = validate_environment(&[automation_config()], &environment(true));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_skipped_platform_config_is_exempt() {
        let mut config = automation_config();
        config.skip = true;
        let errors = validate_environment(&[config], &environment(false));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_unknown_reference_is_reported() {
        let mut config = automation_config();
        config.parameters.insert(
            "dep".into(),
            Parameter::Reference(ParameterReference {
                config: Coordinate::new("p", "management-zone", "missing"),
                property: "id".into(),
            }),
        );
        let errors = validate_environment(&[config], &environment(true));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("p:management-zone:missing"));
    }

    #[test]
    fn test_parameter_cycle_is_reported() {
        let mut config = automation_config();
        config.parameters.insert(
            "a".into(),
            Parameter::Compound {
                format: "{{.b}}".into(),
                references: vec!["b".into()],
            },
        );
        config.parameters.insert(
            "b".into(),
            Parameter::Compound {
                format: "{{.a}}".into(),
                references: vec!["a".into()],
            },
        );
        config
            .parameters
            .insert("name".into(), Parameter::Value(json!("n")));

        let errors = validate_environment(&[config], &environment(true));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("cyclic parameter dependency"));
    }
}
