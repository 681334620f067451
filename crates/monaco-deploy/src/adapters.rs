//! Dialect adapters
//!
//! [deploy_config] is the single "deploy one configuration" operation: it
//! resolves the configuration just in time against the entity map, validates
//! the rendered payload, and dispatches to the client of the matching API
//! dialect. The adapter is selected by matching on the configuration's type
//! tag.

use crate::errors::{DeployError, DeployErrorKind};
use crate::orchestrator::DeployOptions;
use monaco_client::{ClientSet, SettingsObject};
use monaco_types::{
    api, ids, resolve_config, Config, ConfigType, EntityMap, ResolvedEntity, ID_PROPERTY,
};
use serde_json::Value;

pub(crate) async fn deploy_config(
    clients: &ClientSet,
    config: &Config,
    entities: &EntityMap,
    options: &DeployOptions,
) -> Result<ResolvedEntity, DeployError> {
    let fail = |kind: DeployErrorKind| {
        DeployError::new(
            config.coordinate.clone(),
            &config.environment,
            &config.group,
            kind,
        )
    };

    let resolved = {
        let snapshot = entities.read().await;
        resolve_config(config, &snapshot)
            .map_err(|e| fail(DeployErrorKind::Resolution(e.to_string())))?
    };

    let payload: Value = serde_json::from_str(&resolved.payload)
        .map_err(|e| fail(DeployErrorKind::InvalidJson(e.to_string())))?;

    let deployed = match &config.config_type {
        ConfigType::Classic { api: api_name } => {
            let endpoint = api::lookup(api_name).ok_or_else(|| {
                fail(DeployErrorKind::Validation(format!("unknown API {api_name:?}")))
            })?;
            // the resolver guarantees a non-empty name for classic dialects
            let name = resolved.entity_name.clone().unwrap_or_default();

            if endpoint.non_unique_name {
                let object_id = match &config.origin_object_id {
                    Some(pinned) => pinned.clone(),
                    None => deterministic_object_id(config, options),
                };
                clients
                    .classic
                    .upsert_by_non_unique_name_and_id(endpoint, &object_id, &name, &payload)
                    .await
            } else {
                clients.classic.upsert_by_name(endpoint, &name, &payload).await
            }
        }

        ConfigType::Settings {
            schema_id,
            schema_version,
        } => {
            clients
                .settings
                .upsert(SettingsObject {
                    coordinate: config.coordinate.clone(),
                    schema_id: schema_id.clone(),
                    schema_version: schema_version.clone(),
                    scope: resolved.scope.clone().unwrap_or_default(),
                    content: payload,
                    origin_object_id: config.origin_object_id.clone(),
                })
                .await
        }

        ConfigType::Automation { resource } => {
            let client = clients.automation.as_ref().ok_or_else(|| {
                fail(DeployErrorKind::Validation(
                    "environment has no platform credentials".to_string(),
                ))
            })?;
            let id = match &config.origin_object_id {
                Some(pinned) => pinned.clone(),
                None => deterministic_object_id(config, options),
            };
            client.upsert(*resource, &id, &payload).await
        }

        ConfigType::Bucket => {
            let client = clients.bucket.as_ref().ok_or_else(|| {
                fail(DeployErrorKind::Validation(
                    "environment has no platform credentials".to_string(),
                ))
            })?;
            let bucket_name = format!(
                "{}_{}",
                config.coordinate.project, config.coordinate.config_id
            );
            client.upsert(&bucket_name, &payload).await
        }
    }
    .map_err(|e| {
        fail(DeployErrorKind::Client {
            status: e.status(),
            message: e.to_string(),
        })
    })?;

    let mut properties = resolved.properties;
    properties.insert(ID_PROPERTY.to_string(), Value::String(deployed.id.clone()));

    Ok(ResolvedEntity {
        coordinate: config.coordinate.clone(),
        entity_name: resolved
            .entity_name
            .unwrap_or_else(|| config.coordinate.config_id.clone()),
        properties,
        skip: false,
    })
}

fn deterministic_object_id(config: &Config, options: &DeployOptions) -> String {
    ids::generate_uuid_from_coordinate_with(
        &config.coordinate.project,
        &config.coordinate.config_id,
        options.consistent_uuid_generation,
    )
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingClients;
    use monaco_types::{Coordinate, Parameter, Template};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn classic_config(template: &str) -> Config {
        Config {
            coordinate: Coordinate::new("proj", "management-zone", "zone"),
            config_type: ConfigType::Classic {
                api: "management-zone".into(),
            },
            template: Template::new("zone.json", template),
            parameters: BTreeMap::from([(
                "name".to_string(),
                Parameter::Value(json!("Zone")),
            )]),
            skip: false,
            origin_object_id: None,
            environment: "dev".into(),
            group: "default".into(),
        }
    }

    #[tokio::test]
    async fn test_successful_deploy_publishes_id_property() {
        let clients = RecordingClients::new();
        let entities = EntityMap::new();
        let config = classic_config(r#"{ "name": "{{.name}}" }"#);

        let entity = deploy_config(
            &clients.client_set(),
            &config,
            &entities,
            &DeployOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(entity.entity_name, "Zone");
        assert!(entity.properties.contains_key(ID_PROPERTY));
        assert!(!entity.skip);
    }

    #[tokio::test]
    async fn test_invalid_json_payload_is_a_deploy_error() {
        let clients = RecordingClients::new();
        let entities = EntityMap::new();
        let config = classic_config(r#"{ not json at all"#);

        let err = deploy_config(
            &clients.client_set(),
            &config,
            &entities,
            &DeployOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err.kind, DeployErrorKind::InvalidJson(_)));
        assert_eq!(clients.call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_unique_api_uses_deterministic_uuid() {
        let clients = RecordingClients::new();
        let entities = EntityMap::new();
        let mut config = classic_config(r#"{ "name": "{{.name}}" }"#);
        config.coordinate = Coordinate::new("proj", "alerting-profile", "profile");
        config.config_type = ConfigType::Classic {
            api: "alerting-profile".into(),
        };

        let entity = deploy_config(
            &clients.client_set(),
            &config,
            &entities,
            &DeployOptions::default(),
        )
        .await
        .unwrap();

        let expected = ids::generate_uuid_from_coordinate("proj", "profile").to_string();
        assert_eq!(
            entity.properties[ID_PROPERTY],
            Value::String(expected)
        );
    }

    #[tokio::test]
    async fn test_origin_object_id_pins_the_target() {
        let clients = RecordingClients::new();
        let entities = EntityMap::new();
        let mut config = classic_config(r#"{ "name": "{{.name}}" }"#);
        config.coordinate = Coordinate::new("proj", "alerting-profile", "profile");
        config.config_type = ConfigType::Classic {
            api: "alerting-profile".into(),
        };
        config.origin_object_id = Some("pinned-id".to_string());

        let entity = deploy_config(
            &clients.client_set(),
            &config,
            &entities,
            &DeployOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(entity.properties[ID_PROPERTY], Value::String("pinned-id".into()));
    }
}
