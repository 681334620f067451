//! Classic configuration API client
//!
//! Two upsert strategies live here. Unique-name APIs are matched by display
//! name: update on a hit, create on a miss. Non-unique-name APIs keep a
//! stable identity by controlling the object UUID:
//!
//! | objects sharing the name | action                                   |
//! |--------------------------|------------------------------------------|
//! | zero                     | PUT the deterministic coordinate UUID    |
//! | one                      | PUT the existing id (adopt it)           |
//! | two or more              | PUT the deterministic UUID               |
//!
//! Adopting a single pre-existing object avoids creating a duplicate; with
//! several candidates the name is ambiguous and the engine takes ownership of
//! the one id it can address deterministically.

use crate::errors::{ClientError, ClientResult};
use crate::rest::{HttpTransport, RestRequest, RestResponse};
use async_trait::async_trait;
use monaco_types::ClassicEndpoint;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const CONFIG_API_BASE: &str = "/api/config/v1";

/// Identity of an object as listed by a classic API
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClassicValue {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Result of a successful upsert on any dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedObject {
    /// Server-side id actually written
    pub id: String,
    /// Display name, for dialects that have one
    pub name: Option<String>,
}

/// Classic config API operations
#[async_trait]
pub trait ClassicClient: Send + Sync {
    /// List existing objects of the API.
    async fn list(&self, api: &ClassicEndpoint) -> ClientResult<Vec<ClassicValue>>;

    /// Upsert by unique display name.
    async fn upsert_by_name(
        &self,
        api: &ClassicEndpoint,
        name: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject>;

    /// Upsert a non-unique-name object under the given deterministic id.
    async fn upsert_by_non_unique_name_and_id(
        &self,
        api: &ClassicEndpoint,
        object_id: &str,
        name: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject>;
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    values: Vec<ClassicValue>,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

/// HTTP implementation of [ClassicClient]
pub struct HttpClassicClient {
    transport: Arc<dyn HttpTransport>,
}

impl HttpClassicClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn api_path(api: &ClassicEndpoint) -> String {
        format!("{CONFIG_API_BASE}/{}", api.path)
    }

    async fn update(
        &self,
        api: &ClassicEndpoint,
        id: &str,
        name: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject> {
        let path = format!("{}/{id}", Self::api_path(api));
        self.transport
            .send(RestRequest::put(path, payload.clone()))
            .await?
            .expect_success()?;
        Ok(DeployedObject {
            id: id.to_string(),
            name: Some(name.to_string()),
        })
    }

    async fn create(
        &self,
        api: &ClassicEndpoint,
        name: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject> {
        let path = Self::api_path(api);
        let response = self
            .transport
            .send(RestRequest::post(path.clone(), payload.clone()))
            .await?
            .expect_success()?;
        let created: CreatedResponse = parse_entity(&response, &path)?;
        Ok(DeployedObject {
            id: created.id,
            name: Some(name.to_string()),
        })
    }
}

#[async_trait]
impl ClassicClient for HttpClassicClient {
    async fn list(&self, api: &ClassicEndpoint) -> ClientResult<Vec<ClassicValue>> {
        let response = self
            .transport
            .send(RestRequest::get(Self::api_path(api)))
            .await?
            .expect_success()?;
        let parsed: ListResponse = response.json()?;
        Ok(parsed.values)
    }

    async fn upsert_by_name(
        &self,
        api: &ClassicEndpoint,
        name: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject> {
        if api.single_configuration {
            // the API holds one tenant-wide object; no name lookup
            self.transport
                .send(RestRequest::put(Self::api_path(api), payload.clone()))
                .await?
                .expect_success()?;
            return Ok(DeployedObject {
                id: api.name.to_string(),
                name: Some(name.to_string()),
            });
        }

        let existing = self.list(api).await?;
        let matching: Vec<&ClassicValue> =
            existing.iter().filter(|v| v.name == name).collect();

        match matching.as_slice() {
            [] => {
                debug!(api = api.name, name, "No existing object, creating");
                self.create(api, name, payload).await
            }
            [single] => {
                debug!(api = api.name, name, id = %single.id, "Updating existing object");
                self.update(api, &single.id, name, payload).await
            }
            _ => Err(ClientError::UnexpectedResponse {
                url: Self::api_path(api),
                reason: format!(
                    "found {} configs with name {name:?} on unique-name API {}",
                    matching.len(),
                    api.name
                ),
            }),
        }
    }

    async fn upsert_by_non_unique_name_and_id(
        &self,
        api: &ClassicEndpoint,
        object_id: &str,
        name: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject> {
        let existing = self.list(api).await?;
        let matching: Vec<&ClassicValue> =
            existing.iter().filter(|v| v.name == name).collect();

        let target = match matching.as_slice() {
            // inaugurate the stable id
            [] => object_id,
            // exactly one pre-existing match: adopt it instead of duplicating
            [single] => single.id.as_str(),
            // ambiguous; own the one id that is deterministically addressable
            _ => object_id,
        };

        debug!(
            api = api.name,
            name,
            target,
            candidates = matching.len(),
            "Upserting non-unique-name object"
        );
        self.update(api, target, name, payload).await
    }
}

fn parse_entity<T: serde::de::DeserializeOwned>(
    response: &RestResponse,
    url: &str,
) -> ClientResult<T> {
    response.json().map_err(|_| ClientError::UnexpectedResponse {
        url: url.to_string(),
        reason: format!("could not read entity from response: {}", response.text()),
    })
}
