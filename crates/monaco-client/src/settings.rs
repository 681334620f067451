//! Settings 2.0 client
//!
//! A settings object is identified to the server by
//! `(schemaId, externalId, scope)`. Upserting walks a small state machine:
//!
//! 1. a user-pinned `originObjectId` that exists wins outright
//! 2. an object matching the coordinate's external id is updated
//! 3. an object matching the *legacy* external id (generated without the
//!    project component) is adopted; the update rewrites its external id to
//!    the current form, so the migration runs exactly once per object
//! 4. otherwise a new object is created
//!
//! A failed rewrite in step 3 surfaces as a regular deploy error and is
//! retried by the next run; falling back to creation would duplicate the
//! configuration.

use crate::classic::DeployedObject;
use crate::errors::{ClientError, ClientResult};
use crate::rest::{HttpTransport, RestRequest};
use async_trait::async_trait;
use monaco_types::ids::{generate_external_id, generate_legacy_external_id};
use monaco_types::Coordinate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

const SETTINGS_API: &str = "/api/v2/settings/objects";
const LIST_PAGE_SIZE: &str = "500";

/// Payload of one settings upsert
#[derive(Debug, Clone)]
pub struct SettingsObject {
    pub coordinate: Coordinate,
    pub schema_id: String,
    pub schema_version: Option<String>,
    /// Target scope; the literal `environment` means tenant-wide
    pub scope: String,
    /// Rendered JSON value of the object
    pub content: Value,
    /// User-pinned object id, preferred over identity lookups
    pub origin_object_id: Option<String>,
}

/// Identity fields of a listed settings object
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsObjectSummary {
    pub object_id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Settings 2.0 operations
#[async_trait]
pub trait SettingsClient: Send + Sync {
    /// List identity fields of every object of the schema.
    async fn list(&self, schema_id: &str) -> ClientResult<Vec<SettingsObjectSummary>>;

    /// Create-or-update an object, reconciling identity as described above.
    async fn upsert(&self, object: SettingsObject) -> ClientResult<DeployedObject>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<SettingsObjectSummary>,
    #[serde(default)]
    next_page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedObject {
    object_id: String,
}

/// HTTP implementation of [SettingsClient]
pub struct HttpSettingsClient {
    transport: Arc<dyn HttpTransport>,
    /// When disabled, step 3 of the state machine is skipped entirely
    migrate_legacy_external_ids: bool,
}

impl HttpSettingsClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            migrate_legacy_external_ids: true,
        }
    }

    pub fn with_legacy_migration(mut self, enabled: bool) -> Self {
        self.migrate_legacy_external_ids = enabled;
        self
    }

    async fn update(
        &self,
        object_id: &str,
        external_id: &str,
        object: &SettingsObject,
    ) -> ClientResult<DeployedObject> {
        let mut body = json!({
            "externalId": external_id,
            "value": object.content,
        });
        if let Some(version) = &object.schema_version {
            body["schemaVersion"] = json!(version);
        }

        self.transport
            .send(RestRequest::put(format!("{SETTINGS_API}/{object_id}"), body))
            .await?
            .expect_success()?;

        Ok(DeployedObject {
            id: object_id.to_string(),
            name: None,
        })
    }

    async fn create(
        &self,
        external_id: &str,
        object: &SettingsObject,
    ) -> ClientResult<DeployedObject> {
        let mut entry = json!({
            "schemaId": object.schema_id,
            "scope": object.scope,
            "externalId": external_id,
            "value": object.content,
        });
        if let Some(version) = &object.schema_version {
            entry["schemaVersion"] = json!(version);
        }

        let response = self
            .transport
            .send(RestRequest::post(SETTINGS_API, Value::Array(vec![entry])))
            .await?
            .expect_success()?;

        let created: Vec<CreatedObject> = response.json()?;
        let object_id = created
            .into_iter()
            .next()
            .map(|c| c.object_id)
            .ok_or_else(|| ClientError::UnexpectedResponse {
                url: SETTINGS_API.to_string(),
                reason: "object creation returned an empty result list".to_string(),
            })?;

        Ok(DeployedObject {
            id: object_id,
            name: None,
        })
    }
}

#[async_trait]
impl SettingsClient for HttpSettingsClient {
    async fn list(&self, schema_id: &str) -> ClientResult<Vec<SettingsObjectSummary>> {
        let mut objects = Vec::new();
        let mut next_page_key: Option<String> = None;

        loop {
            let request = match &next_page_key {
                None => RestRequest::get(SETTINGS_API)
                    .with_query("schemaIds", schema_id)
                    .with_query("fields", "objectId,externalId,scope")
                    .with_query("pageSize", LIST_PAGE_SIZE),
                Some(key) => RestRequest::get(SETTINGS_API).with_query("nextPageKey", key.clone()),
            };

            let response = self.transport.send(request).await?.expect_success()?;
            let page: ListPage = response.json()?;
            objects.extend(page.items);

            match page.next_page_key {
                Some(key) => next_page_key = Some(key),
                None => return Ok(objects),
            }
        }
    }

    async fn upsert(&self, object: SettingsObject) -> ClientResult<DeployedObject> {
        let external_id = generate_external_id(&object.coordinate);
        let existing = self.list(&object.schema_id).await?;

        if let Some(origin) = &object.origin_object_id {
            if existing.iter().any(|o| &o.object_id == origin) {
                debug!(coordinate = %object.coordinate, origin, "Updating user-pinned object");
                return self.update(origin, &external_id, &object).await;
            }
        }

        if let Some(found) = existing
            .iter()
            .find(|o| o.external_id.as_deref() == Some(external_id.as_str()))
        {
            debug!(
                coordinate = %object.coordinate,
                object_id = %found.object_id,
                "Updating object matched by external id"
            );
            return self.update(&found.object_id, &external_id, &object).await;
        }

        if self.migrate_legacy_external_ids {
            let legacy_id = generate_legacy_external_id(
                &object.coordinate.config_type,
                &object.coordinate.config_id,
            );
            if let Some(found) = existing
                .iter()
                .find(|o| o.external_id.as_deref() == Some(legacy_id.as_str()))
            {
                info!(
                    coordinate = %object.coordinate,
                    object_id = %found.object_id,
                    "Migrating object from legacy external id"
                );
                return self.update(&found.object_id, &external_id, &object).await;
            }
        }

        debug!(coordinate = %object.coordinate, "Creating new settings object");
        self.create(&external_id, &object).await
    }
}
