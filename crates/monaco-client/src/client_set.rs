//! Per-environment client facade
//!
//! A [ClientSet] bundles one client per API dialect for a single environment.
//! Token-only environments get no platform clients; validation upstream
//! guarantees no automation or bucket configuration reaches them. The
//! dry-run variant swaps every client for a recording stub that fabricates
//! deterministic placeholder ids and never touches the network.

use crate::auth::{Auth, OAuthConfig};
use crate::automation::{AutomationClient, HttpAutomationClient};
use crate::bucket::{BucketClient, HttpBucketClient};
use crate::classic::{ClassicClient, ClassicValue, DeployedObject, HttpClassicClient};
use crate::errors::ClientResult;
use crate::rest::ReqwestTransport;
use crate::settings::{HttpSettingsClient, SettingsClient, SettingsObject, SettingsObjectSummary};
use async_trait::async_trait;
use monaco_types::{AutomationResource, ClassicEndpoint};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Options for building a real [ClientSet]
#[derive(Debug, Clone)]
pub struct ClientSetOptions {
    pub request_timeout: Duration,
    pub migrate_legacy_external_ids: bool,
}

impl Default for ClientSetOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            migrate_legacy_external_ids: true,
        }
    }
}

/// The dialect clients of one environment
#[derive(Clone)]
pub struct ClientSet {
    pub classic: Arc<dyn ClassicClient>,
    pub settings: Arc<dyn SettingsClient>,
    /// Present only on platform (OAuth) environments
    pub automation: Option<Arc<dyn AutomationClient>>,
    pub bucket: Option<Arc<dyn BucketClient>>,
}

impl ClientSet {
    /// Build HTTP clients for one environment.
    pub fn create(
        base_url: &str,
        token: &str,
        oauth: Option<OAuthConfig>,
        options: ClientSetOptions,
    ) -> ClientResult<Self> {
        let token_transport = Arc::new(ReqwestTransport::new(
            base_url,
            Auth::Token(token.to_string()),
            options.request_timeout,
        )?);

        let (automation, bucket) = match oauth {
            None => (None, None),
            Some(config) => {
                let platform_transport = Arc::new(ReqwestTransport::new(
                    base_url,
                    Auth::oauth(config)?,
                    options.request_timeout,
                )?);
                (
                    Some(Arc::new(HttpAutomationClient::new(platform_transport.clone()))
                        as Arc<dyn AutomationClient>),
                    Some(Arc::new(HttpBucketClient::new(platform_transport))
                        as Arc<dyn BucketClient>),
                )
            }
        };

        Ok(Self {
            classic: Arc::new(HttpClassicClient::new(token_transport.clone())),
            settings: Arc::new(
                HttpSettingsClient::new(token_transport)
                    .with_legacy_migration(options.migrate_legacy_external_ids),
            ),
            automation,
            bucket,
        })
    }

    /// A set of recording stubs for dry runs. Every dialect is available so
    /// validation can cover platform configurations too.
    pub fn dry_run() -> Self {
        let stub = Arc::new(DryRunClient);
        Self {
            classic: stub.clone(),
            settings: stub.clone(),
            automation: Some(stub.clone()),
            bucket: Some(stub),
        }
    }
}

/// Stub client used for dry runs: answers every upsert with a deterministic
/// placeholder id derived from the request, without network I/O.
pub struct DryRunClient;

#[async_trait]
impl ClassicClient for DryRunClient {
    async fn list(&self, _api: &ClassicEndpoint) -> ClientResult<Vec<ClassicValue>> {
        Ok(Vec::new())
    }

    async fn upsert_by_name(
        &self,
        api: &ClassicEndpoint,
        name: &str,
        _payload: &Value,
    ) -> ClientResult<DeployedObject> {
        Ok(DeployedObject {
            id: format!("{}--{name}", api.name),
            name: Some(name.to_string()),
        })
    }

    async fn upsert_by_non_unique_name_and_id(
        &self,
        _api: &ClassicEndpoint,
        object_id: &str,
        name: &str,
        _payload: &Value,
    ) -> ClientResult<DeployedObject> {
        Ok(DeployedObject {
            id: object_id.to_string(),
            name: Some(name.to_string()),
        })
    }
}

#[async_trait]
impl SettingsClient for DryRunClient {
    async fn list(&self, _schema_id: &str) -> ClientResult<Vec<SettingsObjectSummary>> {
        Ok(Vec::new())
    }

    async fn upsert(&self, object: SettingsObject) -> ClientResult<DeployedObject> {
        Ok(DeployedObject {
            id: object.coordinate.to_string(),
            name: None,
        })
    }
}

#[async_trait]
impl AutomationClient for DryRunClient {
    async fn upsert(
        &self,
        _resource: AutomationResource,
        id: &str,
        _payload: &Value,
    ) -> ClientResult<DeployedObject> {
        Ok(DeployedObject {
            id: id.to_string(),
            name: None,
        })
    }
}

#[async_trait]
impl BucketClient for DryRunClient {
    async fn upsert(&self, bucket_name: &str, _payload: &Value) -> ClientResult<DeployedObject> {
        Ok(DeployedObject {
            id: bucket_name.to_string(),
            name: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monaco_types::Coordinate;
    use serde_json::json;

    #[tokio::test]
    async fn test_dry_run_set_has_every_dialect() {
        let set = ClientSet::dry_run();
        assert!(set.automation.is_some());
        assert!(set.bucket.is_some());
    }

    #[tokio::test]
    async fn test_dry_run_ids_are_deterministic() {
        let set = ClientSet::dry_run();
        let object = SettingsObject {
            coordinate: Coordinate::new("p", "builtin:tags", "c"),
            schema_id: "builtin:tags".into(),
            schema_version: None,
            scope: "environment".into(),
            content: json!({}),
            origin_object_id: None,
        };
        let a = set.settings.upsert(object.clone()).await.unwrap();
        let b = set.settings.upsert(object).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, "p:builtin:tags:c");
    }
}
