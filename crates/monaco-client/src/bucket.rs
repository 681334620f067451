//! Grail bucket definition client

use crate::classic::DeployedObject;
use crate::errors::ClientResult;
use crate::rest::{HttpTransport, RestRequest};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const BUCKET_API: &str = "/platform/storage/management/v1/bucket-definitions";

/// Bucket definition operations
#[async_trait]
pub trait BucketClient: Send + Sync {
    /// Create-or-update the bucket definition named `bucket_name`.
    async fn upsert(&self, bucket_name: &str, payload: &Value) -> ClientResult<DeployedObject>;
}

/// HTTP implementation of [BucketClient]
pub struct HttpBucketClient {
    transport: Arc<dyn HttpTransport>,
}

impl HttpBucketClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl BucketClient for HttpBucketClient {
    async fn upsert(&self, bucket_name: &str, payload: &Value) -> ClientResult<DeployedObject> {
        let object_path = format!("{BUCKET_API}/{bucket_name}");

        let mut body = payload.clone();
        if let Value::Object(map) = &mut body {
            map.insert("bucketName".to_string(), json!(bucket_name));
        }

        let probe = self.transport.send(RestRequest::get(&object_path)).await?;
        if probe.status == 404 {
            debug!(bucket_name, "Creating bucket definition");
            self.transport
                .send(RestRequest::post(BUCKET_API, body))
                .await?
                .expect_success()?;
        } else {
            probe.expect_success()?;
            debug!(bucket_name, "Updating bucket definition");
            self.transport
                .send(RestRequest::put(object_path, body))
                .await?
                .expect_success()?;
        }

        Ok(DeployedObject {
            id: bucket_name.to_string(),
            name: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTenant;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let tenant = Arc::new(FakeTenant::new());
        let client = HttpBucketClient::new(tenant.clone());
        let payload = json!({ "retentionDays": 35 });

        client.upsert("infra_logs", &payload).await.unwrap();
        client.upsert("infra_logs", &payload).await.unwrap();

        assert_eq!(tenant.count_calls("POST"), 1);
        assert_eq!(tenant.count_calls("PUT"), 1);
    }
}
