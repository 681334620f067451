//! Platform automation client
//!
//! Automation resources (workflows, business calendars, scheduling rules) are
//! addressed by a client-supplied id: the deterministic coordinate UUID when
//! the engine invents an object, or the pinned origin id. Upserting probes
//! for the id and chooses PUT or POST accordingly.

use crate::classic::DeployedObject;
use crate::errors::ClientResult;
use crate::rest::{HttpTransport, RestRequest};
use async_trait::async_trait;
use monaco_types::AutomationResource;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const AUTOMATION_API_BASE: &str = "/platform/automation/v1";

/// Automation API operations
#[async_trait]
pub trait AutomationClient: Send + Sync {
    /// Create-or-update the resource object with the given id.
    async fn upsert(
        &self,
        resource: AutomationResource,
        id: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject>;
}

fn resource_path(resource: AutomationResource) -> &'static str {
    match resource {
        AutomationResource::Workflow => "workflows",
        AutomationResource::BusinessCalendar => "business-calendars",
        AutomationResource::SchedulingRule => "scheduling-rules",
    }
}

/// HTTP implementation of [AutomationClient]
pub struct HttpAutomationClient {
    transport: Arc<dyn HttpTransport>,
}

impl HttpAutomationClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl AutomationClient for HttpAutomationClient {
    async fn upsert(
        &self,
        resource: AutomationResource,
        id: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject> {
        let base = format!("{AUTOMATION_API_BASE}/{}", resource_path(resource));
        let object_path = format!("{base}/{id}");

        // the id travels in the body on creation
        let mut body = payload.clone();
        if let Value::Object(map) = &mut body {
            map.insert("id".to_string(), json!(id));
        }

        let probe = self.transport.send(RestRequest::get(&object_path)).await?;
        if probe.status == 404 {
            debug!(%resource, id, "Creating automation object");
            self.transport
                .send(RestRequest::post(base, body))
                .await?
                .expect_success()?;
        } else {
            probe.expect_success()?;
            debug!(%resource, id, "Updating automation object");
            self.transport
                .send(RestRequest::put(object_path, body))
                .await?
                .expect_success()?;
        }

        Ok(DeployedObject {
            id: id.to_string(),
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
        let client = HttpAutomationClient::new(tenant.clone());
        let payload = json!({ "title": "nightly" });

        let first = client
            .upsert(AutomationResource::Workflow, "wf-1", &payload)
            .await
            .unwrap();
        assert_eq!(first.id, "wf-1");
        assert_eq!(tenant.count_calls("POST"), 1);

        client
            .upsert(AutomationResource::Workflow, "wf-1", &payload)
            .await
            .unwrap();
        assert_eq!(tenant.count_calls("POST"), 1);
        assert_eq!(tenant.count_calls("PUT"), 1);
    }
}
