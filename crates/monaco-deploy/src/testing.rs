//! Recording client doubles for orchestrator tests
//!
//! Every dialect trait is implemented over one shared recorder so tests can
//! assert call ordering, payload contents and verb counts, and inject
//! per-configuration failures.

use async_trait::async_trait;
use monaco_client::{
    AutomationClient, BucketClient, ClassicClient, ClassicValue, ClientError, ClientResult,
    ClientSet, DeployedObject, SettingsClient, SettingsObject, SettingsObjectSummary,
};
use monaco_types::{AutomationResource, ClassicEndpoint};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
    payloads: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
}

/// Shared recording implementation of every dialect client
#[derive(Clone, Default)]
pub(crate) struct RecordingClients {
    recorder: Arc<Recorder>,
}

impl RecordingClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upsert for this identifier fail with a 400.
    pub fn fail_on(&self, identifier: &str) {
        self.recorder
            .failing
            .lock()
            .unwrap()
            .insert(identifier.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.recorder.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.recorder.calls.lock().unwrap().clone()
    }

    pub fn payload_for(&self, identifier: &str) -> Option<Value> {
        self.recorder.payloads.lock().unwrap().get(identifier).cloned()
    }

    pub fn client_set(&self) -> ClientSet {
        ClientSet {
            classic: Arc::new(self.clone()),
            settings: Arc::new(self.clone()),
            automation: Some(Arc::new(self.clone())),
            bucket: Some(Arc::new(self.clone())),
        }
    }

    fn record(&self, identifier: &str, payload: &Value) -> ClientResult<()> {
        self.recorder
            .calls
            .lock()
            .unwrap()
            .push(identifier.to_string());
        self.recorder
            .payloads
            .lock()
            .unwrap()
            .insert(identifier.to_string(), payload.clone());
        if self.recorder.failing.lock().unwrap().contains(identifier) {
            return Err(ClientError::Api {
                status: 400,
                message: format!("server rejected {identifier}"),
                correlation_id: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ClassicClient for RecordingClients {
    async fn list(&self, _api: &ClassicEndpoint) -> ClientResult<Vec<ClassicValue>> {
        Ok(Vec::new())
    }

    async fn upsert_by_name(
        &self,
        api: &ClassicEndpoint,
        name: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject> {
        self.record(name, payload)?;
        Ok(DeployedObject {
            id: format!("{}-{name}-id", api.name),
            name: Some(name.to_string()),
        })
    }

    async fn upsert_by_non_unique_name_and_id(
        &self,
        _api: &ClassicEndpoint,
        object_id: &str,
        name: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject> {
        self.record(name, payload)?;
        Ok(DeployedObject {
            id: object_id.to_string(),
            name: Some(name.to_string()),
        })
    }
}

#[async_trait]
impl SettingsClient for RecordingClients {
    async fn list(&self, _schema_id: &str) -> ClientResult<Vec<SettingsObjectSummary>> {
        Ok(Vec::new())
    }

    async fn upsert(&self, object: SettingsObject) -> ClientResult<DeployedObject> {
        self.record(&object.coordinate.config_id, &object.content)?;
        Ok(DeployedObject {
            id: format!("obj-{}", object.coordinate.config_id),
            name: None,
        })
    }
}

#[async_trait]
impl AutomationClient for RecordingClients {
    async fn upsert(
        &self,
        _resource: AutomationResource,
        id: &str,
        payload: &Value,
    ) -> ClientResult<DeployedObject> {
        self.record(id, payload)?;
        Ok(DeployedObject {
            id: id.to_string(),
            name: None,
        })
    }
}

#[async_trait]
impl BucketClient for RecordingClients {
    async fn upsert(&self, bucket_name: &str, payload: &Value) -> ClientResult<DeployedObject> {
        self.record(bucket_name, payload)?;
        Ok(DeployedObject {
            id: bucket_name.to_string(),
            name: None,
        })
    }
}
