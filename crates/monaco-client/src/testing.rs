//! In-memory tenant double for client tests
//!
//! Implements [HttpTransport] over a small in-memory object store so the
//! upsert strategies can be exercised end to end, including verb counting,
//! without a network.

use crate::errors::ClientResult;
use crate::rest::{HttpTransport, RestRequest, RestResponse};
use async_trait::async_trait;
use monaco_types::{api, ClassicEndpoint};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

const CLASSIC_BASE: &str = "/api/config/v1/";
const SETTINGS_BASE: &str = "/api/v2/settings/objects";
const AUTOMATION_BASE: &str = "/platform/automation/v1/";
const BUCKET_BASE: &str = "/platform/storage/management/v1/bucket-definitions";

#[derive(Debug, Clone)]
struct StoredSetting {
    schema_id: String,
    object_id: String,
    external_id: String,
    scope: String,
}

pub struct FakeTenant {
    calls: Mutex<Vec<(String, String)>>,
    classic: Mutex<HashMap<String, BTreeMap<String, String>>>,
    settings: Mutex<Vec<StoredSetting>>,
    automation: Mutex<BTreeMap<String, Value>>,
    buckets: Mutex<BTreeMap<String, Value>>,
    settings_page_size: AtomicUsize,
    pending_settings_query: Mutex<Option<String>>,
    sequence: AtomicU64,
}

impl FakeTenant {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            classic: Mutex::new(HashMap::new()),
            settings: Mutex::new(Vec::new()),
            automation: Mutex::new(BTreeMap::new()),
            buckets: Mutex::new(BTreeMap::new()),
            settings_page_size: AtomicUsize::new(usize::MAX),
            pending_settings_query: Mutex::new(None),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn count_calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub fn seed_classic(&self, endpoint: &ClassicEndpoint, id: &str, name: &str) {
        self.classic
            .lock()
            .unwrap()
            .entry(endpoint.path.to_string())
            .or_default()
            .insert(id.to_string(), name.to_string());
    }

    pub fn classic_object_count(&self, endpoint: &ClassicEndpoint) -> usize {
        self.classic
            .lock()
            .unwrap()
            .get(endpoint.path)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn seed_setting(&self, schema_id: &str, object_id: &str, external_id: &str, scope: &str) {
        self.settings.lock().unwrap().push(StoredSetting {
            schema_id: schema_id.to_string(),
            object_id: object_id.to_string(),
            external_id: external_id.to_string(),
            scope: scope.to_string(),
        });
    }

    pub fn settings_object_count(&self, schema_id: &str) -> usize {
        self.settings
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.schema_id == schema_id)
            .count()
    }

    pub fn settings_objects_with_external_id(&self, schema_id: &str, external_id: &str) -> usize {
        self.settings
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.schema_id == schema_id && s.external_id == external_id)
            .count()
    }

    pub fn set_settings_page_size(&self, size: usize) {
        self.settings_page_size.store(size, Ordering::SeqCst);
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.sequence.fetch_add(1, Ordering::SeqCst))
    }

    fn ok(body: Value) -> RestResponse {
        RestResponse {
            status: 200,
            body: serde_json::to_vec(&body).unwrap(),
            correlation_id: None,
        }
    }

    fn not_found() -> RestResponse {
        RestResponse {
            status: 404,
            body: b"{}".to_vec(),
            correlation_id: None,
        }
    }

    // ---- classic -----------------------------------------------------------

    fn classic_request(&self, request: &RestRequest, remainder: &str) -> RestResponse {
        // resolve which known api the path addresses; single-configuration
        // APIs are PUT without a trailing object id
        let (api_path, object_id) = match api::known_apis()
            .iter()
            .find(|a| remainder == a.path)
        {
            Some(a) => (a.path.to_string(), None),
            None => match api::known_apis()
                .iter()
                .find(|a| remainder.starts_with(&format!("{}/", a.path)))
            {
                Some(a) => (
                    a.path.to_string(),
                    Some(remainder[a.path.len() + 1..].to_string()),
                ),
                None => return Self::not_found(),
            },
        };

        let mut store = self.classic.lock().unwrap();
        let objects = store.entry(api_path).or_default();

        match (request.method.as_str(), object_id) {
            ("GET", None) => {
                let values: Vec<Value> = objects
                    .iter()
                    .map(|(id, name)| json!({ "id": id, "name": name }))
                    .collect();
                Self::ok(json!({ "values": values }))
            }
            ("POST", None) => {
                let id = self.next_id("server");
                let name = payload_name(request);
                objects.insert(id.clone(), name.clone());
                Self::ok(json!({ "id": id, "name": name }))
            }
            ("PUT", Some(id)) => {
                let name = payload_name(request);
                objects.insert(id.clone(), name.clone());
                Self::ok(json!({ "id": id, "name": name }))
            }
            // single-configuration PUT
            ("PUT", None) => Self::ok(json!({})),
            _ => Self::not_found(),
        }
    }

    // ---- settings ----------------------------------------------------------

    fn settings_request(&self, request: &RestRequest, object_id: Option<&str>) -> RestResponse {
        match (request.method.as_str(), object_id) {
            ("GET", None) => {
                let schema = match query_value(request, "schemaIds") {
                    Some(s) => {
                        *self.pending_settings_query.lock().unwrap() = Some(s.clone());
                        s
                    }
                    // pagination requests carry only the nextPageKey
                    None => match self.pending_settings_query.lock().unwrap().clone() {
                        Some(s) => s,
                        None => return Self::not_found(),
                    },
                };
                let offset = query_value(request, "nextPageKey")
                    .and_then(|k| k.strip_prefix("page-").map(str::to_string))
                    .and_then(|k| k.parse::<usize>().ok())
                    .unwrap_or(0);

                let store = self.settings.lock().unwrap();
                let matching: Vec<&StoredSetting> =
                    store.iter().filter(|s| s.schema_id == schema).collect();

                let page_size = self.settings_page_size.load(Ordering::SeqCst);
                let page: Vec<Value> = matching
                    .iter()
                    .skip(offset)
                    .take(page_size)
                    .map(|s| {
                        json!({
                            "objectId": s.object_id,
                            "externalId": s.external_id,
                            "scope": s.scope,
                        })
                    })
                    .collect();

                let mut body = json!({ "items": page });
                let next_offset = offset.saturating_add(page_size);
                if next_offset < matching.len() {
                    body["nextPageKey"] = json!(format!("page-{next_offset}"));
                }
                Self::ok(body)
            }
            ("POST", None) => {
                let entries = match &request.body {
                    Some(Value::Array(entries)) => entries.clone(),
                    _ => return Self::not_found(),
                };
                let mut created = Vec::new();
                let mut store = self.settings.lock().unwrap();
                for entry in entries {
                    let object_id = self.next_id("obj");
                    store.push(StoredSetting {
                        schema_id: string_field(&entry, "schemaId"),
                        object_id: object_id.clone(),
                        external_id: string_field(&entry, "externalId"),
                        scope: string_field(&entry, "scope"),
                    });
                    created.push(json!({ "objectId": object_id }));
                }
                Self::ok(Value::Array(created))
            }
            ("PUT", Some(id)) => {
                let mut store = self.settings.lock().unwrap();
                match store.iter_mut().find(|s| s.object_id == id) {
                    Some(stored) => {
                        if let Some(body) = &request.body {
                            let external_id = string_field(body, "externalId");
                            if !external_id.is_empty() {
                                stored.external_id = external_id;
                            }
                        }
                        Self::ok(json!({ "objectId": id }))
                    }
                    None => Self::not_found(),
                }
            }
            _ => Self::not_found(),
        }
    }

    // ---- platform ----------------------------------------------------------

    fn keyed_store_request(
        &self,
        store: &Mutex<BTreeMap<String, Value>>,
        request: &RestRequest,
        key: Option<&str>,
    ) -> RestResponse {
        let mut objects = store.lock().unwrap();
        match (request.method.as_str(), key) {
            ("GET", Some(k)) => match objects.get(k) {
                Some(v) => Self::ok(v.clone()),
                None => Self::not_found(),
            },
            ("POST", None) => {
                let body = request.body.clone().unwrap_or(json!({}));
                let key = body
                    .get("id")
                    .or_else(|| body.get("bucketName"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| self.next_id("platform"));
                objects.insert(key.clone(), body);
                Self::ok(json!({ "id": key }))
            }
            ("PUT", Some(k)) => {
                objects.insert(k.to_string(), request.body.clone().unwrap_or(json!({})));
                Self::ok(json!({ "id": k }))
            }
            _ => Self::not_found(),
        }
    }
}

fn payload_name(request: &RestRequest) -> String {
    let body = request.body.as_ref().cloned().unwrap_or(json!({}));
    for key in ["name", "displayName"] {
        if let Some(name) = body.get(key).and_then(Value::as_str) {
            return name.to_string();
        }
    }
    String::new()
}

fn query_value(request: &RestRequest, key: &str) -> Option<String> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl HttpTransport for FakeTenant {
    async fn send(&self, request: RestRequest) -> ClientResult<RestResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((request.method.to_string(), request.path.clone()));

        let path = request.path.clone();

        if let Some(remainder) = path.strip_prefix(CLASSIC_BASE) {
            return Ok(self.classic_request(&request, remainder));
        }

        if let Some(remainder) = path.strip_prefix(SETTINGS_BASE) {
            let object_id = remainder.strip_prefix('/');
            return Ok(self.settings_request(&request, object_id));
        }

        if let Some(remainder) = path.strip_prefix(AUTOMATION_BASE) {
            let key = remainder.split_once('/').map(|(_, id)| id);
            return Ok(self.keyed_store_request(&self.automation, &request, key));
        }

        if let Some(remainder) = path.strip_prefix(BUCKET_BASE) {
            let key = remainder.strip_prefix('/');
            return Ok(self.keyed_store_request(&self.buckets, &request, key));
        }

        Ok(Self::not_found())
    }
}
