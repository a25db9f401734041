//! Shared engine-test fixture: an in-memory SCIM service behind the
//! [`RequestExecutor`] seam, with failure-injection knobs and a call
//! log for asserting exactly which requests a run issued.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::TransportError;
use crate::http::{ApiRequest, ApiResponse, RequestExecutor};

pub(crate) const EXTENSION_URN: &str = "urn:example:params:scim:schemas:extension:hr:2.0:User";

#[derive(Debug, Clone)]
pub(crate) struct CallRecord {
    pub(crate) method: Method,
    pub(crate) url: String,
}

#[derive(Debug, Default)]
struct Directory {
    users: BTreeMap<String, Value>,
    groups: BTreeMap<String, Value>,
}

/// Knobs for failure injection.
#[derive(Debug, Default)]
pub(crate) struct FakeScimOptions {
    /// POST /Users and /Groups answer 500 without creating anything.
    pub(crate) fail_creates: bool,
    /// Requests whose path starts with this prefix fail at transport
    /// level.
    pub(crate) transport_fail_prefix: Option<String>,
    /// Reported duration for every response.
    pub(crate) latency_ms: u64,
    /// Extension attributes advertised from /Schemas as
    /// `(name, type)` pairs under [`EXTENSION_URN`].
    pub(crate) extension_attributes: Vec<(String, String)>,
}

pub(crate) struct FakeScim {
    options: FakeScimOptions,
    directory: Mutex<Directory>,
    calls: Mutex<Vec<CallRecord>>,
    next_id: AtomicU64,
}

impl FakeScim {
    pub(crate) fn new(options: FakeScimOptions) -> Self {
        Self {
            options,
            directory: Mutex::new(Directory::default()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn compliant() -> Self {
        Self::new(FakeScimOptions {
            latency_ms: 20,
            ..FakeScimOptions::default()
        })
    }

    pub(crate) fn calls(&self) -> Vec<CallRecord> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn calls_matching(&self, method: &Method, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|record| &record.method == method && record.url.starts_with(prefix))
            .count()
    }

    pub(crate) fn live_resources(&self) -> usize {
        self.with_directory(|directory| {
            directory.users.len().saturating_add(directory.groups.len())
        })
    }

    fn with_directory<T>(&self, f: impl FnOnce(&mut Directory) -> T) -> T {
        match self.directory.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn record_call(&self, request: &ApiRequest) {
        let record = CallRecord {
            method: request.method.clone(),
            url: request.display_url(),
        };
        match self.calls.lock() {
            Ok(mut guard) => guard.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }

    fn fresh_id(&self) -> String {
        format!("res-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn respond(&self, status: u16, body: Value) -> ApiResponse {
        ApiResponse {
            status,
            status_text: String::new(),
            headers: std::collections::HashMap::new(),
            body: body.to_string(),
            duration_ms: self.options.latency_ms,
        }
    }

    fn error_body(detail: &str) -> Value {
        serde_json::json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:Error"],
            "detail": detail,
        })
    }

    fn list_response(resources: Vec<Value>, total: usize) -> Value {
        serde_json::json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:ListResponse"],
            "totalResults": total,
            "itemsPerPage": resources.len(),
            "startIndex": 1,
            "Resources": resources,
        })
    }

    fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let method = &request.method;
        let path = request.path.as_str();
        if method == Method::GET && path == "/ServiceProviderConfig" {
            return self.respond(
                200,
                serde_json::json!({
                    "schemas": ["urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig"],
                    "patch": { "supported": true },
                    "filter": { "supported": true, "maxResults": 200 },
                }),
            );
        }
        if method == Method::GET && path == "/Schemas" {
            return self.schemas();
        }
        if method == Method::GET && path == "/ResourceTypes" {
            return self.respond(200, Self::list_response(Vec::new(), 0));
        }
        if method == Method::POST && path == "/Users" {
            return self.create(request, true);
        }
        if method == Method::POST && path == "/Groups" {
            return self.create(request, false);
        }
        if method == Method::GET && path == "/Users" {
            return self.list_users(request);
        }
        if method == Method::GET && path == "/Groups" {
            return self.list_groups();
        }
        self.by_id(request)
    }

    fn schemas(&self) -> ApiResponse {
        let mut resources = vec![serde_json::json!({
            "id": "urn:ietf:params:scim:schemas:core:2.0:User",
            "name": "User",
            "attributes": [{ "name": "userName", "type": "string", "multiValued": false }],
        })];
        if !self.options.extension_attributes.is_empty() {
            let attributes: Vec<Value> = self
                .options
                .extension_attributes
                .iter()
                .map(|(name, attr_type)| {
                    serde_json::json!({
                        "name": name,
                        "type": attr_type,
                        "multiValued": false,
                    })
                })
                .collect();
            resources.push(serde_json::json!({
                "id": EXTENSION_URN,
                "name": "EnterpriseExtension",
                "attributes": attributes,
            }));
        }
        let total = resources.len();
        self.respond(200, Self::list_response(resources, total))
    }

    fn create(&self, request: &ApiRequest, is_user: bool) -> ApiResponse {
        if self.options.fail_creates {
            return self.respond(500, Self::error_body("create disabled"));
        }
        let Some(mut body) = request
            .body
            .as_deref()
            .and_then(|body| serde_json::from_str::<Value>(body).ok())
        else {
            return self.respond(400, Self::error_body("invalid body"));
        };

        if is_user {
            let user_name = body.get("userName").and_then(Value::as_str).unwrap_or("");
            let duplicate = self.with_directory(|directory| {
                directory.users.values().any(|user| {
                    user.get("userName").and_then(Value::as_str) == Some(user_name)
                })
            });
            if duplicate {
                return self.respond(409, Self::error_body("uniqueness"));
            }
        }

        let id = self.fresh_id();
        if let Some(object) = body.as_object_mut() {
            object.insert("id".to_owned(), Value::String(id.clone()));
        }
        self.with_directory(|directory| {
            if is_user {
                directory.users.insert(id.clone(), body.clone());
            } else {
                directory.groups.insert(id.clone(), body.clone());
            }
        });
        self.respond(201, body)
    }

    fn list_users(&self, request: &ApiRequest) -> ApiResponse {
        let filter = request
            .query
            .iter()
            .find(|(key, _)| key == "filter")
            .map(|(_, value)| value.clone());

        let users: Vec<Value> =
            self.with_directory(|directory| directory.users.values().cloned().collect());

        if let Some(filter) = filter {
            let Some((attr, value)) = parse_eq_filter(&filter) else {
                return self.respond(400, Self::error_body("invalidFilter"));
            };
            let matched: Vec<Value> = users
                .into_iter()
                .filter(|user| user.get(&attr).and_then(Value::as_str) == Some(value.as_str()))
                .collect();
            let total = matched.len();
            return self.respond(200, Self::list_response(matched, total));
        }

        let count = request
            .query
            .iter()
            .find(|(key, _)| key == "count")
            .and_then(|(_, value)| value.parse::<usize>().ok())
            .unwrap_or(users.len());
        let total = users.len();
        let page: Vec<Value> = users.into_iter().take(count).collect();
        self.respond(200, Self::list_response(page, total))
    }

    fn list_groups(&self) -> ApiResponse {
        let groups: Vec<Value> =
            self.with_directory(|directory| directory.groups.values().cloned().collect());
        let total = groups.len();
        self.respond(200, Self::list_response(groups, total))
    }

    fn by_id(&self, request: &ApiRequest) -> ApiResponse {
        let (is_user, id) = if let Some(id) = request.path.strip_prefix("/Users/") {
            (true, id.to_owned())
        } else if let Some(id) = request.path.strip_prefix("/Groups/") {
            (false, id.to_owned())
        } else {
            return self.respond(404, Self::error_body("no such endpoint"));
        };

        let method = &request.method;
        if method == Method::GET {
            return self.with_directory(|directory| {
                let store = if is_user {
                    &directory.users
                } else {
                    &directory.groups
                };
                store.get(&id).map_or_else(
                    || self.respond(404, Self::error_body("not found")),
                    |resource| self.respond(200, resource.clone()),
                )
            });
        }
        if method == Method::PUT {
            let Some(mut body) = request
                .body
                .as_deref()
                .and_then(|body| serde_json::from_str::<Value>(body).ok())
            else {
                return self.respond(400, Self::error_body("invalid body"));
            };
            if let Some(object) = body.as_object_mut() {
                object.insert("id".to_owned(), Value::String(id.clone()));
            }
            return self.with_directory(|directory| {
                let store = if is_user {
                    &mut directory.users
                } else {
                    &mut directory.groups
                };
                if store.contains_key(&id) {
                    store.insert(id.clone(), body.clone());
                    self.respond(200, body.clone())
                } else {
                    self.respond(404, Self::error_body("not found"))
                }
            });
        }
        if method == Method::PATCH {
            return self.apply_patch(is_user, &id, request);
        }
        if method == Method::DELETE {
            return self.with_directory(|directory| {
                let store = if is_user {
                    &mut directory.users
                } else {
                    &mut directory.groups
                };
                if store.remove(&id).is_some() {
                    self.respond(204, Value::Null)
                } else {
                    self.respond(404, Self::error_body("not found"))
                }
            });
        }
        self.respond(405, Self::error_body("method not allowed"))
    }

    fn apply_patch(&self, is_user: bool, id: &str, request: &ApiRequest) -> ApiResponse {
        let Some(body) = request
            .body
            .as_deref()
            .and_then(|body| serde_json::from_str::<Value>(body).ok())
        else {
            return self.respond(400, Self::error_body("invalid body"));
        };
        let operations = body
            .get("Operations")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        self.with_directory(|directory| {
            let store = if is_user {
                &mut directory.users
            } else {
                &mut directory.groups
            };
            let Some(resource) = store.get_mut(id) else {
                return self.respond(404, Self::error_body("not found"));
            };
            for operation in &operations {
                apply_patch_op(resource, operation);
            }
            self.respond(200, resource.clone())
        })
    }
}

fn apply_patch_op(resource: &mut Value, operation: &Value) {
    let op = operation.get("op").and_then(Value::as_str).unwrap_or("");
    let path = operation.get("path").and_then(Value::as_str).unwrap_or("");
    let Some(object) = resource.as_object_mut() else {
        return;
    };
    match op {
        "add" | "replace" => {
            let Some(value) = operation.get("value") else {
                return;
            };
            if path == "members" {
                let members = object
                    .entry("members".to_owned())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let (Some(existing), Some(added)) = (members.as_array_mut(), value.as_array()) {
                    existing.extend(added.iter().cloned());
                }
            } else if !path.is_empty() {
                object.insert(path.to_owned(), value.clone());
            }
        }
        "remove" => {
            if let Some(member_id) = parse_member_filter(path) {
                if let Some(members) = object.get_mut("members").and_then(Value::as_array_mut) {
                    members.retain(|member| {
                        member.get("value").and_then(Value::as_str) != Some(member_id.as_str())
                    });
                }
            } else {
                object.remove(path);
            }
        }
        _ => {}
    }
}

/// Parses `attr eq "value"`.
fn parse_eq_filter(filter: &str) -> Option<(String, String)> {
    let (attr, rest) = filter.split_once(" eq ")?;
    let value = rest.trim().strip_prefix('"')?.strip_suffix('"')?;
    if attr.trim().is_empty() {
        return None;
    }
    Some((attr.trim().to_owned(), value.to_owned()))
}

/// Parses `members[value eq "id"]`.
fn parse_member_filter(path: &str) -> Option<String> {
    let rest = path.strip_prefix("members[value eq \"")?;
    let id = rest.strip_suffix("\"]")?;
    Some(id.to_owned())
}

#[async_trait]
impl RequestExecutor for FakeScim {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        if let Some(prefix) = self.options.transport_fail_prefix.as_deref()
            && request.path.starts_with(prefix)
        {
            self.record_call(request);
            return Err(TransportError::new("Request failed: connection refused"));
        }
        self.record_call(request);
        Ok(self.handle(request))
    }
}
