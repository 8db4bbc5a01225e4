//! Shared test utilities: an in-memory Rancher control plane.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rancher_bootstrap::api::RancherApi;
use rancher_bootstrap::error::{Error, Result};
use rancher_bootstrap::types::{ApiKey, ListOpts, Project, Resource, Schema};
use rancher_bootstrap::wait::{Sleeper, WaitConfig, Waiter};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// A mutating call issued against the control plane.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        kind: String,
        key: String,
        scope: Option<String>,
    },
    Delete {
        kind: String,
        id: String,
    },
    Action {
        kind: String,
        id: String,
        action: String,
        input: Value,
    },
}

#[derive(Default)]
struct State {
    next_id: u64,
    objects: Vec<Value>,
    calls: Vec<Call>,
    /// Reloads left before a transitioning resource settles.
    pending: HashMap<String, u32>,
    settle_after: u32,
    fail_create: Option<String>,
    fail_action: Option<String>,
    fail_reload: bool,
}

/// In-memory Rancher server. Clones share state; scoped clients only differ
/// in the project they are scoped to.
#[derive(Clone, Default)]
pub struct MemoryRancher {
    state: Arc<Mutex<State>>,
    scope: Option<String>,
}

fn api_error(status: u16, code: &str, message: String) -> Error {
    Error::Api {
        status,
        code: code.to_string(),
        message,
    }
}

fn str_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

fn natural_key(value: &Value) -> String {
    ["name", "serverAddress", "email", "externalId", "accountId", "server"]
        .iter()
        .find_map(|f| str_field(value, f))
        .unwrap_or_default()
        .to_string()
}

impl MemoryRancher {
    pub fn new() -> Self {
        Self::default()
    }

    /// New API keys and deactivated registries report `transitioning: yes`
    /// until reloaded this many times.
    pub fn settle_after(&self, reloads: u32) {
        self.state.lock().unwrap().settle_after = reloads;
    }

    pub fn fail_create(&self, kind: &str) {
        self.state.lock().unwrap().fail_create = Some(kind.to_string());
    }

    pub fn fail_action(&self, action: &str) {
        self.state.lock().unwrap().fail_action = Some(action.to_string());
    }

    pub fn fail_reload(&self) {
        self.state.lock().unwrap().fail_reload = true;
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn creates(&self, kind: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create { kind: k, key, .. } if k == kind => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self, kind: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete { kind: k, id } if k == kind => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn actions(&self, action: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Action {
                    action: a, input, ..
                } if a == action => Some(input),
                _ => None,
            })
            .collect()
    }

    /// Stored resources of one type.
    pub fn objects<T: Schema>(&self) -> Vec<T> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .iter()
            .filter(|o| str_field(o, "type") == Some(T::TYPE))
            .map(|o| serde_json::from_value(o.clone()).unwrap())
            .collect()
    }

    /// Store a resource without recording a call.
    pub fn seed<T: Schema>(&self, resource: T) -> T {
        let mut state = self.state.lock().unwrap();
        let value = serde_json::to_value(&resource).unwrap();
        let value = Self::insert(&mut state, T::TYPE, T::COLLECTION, value, None, false);
        serde_json::from_value(value).unwrap()
    }

    /// Store a raw JSON resource of the given type without recording a call.
    pub fn seed_raw(&self, resource_type: &str, collection: &str, value: Value) -> Value {
        let mut state = self.state.lock().unwrap();
        Self::insert(&mut state, resource_type, collection, value, None, false)
    }

    fn insert(
        state: &mut State,
        resource_type: &str,
        collection: &str,
        mut value: Value,
        scope: Option<&str>,
        transitioning: bool,
    ) -> Value {
        state.next_id += 1;
        let id = format!("1{}{}", &resource_type[..1], state.next_id);
        let self_link = format!("mem://{}/{}", collection, id);

        let obj = value.as_object_mut().unwrap();
        obj.insert("id".into(), json!(id));
        obj.insert("type".into(), json!(resource_type));
        obj.entry("state").or_insert(json!("active"));

        let mut links = json!({ "self": self_link });
        let mut actions = json!({});
        match resource_type {
            "project" => {
                for rel in ["projectMembers", "registries", "credentials", "registrationTokens"] {
                    links[rel] = json!(format!("{}/{}", self_link, rel));
                }
                actions["setmembers"] = json!(format!("{}?action=setmembers", self_link));
            }
            "registry" => {
                actions["deactivate"] = json!(format!("{}?action=deactivate", self_link));
            }
            "apiKey" => {
                obj.insert("kind".into(), json!("apiKey"));
                obj.insert("publicValue".into(), json!(format!("PUB{}", id)));
                obj.insert("secretValue".into(), json!(format!("SEC{}", id)));
            }
            "registryCredential" => {
                obj.insert("kind".into(), json!("registryCredential"));
            }
            "registrationToken" => {
                if !transitioning || state.settle_after == 0 {
                    let command = format!("sudo docker run rancher/agent {}", id);
                    obj.insert("command".into(), json!(command));
                }
            }
            _ => {}
        }
        obj.insert("links".into(), links);
        obj.insert("actions".into(), actions);

        if let Some(scope) = scope {
            obj.entry("accountId").or_insert(json!(scope));
        }

        if matches!(resource_type, "apiKey" | "registry") {
            let settling = transitioning && resource_type == "apiKey" && state.settle_after > 0;
            obj.insert("transitioning".into(), json!(if settling { "yes" } else { "no" }));
            if settling {
                state.pending.insert(id.clone(), state.settle_after);
            }
        }
        if resource_type == "registrationToken" && transitioning && state.settle_after > 0 {
            state.pending.insert(id.clone(), state.settle_after);
        }

        state.objects.push(value.clone());
        value
    }

    fn position(state: &State, id: &str) -> Option<usize> {
        state
            .objects
            .iter()
            .position(|o| str_field(o, "id") == Some(id))
    }

    fn create_value<T: Schema>(&self, spec: &T, owner: Option<&str>) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create.as_deref() == Some(T::TYPE) {
            return Err(api_error(422, "InvalidOption", format!("cannot create {}", T::TYPE)));
        }

        let mut value = serde_json::to_value(spec)?;
        if let Some(owner) = owner {
            value["accountId"] = json!(owner);
        }
        state.calls.push(Call::Create {
            kind: T::TYPE.to_string(),
            key: natural_key(&value),
            scope: self.scope.clone(),
        });
        let scope = self.scope.as_deref();
        let value = Self::insert(&mut state, T::TYPE, T::COLLECTION, value, scope, true);
        Ok(serde_json::from_value(value)?)
    }
}

/// Types and owner field behind each project link.
fn relation(link: &str) -> Option<(&'static [&'static str], &'static str)> {
    match link {
        "projectMembers" => Some((&["projectMember"], "projectId")),
        "registries" => Some((&["registry"], "accountId")),
        "credentials" => Some((&["registryCredential", "apiKey"], "accountId")),
        "registrationTokens" => Some((&["registrationToken"], "accountId")),
        _ => None,
    }
}

fn missing_link(resource: &Resource, link: &str) -> Error {
    Error::MissingLink {
        kind: resource.resource_type.clone(),
        id: resource.id.clone(),
        link: link.to_string(),
    }
}

#[async_trait]
impl RancherApi for MemoryRancher {
    async fn list<T: Schema>(&self, opts: &ListOpts) -> Result<Vec<T>> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .iter()
            .filter(|o| str_field(o, "type") == Some(T::TYPE))
            .filter(|o| {
                opts.filters
                    .iter()
                    .all(|(k, v)| str_field(o, k).is_some_and(|field| field.contains(v.as_str())))
            })
            .map(|o| serde_json::from_value(o.clone()).map_err(Error::from))
            .collect()
    }

    async fn create<T: Schema>(&self, spec: &T) -> Result<T> {
        self.create_value(spec, None)
    }

    async fn delete<T: Schema>(&self, resource: &T) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let id = resource.id().to_string();
        let index = Self::position(&state, &id)
            .ok_or_else(|| api_error(404, "NotFound", format!("{} not found", id)))?;

        // Registries must be deactivated and settled before they can go.
        let obj = &state.objects[index];
        if str_field(obj, "type") == Some("registry")
            && (str_field(obj, "transitioning") == Some("yes")
                || str_field(obj, "state") != Some("inactive"))
        {
            return Err(api_error(
                409,
                "InvalidState",
                format!("registry {} is {}", id, str_field(obj, "state").unwrap_or_default()),
            ));
        }

        let removed = state.objects.remove(index);
        state.calls.push(Call::Delete {
            kind: str_field(&removed, "type").unwrap_or_default().to_string(),
            id,
        });
        Ok(())
    }

    async fn reload<T: Schema>(&self, resource: &mut T) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_reload {
            return Err(api_error(503, "Unavailable", "reload failed".to_string()));
        }

        let id = resource.id().to_string();
        let index = Self::position(&state, &id)
            .ok_or_else(|| api_error(404, "NotFound", format!("{} not found", id)))?;

        let settled = match state.pending.get_mut(&id) {
            Some(left) => {
                *left = left.saturating_sub(1);
                *left == 0
            }
            None => false,
        };
        if settled {
            state.pending.remove(&id);
            let obj = &mut state.objects[index];
            let kind = str_field(obj, "type").map(str::to_string);
            match kind.as_deref() {
                Some("registrationToken") => {
                    obj["command"] = json!(format!("sudo docker run rancher/agent {}", id));
                }
                Some("registry") if str_field(obj, "state") == Some("deactivating") => {
                    obj["state"] = json!("inactive");
                    obj["transitioning"] = json!("no");
                }
                _ => obj["transitioning"] = json!("no"),
            }
        }

        let mut value = state.objects[index].clone();
        // Secrets are only returned by the create call.
        if let Some(obj) = value.as_object_mut() {
            obj.remove("secretValue");
        }
        *resource = serde_json::from_value(value)?;
        Ok(())
    }

    async fn get_link<T: Schema>(&self, resource: &Resource, link: &str) -> Result<Vec<T>> {
        if !resource.links.contains_key(link) {
            return Err(missing_link(resource, link));
        }
        let (types, owner_field) = relation(link).ok_or_else(|| missing_link(resource, link))?;

        let state = self.state.lock().unwrap();
        state
            .objects
            .iter()
            .filter(|o| str_field(o, "type").is_some_and(|t| types.contains(&t)))
            .filter(|o| str_field(o, owner_field) == Some(resource.id.as_str()))
            .map(|o| serde_json::from_value(o.clone()).map_err(Error::from))
            .collect()
    }

    async fn create_link<T: Schema>(&self, owner: &Resource, link: &str, spec: &T) -> Result<T> {
        if !owner.links.contains_key(link) {
            return Err(missing_link(owner, link));
        }
        self.create_value(spec, Some(&owner.id))
    }

    async fn action<T: DeserializeOwned + Send + 'static>(
        &self,
        resource: &Resource,
        action: &str,
        input: Value,
    ) -> Result<T> {
        if !resource.actions.contains_key(action) {
            return Err(missing_link(resource, action));
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_action.as_deref() == Some(action) {
            return Err(api_error(500, "ServerError", format!("{} failed", action)));
        }
        state.calls.push(Call::Action {
            kind: resource.resource_type.clone(),
            id: resource.id.clone(),
            action: action.to_string(),
            input: input.clone(),
        });

        match action {
            "setmembers" => {
                let project_id = resource.id.clone();
                state.objects.retain(|o| {
                    !(str_field(o, "type") == Some("projectMember")
                        && str_field(o, "projectId") == Some(project_id.as_str()))
                });
                let members = input["members"].as_array().cloned().unwrap_or_default();
                for mut member in members {
                    member["projectId"] = json!(project_id);
                    let collection = "projectmembers";
                    Self::insert(&mut state, "projectMember", collection, member, None, false);
                }
                Ok(serde_json::from_value(input)?)
            }
            "deactivate" => {
                let settle_after = state.settle_after;
                let index = Self::position(&state, &resource.id)
                    .ok_or_else(|| api_error(404, "NotFound", resource.id.clone()))?;
                let obj = &mut state.objects[index];
                obj["actions"] = json!({});
                if settle_after > 0 {
                    obj["state"] = json!("deactivating");
                    obj["transitioning"] = json!("yes");
                } else {
                    obj["state"] = json!("inactive");
                }
                let value = obj.clone();
                if settle_after > 0 {
                    state.pending.insert(resource.id.clone(), settle_after);
                }
                Ok(serde_json::from_value(value)?)
            }
            other => Err(api_error(422, "InvalidAction", other.to_string())),
        }
    }

    fn scoped(&self, project: &Project, key: &ApiKey) -> Result<Self> {
        let state = self.state.lock().unwrap();
        if Self::position(&state, key.id()).is_none() || key.secret_value.is_none() {
            return Err(api_error(401, "Unauthorized", "invalid api key".to_string()));
        }
        Ok(Self {
            state: Arc::clone(&self.state),
            scope: Some(project.id().to_string()),
        })
    }
}

/// Sleeper that returns immediately and records requested durations.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Waiter that never actually sleeps.
pub fn instant_waiter() -> Waiter {
    Waiter::with_sleeper(WaitConfig::default(), Arc::new(RecordingSleeper::default()))
}

pub fn project(name: &str) -> Project {
    Project {
        name: Some(name.to_string()),
        ..Default::default()
    }
}
