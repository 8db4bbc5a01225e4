//! Rancher API resource types.
//!
//! Every resource embeds a [`Resource`] envelope carrying its id, type,
//! links and actions, which is enough to reload, delete or act on it.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Envelope common to every Rancher resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub links: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub actions: HashMap<String, String>,
}

/// A typed resource living in a Rancher collection.
pub trait Schema: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Resource type as reported in the `type` field.
    const TYPE: &'static str;
    /// Collection path segment below the API root.
    const COLLECTION: &'static str;

    fn resource(&self) -> &Resource;
    fn resource_mut(&mut self) -> &mut Resource;

    fn id(&self) -> &str {
        &self.resource().id
    }
}

macro_rules! schema {
    ($ty:ty, $type_name:literal, $collection:literal) => {
        impl Schema for $ty {
            const TYPE: &'static str = $type_name;
            const COLLECTION: &'static str = $collection;

            fn resource(&self) -> &Resource {
                &self.resource
            }

            fn resource_mut(&mut self) -> &mut Resource {
                &mut self.resource
            }
        }
    };
}

/// Settle state of an asynchronous resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Yes,
    /// Also assumed when the server omits the flag.
    #[default]
    No,
    Error,
}

/// Resources that change state asynchronously.
pub trait Transitioning {
    fn transitioning(&self) -> Transition;
}

/// Wrapper of every list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Query filters for list calls.
#[derive(Debug, Clone, Default)]
pub struct ListOpts {
    pub filters: Vec<(String, String)>,
}

impl ListOpts {
    pub fn filter(mut self, key: &str, value: &str) -> Self {
        self.filters.push((key.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id_type: Option<String>,
}
schema!(Account, "account", "accounts");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}
schema!(Project, "project", "projects");

impl Project {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// Directory principal (LDAP user or group) known to Rancher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id_type: Option<String>,
}
schema!(Identity, "identity", "identities");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMember {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}
schema!(ProjectMember, "projectMember", "projectmembers");

/// Input of the project `setmembers` action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetProjectMembersInput {
    #[serde(default)]
    pub members: Vec<ProjectMember>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing)]
    pub transitioning: Transition,
}
schema!(Registry, "registry", "registries");

impl Transitioning for Registry {
    fn transitioning(&self) -> Transition {
        self.transitioning
    }
}

/// Credential of any kind as returned by the project `credentials` link.
///
/// Registry credentials share this collection with API keys, hence the
/// `kind` check in the matcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCredential {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}
schema!(RegistryCredential, "registryCredential", "registrycredentials");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing)]
    pub transitioning: Transition,
}
schema!(ApiKey, "apiKey", "apikeys");

impl ApiKey {
    pub fn for_account(account_id: &str) -> Self {
        Self {
            account_id: Some(account_id.to_string()),
            ..Default::default()
        }
    }
}

impl Transitioning for ApiKey {
    fn transitioning(&self) -> Transition {
        self.transitioning
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapConfig {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_search_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_login_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_object_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_search_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_object_class: Option<String>,
}
schema!(LdapConfig, "ldapconfig", "ldapconfigs");

/// Token whose `command` enrolls a host into a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationToken {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}
schema!(RegistrationToken, "registrationToken", "registrationtokens");

impl RegistrationToken {
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref().filter(|c| !c.is_empty())
    }
}
