//! Desired state document.
//!
//! The bootstrap configuration is a YAML file describing the Rancher server,
//! its LDAP backend and the accounts, projects, memberships, registries and
//! registry credentials that should exist on it.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{Account, LdapConfig, Project, Registry, RegistryCredential};
use crate::wait::{DEFAULT_POLL_INTERVAL, WaitConfig};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// API root, e.g. `http://rancher:8080/v1`.
    pub url: String,
}

/// Lifecycle marker of projects and registries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Lifecycle {
    #[default]
    #[serde(alias = "active")]
    Active,
    /// Terminal: the resource is removed if present.
    #[serde(alias = "purged")]
    Purged,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LdapConfigSpec {
    pub enabled: Option<bool>,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<bool>,
    pub domain: Option<String>,
    pub login_domain: Option<String>,
    pub access_mode: Option<String>,
    pub connection_timeout: Option<u64>,
    pub service_account_username: Option<String>,
    pub service_account_password: Option<String>,
    pub user_search_field: Option<String>,
    pub user_login_field: Option<String>,
    pub user_object_class: Option<String>,
    pub group_search_field: Option<String>,
    pub group_object_class: Option<String>,
}

impl From<&LdapConfigSpec> for LdapConfig {
    fn from(spec: &LdapConfigSpec) -> Self {
        LdapConfig {
            resource: Default::default(),
            enabled: spec.enabled,
            server: spec.server.clone(),
            port: spec.port,
            tls: spec.tls,
            domain: spec.domain.clone(),
            login_domain: spec.login_domain.clone(),
            access_mode: spec.access_mode.clone(),
            connection_timeout: spec.connection_timeout,
            service_account_username: spec.service_account_username.clone(),
            service_account_password: spec.service_account_password.clone(),
            user_search_field: spec.user_search_field.clone(),
            user_login_field: spec.user_login_field.clone(),
            user_object_class: spec.user_object_class.clone(),
            group_search_field: spec.group_search_field.clone(),
            group_object_class: spec.group_object_class.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountSpec {
    /// Defaults to the account's key.
    pub name: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub external_id: Option<String>,
    pub external_id_type: Option<String>,
}

impl From<&AccountSpec> for Account {
    fn from(spec: &AccountSpec) -> Self {
        Account {
            resource: Default::default(),
            name: spec.name.clone(),
            kind: spec.kind.clone(),
            description: spec.description.clone(),
            external_id: spec.external_id.clone(),
            external_id_type: spec.external_id_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSpec {
    /// Defaults to the project's key.
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub state: Lifecycle,
}

impl From<&ProjectSpec> for Project {
    fn from(spec: &ProjectSpec) -> Self {
        Project {
            resource: Default::default(),
            name: Some(spec.name.clone()),
            description: spec.description.clone(),
            state: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MembershipSpec {
    /// Identity name; defaults to the member's key.
    #[serde(default)]
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrySpec {
    pub server_address: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub state: Lifecycle,
}

impl RegistrySpec {
    pub fn to_registry(&self, project_id: &str) -> Registry {
        Registry {
            name: self.name.clone(),
            description: self.description.clone(),
            server_address: Some(self.server_address.clone()),
            account_id: Some(project_id.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryCredentialSpec {
    pub email: String,
    pub public_value: Option<String>,
    pub secret_value: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl RegistryCredentialSpec {
    pub fn to_credential(&self, registry_id: &str) -> RegistryCredential {
        RegistryCredential {
            name: self.name.clone(),
            description: self.description.clone(),
            email: Some(self.email.clone()),
            public_value: self.public_value.clone(),
            secret_value: self.secret_value.clone(),
            registry_id: Some(registry_id.to_string()),
            ..Default::default()
        }
    }
}

/// Optional polling overrides.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WaitSettings {
    pub interval_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

impl WaitSettings {
    pub fn to_config(self) -> WaitConfig {
        WaitConfig {
            interval: self
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            max_attempts: self.max_attempts,
        }
    }
}

/// Project name -> server address -> credentials.
pub type CredentialMap = BTreeMap<String, BTreeMap<String, Vec<RegistryCredentialSpec>>>;

/// Desired state of a Rancher server, read once per run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DesiredConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default, alias = "ldap_config")]
    pub ldapconfig: Option<LdapConfigSpec>,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountSpec>,
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectSpec>,
    /// Project name -> member key -> membership.
    #[serde(default)]
    pub memberships: BTreeMap<String, BTreeMap<String, MembershipSpec>>,
    /// Project name -> registries in order.
    #[serde(default)]
    pub registries: BTreeMap<String, Vec<RegistrySpec>>,
    #[serde(default, rename = "registrycredentials", alias = "registry_credentials")]
    pub registry_credentials: CredentialMap,
    #[serde(default)]
    pub wait: WaitSettings,
}

impl DesiredConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut config: DesiredConfig = serde_yaml::from_str(text)?;
        config.fill_names();
        config.validate()?;
        Ok(config)
    }

    fn fill_names(&mut self) {
        for (key, account) in &mut self.accounts {
            account.name.get_or_insert_with(|| key.clone());
        }
        for (key, project) in &mut self.projects {
            if project.name.is_empty() {
                project.name = key.clone();
            }
        }
        for members in self.memberships.values_mut() {
            for (key, member) in members {
                if member.name.is_empty() {
                    member.name = key.clone();
                }
            }
        }
    }

    /// Checks the invariants the reconcilers rely on.
    pub fn validate(&self) -> Result<()> {
        if self.server.url.is_empty() {
            return Err(Error::Config("server.url is required".to_string()));
        }

        let mut active = HashSet::new();
        for project in self.projects.values() {
            if project.state == Lifecycle::Active && !active.insert(project.name.as_str()) {
                return Err(Error::Config(format!(
                    "project {} is declared more than once",
                    project.name
                )));
            }
        }

        for (project, registries) in &self.registries {
            let mut seen = HashSet::new();
            for registry in registries {
                if registry.server_address.is_empty() {
                    return Err(Error::Config(format!(
                        "registry without server_address in project {}",
                        project
                    )));
                }
                if !seen.insert(registry.server_address.as_str()) {
                    return Err(Error::Config(format!(
                        "registry {} is declared more than once in project {}",
                        registry.server_address, project
                    )));
                }
            }
        }

        Ok(())
    }

    /// Credentials declared for a registry of a project.
    pub fn credentials_for(
        &self,
        project: &str,
        server_address: &str,
    ) -> Option<&[RegistryCredentialSpec]> {
        self.registry_credentials
            .get(project)?
            .get(server_address)
            .map(Vec::as_slice)
    }
}
