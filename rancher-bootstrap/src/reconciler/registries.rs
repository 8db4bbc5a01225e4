//! Registry reconciler - manages private registries per project.
//!
//! Registries are project resources, so each project is processed with a
//! client authenticated by a short-lived API key minted for that project.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::{CredentialsReconciler, Outcome, Reconciler};
use crate::api::RancherApi;
use crate::config::{DesiredConfig, Lifecycle, RegistrySpec};
use crate::error::{Result, ResultExt};
use crate::lookup::{is_removed, project_by_name};
use crate::matcher::find_registry;
use crate::types::{ApiKey, Project, Registry, Schema};
use crate::wait::Waiter;

/// Project API key held for the duration of one project's processing.
///
/// Must be given back with [`ScopedApiKey::release`]; dropping an unreleased
/// key leaves it behind on the server and is logged.
pub struct ScopedApiKey<'a, A: RancherApi> {
    api: &'a A,
    key: ApiKey,
    released: bool,
}

impl<'a, A: RancherApi> ScopedApiKey<'a, A> {
    /// Create a key for `project` and wait until it is provisioned.
    pub async fn acquire(api: &'a A, project: &Project, waiter: &Waiter) -> Result<Self> {
        info!("Creating key for: {}", project.id());
        let key = api.create(&ApiKey::for_account(project.id())).await?;
        let secret = key.secret_value.clone();
        let mut lease = Self {
            api,
            key,
            released: false,
        };

        if let Err(e) = waiter.wait_for_transition(api, &mut lease.key).await {
            if let Err(release_err) = lease.release().await {
                error!("Failed to release API key: {}", release_err);
            }
            return Err(e);
        }

        // The secret is only returned on creation.
        if lease.key.secret_value.is_none() {
            lease.key.secret_value = secret;
        }
        Ok(lease)
    }

    pub fn key(&self) -> &ApiKey {
        &self.key
    }

    /// Delete the key.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        debug!("Releasing API key {}", self.key.id());
        self.api.delete(&self.key).await
    }
}

impl<A: RancherApi> Drop for ScopedApiKey<'_, A> {
    fn drop(&mut self) {
        if !self.released {
            warn!("API key {} dropped without being released", self.key.id());
        }
    }
}

/// Outcome of registries and the credentials configured along with them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistriesOutcome {
    pub registries: Outcome,
    pub credentials: Outcome,
}

impl RegistriesOutcome {
    fn merge(&mut self, other: RegistriesOutcome) {
        self.registries.merge(other.registries);
        self.credentials.merge(other.credentials);
    }
}

/// Creates, purges and configures credentials of registries per project.
pub struct RegistriesReconciler<A> {
    api: Arc<A>,
    waiter: Waiter,
}

impl<A: RancherApi> RegistriesReconciler<A> {
    pub fn new(api: Arc<A>, waiter: Waiter) -> Self {
        Self { api, waiter }
    }

    async fn reconcile_project(
        &self,
        config: &DesiredConfig,
        project_name: &str,
        specs: &[RegistrySpec],
    ) -> Result<RegistriesOutcome> {
        info!("Configuring registries for project: {}", project_name);
        let project = project_by_name(&*self.api, project_name).await?;

        let lease = ScopedApiKey::acquire(&*self.api, &project, &self.waiter).await?;
        let result = self
            .reconcile_with_key(config, project_name, &project, lease.key(), specs)
            .await;
        let released = lease.release().await;

        let outcome = result?;
        released?;
        Ok(outcome)
    }

    async fn reconcile_with_key(
        &self,
        config: &DesiredConfig,
        project_name: &str,
        project: &Project,
        key: &ApiKey,
        specs: &[RegistrySpec],
    ) -> Result<RegistriesOutcome> {
        let mut outcome = RegistriesOutcome::default();
        let client = Arc::new(self.api.scoped(project, key)?);
        debug!("Created client for project: {}", project.name());

        info!("Getting registries for: {}", project.id());
        let mut observed: Vec<Registry> = client.get_link(&project.resource, "registries").await?;
        observed.retain(|r| !is_removed(r.state.as_deref()));

        for spec in specs {
            let address = spec.server_address.as_str();
            let desired = spec.to_registry(project.id());
            let existing = find_registry(&desired, &observed).cloned();

            let registry = match (existing, spec.state) {
                (Some(registry), Lifecycle::Purged) => {
                    info!("Removing registry: {}", address);
                    self.remove(&*client, registry.clone())
                        .await
                        .for_resource("registry", address)?;
                    observed.retain(|r| r.id() != registry.id());
                    outcome.registries.deleted += 1;
                    continue;
                }
                (None, Lifecycle::Purged) => {
                    debug!("Registry {} does not exist", address);
                    outcome.registries.skipped += 1;
                    continue;
                }
                (None, Lifecycle::Active) => {
                    info!("Adding registry: {}", address);
                    let created = client
                        .create(&desired)
                        .await
                        .for_resource("registry", address)?;
                    observed.push(created.clone());
                    outcome.registries.created += 1;
                    created
                }
                (Some(registry), Lifecycle::Active) => {
                    info!("Registry: {} exists", address);
                    outcome.registries.skipped += 1;
                    registry
                }
            };

            if let Some(credentials) = config.credentials_for(project_name, address) {
                info!("Configuring credentials for: {}", address);
                let result = CredentialsReconciler::new(Arc::clone(&client))
                    .reconcile(project, &registry, credentials)
                    .await
                    .for_resource("credentials of registry", address)?;
                outcome.credentials.merge(result);
            }
        }

        Ok(outcome)
    }

    /// Deactivate, wait for the deactivation to settle, then delete.
    async fn remove(&self, client: &A, registry: Registry) -> Result<()> {
        let mut registry = if registry.resource.actions.contains_key("deactivate") {
            info!("Deactivating: {}", registry.id());
            client
                .action::<Registry>(&registry.resource, "deactivate", serde_json::json!({}))
                .await?
        } else {
            debug!("Registry {} is already inactive", registry.id());
            registry
        };

        self.waiter.wait_for_transition(client, &mut registry).await?;
        client.delete(&registry).await
    }
}

#[async_trait]
impl<A: RancherApi> Reconciler for RegistriesReconciler<A> {
    type Output = RegistriesOutcome;

    const STEP: &'static str = "registries";

    async fn reconcile(&self, config: &DesiredConfig) -> Result<RegistriesOutcome> {
        let mut outcome = RegistriesOutcome::default();

        for (project_name, specs) in &config.registries {
            let result = self
                .reconcile_project(config, project_name, specs)
                .await
                .for_resource("registries for project", project_name)?;
            outcome.merge(result);
        }

        Ok(outcome)
    }
}
