//! Registry credential reconciler - attaches missing credentials to a registry.

use std::sync::Arc;

use tracing::{debug, info};

use super::Outcome;
use crate::api::RancherApi;
use crate::config::RegistryCredentialSpec;
use crate::error::{Result, ResultExt};
use crate::lookup::is_removed;
use crate::matcher::credential_exists;
use crate::types::{Project, Registry, RegistryCredential, Schema};

/// Creates credentials not yet present on a registry. Driven by the
/// registries reconciler with a project scoped client. Existing credentials
/// are never updated or removed.
pub struct CredentialsReconciler<A> {
    api: Arc<A>,
}

impl<A: RancherApi> CredentialsReconciler<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub async fn reconcile(
        &self,
        project: &Project,
        registry: &Registry,
        specs: &[RegistryCredentialSpec],
    ) -> Result<Outcome> {
        let mut outcome = Outcome::default();
        let mut existing: Vec<RegistryCredential> =
            self.api.get_link(&project.resource, "credentials").await?;
        existing.retain(|c| !is_removed(c.state.as_deref()));

        for spec in specs {
            let desired = spec.to_credential(registry.id());
            if credential_exists(&desired, &existing) {
                debug!("Credential {} exists on registry {}", spec.email, registry.id());
                outcome.skipped += 1;
                continue;
            }

            info!("Adding credential {} to registry {}", spec.email, registry.id());
            let created = self
                .api
                .create(&desired)
                .await
                .for_resource("registry credential", &spec.email)?;
            existing.push(created);
            outcome.created += 1;
        }

        Ok(outcome)
    }
}
