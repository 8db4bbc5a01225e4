//! Auth backend reconciler - enables the LDAP configuration once.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Outcome, Reconciler};
use crate::api::RancherApi;
use crate::config::DesiredConfig;
use crate::error::{Result, ResultExt};
use crate::types::{LdapConfig, ListOpts};

/// Creates the LDAP configuration unless LDAP is already enabled.
///
/// An enabled configuration is never updated.
pub struct AuthReconciler<A> {
    api: Arc<A>,
}

impl<A: RancherApi> AuthReconciler<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    async fn enabled(&self) -> Result<bool> {
        let configs: Vec<LdapConfig> = self.api.list(&ListOpts::default()).await?;
        Ok(configs.first().and_then(|c| c.enabled).unwrap_or(false))
    }
}

#[async_trait]
impl<A: RancherApi> Reconciler for AuthReconciler<A> {
    type Output = Outcome;

    const STEP: &'static str = "auth backend";

    async fn reconcile(&self, config: &DesiredConfig) -> Result<Outcome> {
        let mut outcome = Outcome::default();
        let Some(spec) = &config.ldapconfig else {
            warn!("No LDAP configuration found");
            return Ok(outcome);
        };

        let server = spec.server.as_deref().unwrap_or("ldap");
        if self.enabled().await? {
            info!("LDAP already enabled, leaving configuration untouched");
            outcome.skipped += 1;
            return Ok(outcome);
        }

        info!("Enabling LDAP config for {}", server);
        self.api
            .create(&LdapConfig::from(spec))
            .await
            .for_resource("ldapconfig", server)?;
        outcome.created += 1;

        Ok(outcome)
    }
}
