//! Account reconciler - adds accounts missing on the server.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Outcome, Reconciler};
use crate::api::RancherApi;
use crate::config::DesiredConfig;
use crate::error::{Result, ResultExt};
use crate::matcher::account_exists;
use crate::types::{Account, ListOpts};

/// Accounts are additive only: existing ones are never updated or removed.
pub struct AccountsReconciler<A> {
    api: Arc<A>,
}

impl<A: RancherApi> AccountsReconciler<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<A: RancherApi> Reconciler for AccountsReconciler<A> {
    type Output = Outcome;

    const STEP: &'static str = "accounts";

    async fn reconcile(&self, config: &DesiredConfig) -> Result<Outcome> {
        let mut outcome = Outcome::default();
        let mut observed: Vec<Account> = self.api.list(&ListOpts::default()).await?;

        for (key, spec) in &config.accounts {
            let desired = Account::from(spec);
            if account_exists(&desired, &observed) {
                debug!("Account {} exists", key);
                outcome.skipped += 1;
                continue;
            }

            info!("Adding account: {}", key);
            let created = self
                .api
                .create(&desired)
                .await
                .for_resource("account", key)?;
            observed.push(created);
            outcome.created += 1;
        }

        Ok(outcome)
    }
}
