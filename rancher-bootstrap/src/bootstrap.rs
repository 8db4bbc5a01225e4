//! Bootstrap orchestrator - runs the reconcilers in dependency order.

use std::sync::Arc;

use tracing::info;

use crate::api::RancherApi;
use crate::config::DesiredConfig;
use crate::error::{Error, Result};
use crate::reconciler::tokens::registration_command;
use crate::reconciler::{
    AccountsReconciler, AuthReconciler, EnvironmentsReconciler, MembershipReconciler, Outcome,
    Reconciler, RegistriesOutcome, RegistriesReconciler,
};
use crate::wait::Waiter;

/// Outcomes of a completed run, one per resource kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub auth: Outcome,
    pub accounts: Outcome,
    pub environments: Outcome,
    pub memberships: Outcome,
    pub registries: Outcome,
    pub credentials: Outcome,
}

impl BootstrapReport {
    pub fn changed(&self) -> bool {
        [
            self.auth,
            self.accounts,
            self.environments,
            self.memberships,
            self.registries,
            self.credentials,
        ]
        .iter()
        .any(Outcome::changed)
    }
}

/// Reconciles a Rancher server against a [`DesiredConfig`].
pub struct Bootstrap<A> {
    api: Arc<A>,
    waiter: Waiter,
}

async fn step<R: Reconciler>(reconciler: R, config: &DesiredConfig) -> Result<R::Output> {
    info!("Reconciling {}", R::STEP);
    reconciler
        .reconcile(config)
        .await
        .map_err(|source| Error::Step {
            step: R::STEP,
            source: Box::new(source),
        })
}

impl<A: RancherApi> Bootstrap<A> {
    pub fn new(api: Arc<A>, waiter: Waiter) -> Self {
        Self { api, waiter }
    }

    /// Run every reconciler in order. The first failure aborts the run;
    /// changes made by earlier steps are kept.
    pub async fn run(&self, config: &DesiredConfig) -> Result<BootstrapReport> {
        let api = &self.api;

        let auth = step(AuthReconciler::new(Arc::clone(api)), config).await?;
        info!("Auth backend: {}", auth);

        let accounts = step(AccountsReconciler::new(Arc::clone(api)), config).await?;
        info!("Accounts: {}", accounts);

        let environments = step(EnvironmentsReconciler::new(Arc::clone(api)), config).await?;
        info!("Environments: {}", environments);

        let memberships = step(MembershipReconciler::new(Arc::clone(api)), config).await?;
        info!("Memberships: {}", memberships);

        let RegistriesOutcome {
            registries,
            credentials,
        } = step(
            RegistriesReconciler::new(Arc::clone(api), self.waiter.clone()),
            config,
        )
        .await?;
        info!("Registries: {}", registries);
        info!("Registry credentials: {}", credentials);

        Ok(BootstrapReport {
            auth,
            accounts,
            environments,
            memberships,
            registries,
            credentials,
        })
    }

    /// Host registration command of a project.
    pub async fn registration_command(&self, project_name: &str) -> Result<String> {
        registration_command(&*self.api, &self.waiter, project_name).await
    }
}
