//! Environment reconciler - creates and purges projects by name.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Outcome, Reconciler};
use crate::api::RancherApi;
use crate::config::{DesiredConfig, Lifecycle};
use crate::error::{Error, Result, ResultExt};
use crate::lookup::live_projects;
use crate::matcher::project_exists;
use crate::types::Project;

/// Projects are created when missing and deleted when marked `Purged`.
/// Attributes of existing projects are left as they are.
pub struct EnvironmentsReconciler<A> {
    api: Arc<A>,
}

impl<A: RancherApi> EnvironmentsReconciler<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    async fn purge(&self, name: &str, observed: &mut Vec<Project>) -> Result<bool> {
        let matches: Vec<usize> = observed
            .iter()
            .enumerate()
            .filter(|(_, p)| p.name.as_deref() == Some(name))
            .map(|(i, _)| i)
            .collect();

        let index = match matches.as_slice() {
            [] => {
                debug!("Project {} already absent", name);
                return Ok(false);
            }
            [index] => *index,
            _ => {
                return Err(Error::Ambiguous {
                    kind: "project",
                    name: name.to_string(),
                    count: matches.len(),
                });
            }
        };

        let project = observed.remove(index);
        info!("Removing project: {}", name);
        self.api.delete(&project).await?;
        Ok(true)
    }
}

#[async_trait]
impl<A: RancherApi> Reconciler for EnvironmentsReconciler<A> {
    type Output = Outcome;

    const STEP: &'static str = "environments";

    async fn reconcile(&self, config: &DesiredConfig) -> Result<Outcome> {
        let mut outcome = Outcome::default();
        let mut observed = live_projects(&*self.api).await?;

        for spec in config.projects.values() {
            match spec.state {
                Lifecycle::Purged => {
                    if self
                        .purge(&spec.name, &mut observed)
                        .await
                        .for_resource("project", &spec.name)?
                    {
                        outcome.deleted += 1;
                    } else {
                        outcome.skipped += 1;
                    }
                }
                Lifecycle::Active => {
                    let desired = Project::from(spec);
                    if project_exists(&desired, &observed) {
                        debug!("Project {} exists", spec.name);
                        outcome.skipped += 1;
                        continue;
                    }

                    info!("Adding project: {}", spec.name);
                    let created = self
                        .api
                        .create(&desired)
                        .await
                        .for_resource("project", &spec.name)?;
                    observed.push(created);
                    outcome.created += 1;
                }
            }
        }

        Ok(outcome)
    }
}
