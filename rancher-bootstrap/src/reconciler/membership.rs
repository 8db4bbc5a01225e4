//! Environment membership reconciler - merges desired members into projects.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Outcome, Reconciler};
use crate::api::RancherApi;
use crate::config::{DesiredConfig, MembershipSpec};
use crate::error::{Result, ResultExt};
use crate::lookup::{identity_by_name, project_by_name};
use crate::types::{Project, ProjectMember, SetProjectMembersInput};

/// Adds members to projects. Members missing from the configuration are
/// kept: the member list only ever grows.
pub struct MembershipReconciler<A> {
    api: Arc<A>,
}

fn same_principal(a: &ProjectMember, b: &ProjectMember) -> bool {
    a.external_id == b.external_id && a.external_id_type == b.external_id_type
}

/// Member entry as accepted by `setmembers`.
fn member_input(member: &ProjectMember) -> ProjectMember {
    ProjectMember {
        external_id: member.external_id.clone(),
        external_id_type: member.external_id_type.clone(),
        role: member.role.clone(),
        ..Default::default()
    }
}

impl<A: RancherApi> MembershipReconciler<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    async fn resolve_member(&self, spec: &MembershipSpec) -> Result<ProjectMember> {
        info!("Getting identity for: {}", spec.name);
        let identity = identity_by_name(&*self.api, &spec.name).await?;
        Ok(ProjectMember {
            external_id: identity.external_id,
            external_id_type: identity.external_id_type,
            role: Some(spec.role.clone()),
            ..Default::default()
        })
    }

    async fn reconcile_project(
        &self,
        project: &Project,
        members: &BTreeMap<String, MembershipSpec>,
    ) -> Result<Outcome> {
        let mut outcome = Outcome::default();

        info!("Getting project members for: {}", project.name());
        let existing: Vec<ProjectMember> = self
            .api
            .get_link(&project.resource, "projectMembers")
            .await?;
        let mut merged: Vec<ProjectMember> = existing.iter().map(member_input).collect();

        for (key, spec) in members {
            let member = self.resolve_member(spec).await.for_resource("member", key)?;
            if merged.iter().any(|m| same_principal(m, &member)) {
                debug!("{} is already a member of {}", spec.name, project.name());
                outcome.skipped += 1;
                continue;
            }
            merged.push(member);
            outcome.created += 1;
        }

        if outcome.created == 0 {
            return Ok(outcome);
        }

        info!(
            "Setting {} members on project {} ({} new)",
            merged.len(),
            project.name(),
            outcome.created
        );
        let input = serde_json::to_value(SetProjectMembersInput { members: merged })?;
        self.api
            .action::<serde_json::Value>(&project.resource, "setmembers", input)
            .await?;

        Ok(outcome)
    }
}

#[async_trait]
impl<A: RancherApi> Reconciler for MembershipReconciler<A> {
    type Output = Outcome;

    const STEP: &'static str = "environment membership";

    async fn reconcile(&self, config: &DesiredConfig) -> Result<Outcome> {
        let mut outcome = Outcome::default();

        for (project_name, members) in &config.memberships {
            let project = project_by_name(&*self.api, project_name)
                .await
                .for_resource("membership of project", project_name)?;
            let result = self
                .reconcile_project(&project, members)
                .await
                .for_resource("project", project_name)?;
            outcome.merge(result);
        }

        Ok(outcome)
    }
}
