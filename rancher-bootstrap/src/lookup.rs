//! Lookups of remote resources by name shared by several reconcilers.

use tracing::debug;

use crate::api::RancherApi;
use crate::error::{Error, Result};
use crate::types::{Identity, ListOpts, Project};

/// Remote states of resources that are gone or on their way out.
const REMOVED_STATES: &[&str] = &["removing", "removed", "purging", "purged"];

/// Whether a resource in this state no longer counts as existing.
pub fn is_removed(state: Option<&str>) -> bool {
    state.is_some_and(|state| REMOVED_STATES.contains(&state))
}

fn is_live(project: &Project) -> bool {
    !is_removed(project.state.as_deref())
}

/// All projects that have not been removed.
pub async fn live_projects<A: RancherApi>(api: &A) -> Result<Vec<Project>> {
    let projects: Vec<Project> = api.list(&ListOpts::default()).await?;
    Ok(projects.into_iter().filter(is_live).collect())
}

/// Project with exactly this name, if any. Several matches are an error.
pub async fn find_project<A: RancherApi>(api: &A, name: &str) -> Result<Option<Project>> {
    let mut matches: Vec<Project> = live_projects(api)
        .await?
        .into_iter()
        .filter(|p| p.name.as_deref() == Some(name))
        .collect();

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        count => Err(Error::Ambiguous {
            kind: "project",
            name: name.to_string(),
            count,
        }),
    }
}

/// Project with exactly this name; absence is an error.
pub async fn project_by_name<A: RancherApi>(api: &A, name: &str) -> Result<Project> {
    find_project(api, name)
        .await?
        .ok_or_else(|| Error::not_found("project", name))
}

/// First identity whose name equals `name` exactly.
pub async fn identity_by_name<A: RancherApi>(api: &A, name: &str) -> Result<Identity> {
    let identities: Vec<Identity> = api.list(&ListOpts::default().filter("name", name)).await?;
    debug!("Identity search for {} returned {} results", name, identities.len());

    identities
        .into_iter()
        .find(|i| i.name.as_deref() == Some(name))
        .ok_or_else(|| Error::not_found("identity", name))
}
