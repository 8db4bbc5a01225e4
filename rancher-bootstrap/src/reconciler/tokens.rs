//! Registration command lookup for enrolling hosts into a project.

use tracing::info;

use crate::api::RancherApi;
use crate::error::{Error, Result, ResultExt};
use crate::lookup::project_by_name;
use crate::types::RegistrationToken;
use crate::wait::Waiter;

fn has_command(token: &RegistrationToken) -> bool {
    token.command().is_some()
}

fn is_usable(token: &RegistrationToken) -> bool {
    token.state.as_deref() == Some("active") && has_command(token)
}

/// Return the host registration command of a project.
///
/// An existing token is used only when it is active and carries a command;
/// it is never waited on. A project without tokens gets a new one, which is
/// polled until its command is available.
pub async fn registration_command<A: RancherApi>(
    api: &A,
    waiter: &Waiter,
    project_name: &str,
) -> Result<String> {
    fetch_command(api, waiter, project_name)
        .await
        .for_resource("registration command of project", project_name)
}

async fn fetch_command<A: RancherApi>(
    api: &A,
    waiter: &Waiter,
    project_name: &str,
) -> Result<String> {
    let project = project_by_name(api, project_name).await?;
    let tokens: Vec<RegistrationToken> = api
        .get_link(&project.resource, "registrationTokens")
        .await?;

    if !tokens.is_empty() {
        return tokens
            .iter()
            .find(|t| is_usable(t))
            .and_then(RegistrationToken::command)
            .map(str::to_string)
            .ok_or_else(|| Error::not_found("active registration token", project_name));
    }

    info!("Creating command for: {}", project_name);
    let spec = RegistrationToken {
        account_id: Some(project.resource.id.clone()),
        ..Default::default()
    };
    let mut token = api
        .create_link(&project.resource, "registrationTokens", &spec)
        .await?;

    waiter.wait_until(api, &mut token, has_command).await?;
    Ok(token.command().unwrap_or_default().to_string())
}
