//! Existence matching of desired resources against observed ones.
//!
//! Matching is by natural key with exact, case-sensitive equality. A desired
//! resource without a key never matches.

use crate::types::{Account, Project, Registry, RegistryCredential};

/// Credential kind accepted by [`credential_key`].
pub const REGISTRY_CREDENTIAL_KIND: &str = "registryCredential";

/// Whether any observed item shares the desired item's key.
pub fn exists<D, O, F, G>(desired: &D, observed: &[O], desired_key: F, observed_key: G) -> bool
where
    F: Fn(&D) -> Option<&str>,
    G: Fn(&O) -> Option<&str>,
{
    find(desired, observed, desired_key, observed_key).is_some()
}

/// First observed item sharing the desired item's key.
pub fn find<'a, D, O, F, G>(
    desired: &D,
    observed: &'a [O],
    desired_key: F,
    observed_key: G,
) -> Option<&'a O>
where
    F: Fn(&D) -> Option<&str>,
    G: Fn(&O) -> Option<&str>,
{
    let key = desired_key(desired)?;
    observed.iter().find(|item| observed_key(*item) == Some(key))
}

pub fn account_key(account: &Account) -> Option<&str> {
    account.external_id.as_deref()
}

pub fn project_key(project: &Project) -> Option<&str> {
    project.name.as_deref()
}

pub fn registry_key(registry: &Registry) -> Option<&str> {
    registry.server_address.as_deref()
}

/// Email of a registry credential; other credential kinds have no key.
pub fn credential_key(credential: &RegistryCredential) -> Option<&str> {
    match credential.kind.as_deref() {
        Some(REGISTRY_CREDENTIAL_KIND) => credential.email.as_deref(),
        _ => None,
    }
}

pub fn account_exists(desired: &Account, observed: &[Account]) -> bool {
    exists(desired, observed, account_key, account_key)
}

pub fn project_exists(desired: &Project, observed: &[Project]) -> bool {
    exists(desired, observed, project_key, project_key)
}

pub fn find_registry<'a>(desired: &Registry, observed: &'a [Registry]) -> Option<&'a Registry> {
    find(desired, observed, registry_key, registry_key)
}

/// Whether a registry credential with the desired email is already attached
/// to the desired registry.
pub fn credential_exists(desired: &RegistryCredential, observed: &[RegistryCredential]) -> bool {
    let same_registry: Vec<&RegistryCredential> = observed
        .iter()
        .filter(|c| c.registry_id == desired.registry_id)
        .collect();
    exists(
        desired,
        &same_registry,
        |c: &RegistryCredential| c.email.as_deref(),
        |c: &&RegistryCredential| credential_key(c),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(address: &str) -> Registry {
        Registry {
            server_address: Some(address.to_string()),
            ..Default::default()
        }
    }

    fn credential(email: &str, kind: &str) -> RegistryCredential {
        RegistryCredential {
            email: Some(email.to_string()),
            kind: Some(kind.to_string()),
            registry_id: Some("1sp1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn registry_match_is_case_sensitive() {
        let observed = vec![registry("Registry.example.com")];
        assert!(find_registry(&registry("registry.example.com"), &observed).is_none());

        let observed = vec![registry("other.example.com"), registry("registry.example.com")];
        let found = find_registry(&registry("registry.example.com"), &observed).unwrap();
        assert_eq!(found.server_address.as_deref(), Some("registry.example.com"));
    }

    #[test]
    fn account_matches_on_external_id_only() {
        let desired = Account {
            name: Some("ops".to_string()),
            external_id: Some("cn=ops,dc=example".to_string()),
            ..Default::default()
        };
        let observed = vec![Account {
            name: Some("renamed".to_string()),
            external_id: Some("cn=ops,dc=example".to_string()),
            ..Default::default()
        }];
        assert!(account_exists(&desired, &observed));

        let observed = vec![Account {
            name: Some("ops".to_string()),
            external_id: None,
            ..Default::default()
        }];
        assert!(!account_exists(&desired, &observed));
    }

    #[test]
    fn desired_without_key_never_matches() {
        let desired = Account::default();
        let observed = vec![Account::default()];
        assert!(!account_exists(&desired, &observed));
    }

    #[test]
    fn project_matches_exact_name() {
        let desired = Project {
            name: Some("team-a".to_string()),
            ..Default::default()
        };
        let observed = vec![Project {
            name: Some("team-a ".to_string()),
            ..Default::default()
        }];
        assert!(!project_exists(&desired, &observed));
    }

    #[test]
    fn credential_requires_registry_kind() {
        let desired = credential("ci@example.com", "");
        let observed = vec![credential("ci@example.com", "apiKey")];
        assert!(!credential_exists(&desired, &observed));

        let observed = vec![credential("ci@example.com", REGISTRY_CREDENTIAL_KIND)];
        assert!(credential_exists(&desired, &observed));
    }

    #[test]
    fn credential_is_scoped_to_its_registry() {
        let desired = credential("ci@example.com", "");
        let mut other = credential("ci@example.com", REGISTRY_CREDENTIAL_KIND);
        other.registry_id = Some("1sp2".to_string());

        assert!(!credential_exists(&desired, &[other]));
    }
}
