//! Reconcilers for the different Rancher resource kinds.
//!
//! Each reconciler compares the desired state from the bootstrap
//! configuration with what the Rancher server reports and issues the
//! operations needed to converge. Reconcilers never handle errors; they
//! return them to the orchestrator.

pub mod accounts;
pub mod auth;
pub mod credentials;
pub mod environments;
pub mod membership;
pub mod registries;
pub mod tokens;

use std::fmt;

use async_trait::async_trait;

use crate::config::DesiredConfig;
use crate::error::Result;

pub use accounts::AccountsReconciler;
pub use auth::AuthReconciler;
pub use credentials::CredentialsReconciler;
pub use environments::EnvironmentsReconciler;
pub use membership::MembershipReconciler;
pub use registries::{RegistriesOutcome, RegistriesReconciler, ScopedApiKey};

/// Counts of operations issued by one reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    pub created: usize,
    pub deleted: usize,
    pub skipped: usize,
}

impl Outcome {
    pub fn merge(&mut self, other: Outcome) {
        self.created += other.created;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
    }

    /// Whether any mutating call was issued.
    pub fn changed(&self) -> bool {
        self.created + self.deleted > 0
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} deleted, {} unchanged",
            self.created, self.deleted, self.skipped
        )
    }
}

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Result reported back to the orchestrator.
    type Output: Send;

    /// Step name used in logs and errors.
    const STEP: &'static str;

    /// Compare desired vs observed state and converge.
    async fn reconcile(&self, config: &DesiredConfig) -> Result<Self::Output>;
}
