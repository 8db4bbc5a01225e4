//! Remote resource client abstraction.
//!
//! Reconcilers only talk to Rancher through [`RancherApi`]. The HTTP
//! implementation lives in [`crate::client`]; tests substitute an in-memory
//! control plane.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::types::{ApiKey, ListOpts, Project, Resource, Schema};

/// Typed operations against a Rancher API endpoint.
#[async_trait]
pub trait RancherApi: Send + Sync + Sized + 'static {
    /// List a collection, narrowed by server-side filters.
    async fn list<T: Schema>(&self, opts: &ListOpts) -> Result<Vec<T>>;

    /// Create a resource in its collection.
    async fn create<T: Schema>(&self, spec: &T) -> Result<T>;

    /// Delete a resource.
    async fn delete<T: Schema>(&self, resource: &T) -> Result<()>;

    /// Refresh `resource` in place with its current representation.
    async fn reload<T: Schema>(&self, resource: &mut T) -> Result<()>;

    /// Fetch the collection behind one of the resource's links.
    async fn get_link<T: Schema>(&self, resource: &Resource, link: &str) -> Result<Vec<T>>;

    /// Create a resource through one of the owner's collection links.
    async fn create_link<T: Schema>(&self, owner: &Resource, link: &str, spec: &T) -> Result<T>;

    /// Invoke a named action on a resource.
    async fn action<T: DeserializeOwned + Send + 'static>(
        &self,
        resource: &Resource,
        action: &str,
        input: serde_json::Value,
    ) -> Result<T>;

    /// Build a client scoped to `project`, authenticated with `key`.
    fn scoped(&self, project: &Project, key: &ApiKey) -> Result<Self>;
}
