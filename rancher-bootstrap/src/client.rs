//! HTTP client for the Rancher v1 REST API.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::RancherApi;
use crate::error::{Error, Result};
use crate::types::{ApiKey, Collection, ListOpts, Project, Resource, Schema};

/// Connection options for a Rancher endpoint.
#[derive(Debug, Clone, Default)]
pub struct ClientOpts {
    /// API root, e.g. `http://rancher:8080/v1`.
    pub url: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl ClientOpts {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_keys(mut self, access_key: &str, secret_key: &str) -> Self {
        self.access_key = Some(access_key.to_string());
        self.secret_key = Some(secret_key.to_string());
        self
    }

    pub fn has_keys(&self) -> bool {
        self.access_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.secret_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Error body returned by Rancher for failed requests.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
    #[serde(rename = "fieldName")]
    field_name: Option<String>,
}

/// Rancher API client over HTTP.
#[derive(Debug, Clone)]
pub struct RancherClient {
    http: reqwest::Client,
    opts: ClientOpts,
}

impl RancherClient {
    pub fn new(opts: ClientOpts) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, opts })
    }

    pub fn opts(&self) -> &ClientOpts {
        &self.opts
    }

    fn root(&self) -> &str {
        self.opts.url.trim_end_matches('/')
    }

    fn collection_url<T: Schema>(&self) -> String {
        format!("{}/{}", self.root(), T::COLLECTION)
    }

    fn self_url<T: Schema>(&self, resource: &Resource) -> String {
        match resource.links.get("self") {
            Some(url) => url.clone(),
            None => format!("{}/{}", self.collection_url::<T>(), resource.id),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match (&self.opts.access_key, &self.opts.secret_key) {
            (Some(access), Some(secret)) => builder.basic_auth(access, Some(secret)),
            _ => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = check(builder.send().await?).await?;
        Ok(response.json().await?)
    }
}

/// Turn non-success responses into [`Error::Api`].
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let mut message = body.message.unwrap_or(text);
    if let Some(field) = body.field_name {
        message = format!("{} (field {})", message, field);
    }

    Err(Error::Api {
        status: status.as_u16(),
        code: body
            .code
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string()),
        message,
    })
}

fn link<'a>(
    resource: &Resource,
    map: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str> {
    map.get(name).map(String::as_str).ok_or_else(|| Error::MissingLink {
        kind: resource.resource_type.clone(),
        id: resource.id.clone(),
        link: name.to_string(),
    })
}

#[async_trait]
impl RancherApi for RancherClient {
    async fn list<T: Schema>(&self, opts: &ListOpts) -> Result<Vec<T>> {
        let url = self.collection_url::<T>();
        let builder = self.request(Method::GET, &url).query(&opts.filters);
        let collection: Collection<T> = self.send(builder).await?;
        Ok(collection.data)
    }

    async fn create<T: Schema>(&self, spec: &T) -> Result<T> {
        let url = self.collection_url::<T>();
        self.send(self.request(Method::POST, &url).json(spec)).await
    }

    async fn delete<T: Schema>(&self, resource: &T) -> Result<()> {
        let url = self.self_url::<T>(resource.resource());
        check(self.request(Method::DELETE, &url).send().await?).await?;
        Ok(())
    }

    async fn reload<T: Schema>(&self, resource: &mut T) -> Result<()> {
        let url = self.self_url::<T>(resource.resource());
        *resource = self.send(self.request(Method::GET, &url)).await?;
        Ok(())
    }

    async fn get_link<T: Schema>(&self, resource: &Resource, name: &str) -> Result<Vec<T>> {
        let url = link(resource, &resource.links, name)?;
        let collection: Collection<T> = self.send(self.request(Method::GET, url)).await?;
        Ok(collection.data)
    }

    async fn create_link<T: Schema>(&self, owner: &Resource, name: &str, spec: &T) -> Result<T> {
        let url = link(owner, &owner.links, name)?;
        self.send(self.request(Method::POST, url).json(spec)).await
    }

    async fn action<T: DeserializeOwned + Send + 'static>(
        &self,
        resource: &Resource,
        action: &str,
        input: serde_json::Value,
    ) -> Result<T> {
        let url = link(resource, &resource.actions, action)?;
        self.send(self.request(Method::POST, url).json(&input)).await
    }

    fn scoped(&self, project: &Project, key: &ApiKey) -> Result<Self> {
        let (Some(access), Some(secret)) = (&key.public_value, &key.secret_value) else {
            return Err(Error::Config(format!(
                "api key {} for project {} has no key pair",
                key.id(),
                project.name()
            )));
        };

        Ok(Self {
            http: self.http.clone(),
            opts: ClientOpts::new(format!("{}/projects/{}", self.root(), project.id()))
                .with_keys(access, secret),
        })
    }
}
