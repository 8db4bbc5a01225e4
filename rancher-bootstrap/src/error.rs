//! Error types for bootstrap operations.

use thiserror::Error;

/// Errors that can occur while reconciling a Rancher server.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure talking to the Rancher API.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// The Rancher API rejected the request.
    #[error("api error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// A required cross reference could not be resolved.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// More than one remote resource carries the same natural key.
    #[error("{count} {kind} resources named {name}")]
    Ambiguous {
        kind: &'static str,
        name: String,
        count: usize,
    },

    /// Resource has no link or action with the given name.
    #[error("{kind} {id} has no link {link}")]
    MissingLink {
        kind: String,
        id: String,
        link: String,
    },

    /// Gave up polling a transitioning resource.
    #[error("{kind} {id} still transitioning after {attempts} attempts")]
    WaitExhausted {
        kind: &'static str,
        id: String,
        attempts: u32,
    },

    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while handling a named resource.
    #[error("{kind} {name}: {source}")]
    Resource {
        kind: &'static str,
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// Failure inside a bootstrap step.
    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Walks through context wrappers to the underlying error.
    pub fn root(&self) -> &Error {
        match self {
            Error::Resource { source, .. } | Error::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach resource context to a result.
pub trait ResultExt<T> {
    fn for_resource(self, kind: &'static str, name: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn for_resource(self, kind: &'static str, name: &str) -> Result<T> {
        self.map_err(|source| Error::Resource {
            kind,
            name: name.to_string(),
            source: Box::new(source),
        })
    }
}

/// Result type for bootstrap operations.
pub type Result<T> = std::result::Result<T, Error>;
