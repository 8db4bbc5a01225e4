//! Persisted admin API key pair.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::RancherApi;
use crate::error::{Error, Result};
use crate::types::ApiKey;

/// Account owning the admin key pair.
pub const ADMIN_ACCOUNT_ID: &str = "1a1";

/// Admin access key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminKeys {
    pub access_key: String,
    pub secret_key: String,
}

/// YAML file holding the admin key pair.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored keys; `None` if the file is absent or incomplete.
    pub fn load(&self) -> Result<Option<AdminKeys>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Key file {} not found", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let keys: Option<AdminKeys> = serde_yaml::from_str(&text)?;
        Ok(keys.filter(|k| !k.access_key.is_empty() && !k.secret_key.is_empty()))
    }

    pub fn save(&self, keys: &AdminKeys) -> Result<()> {
        std::fs::write(&self.path, serde_yaml::to_string(keys)?)?;
        Ok(())
    }
}

/// Return the stored admin keys, generating and persisting a new pair if
/// none are stored yet.
pub async fn ensure_admin_keys<A: RancherApi>(store: &KeyStore, api: &A) -> Result<AdminKeys> {
    if let Some(keys) = store.load()? {
        return Ok(keys);
    }

    info!("Generating admin API keys");
    let key = api.create(&ApiKey::for_account(ADMIN_ACCOUNT_ID)).await?;
    let (Some(access_key), Some(secret_key)) = (key.public_value, key.secret_value) else {
        return Err(Error::Config(format!(
            "api key {} was created without a key pair",
            key.resource.id
        )));
    };

    let keys = AdminKeys {
        access_key,
        secret_key,
    };
    store.save(&keys)?;
    info!("Stored admin API keys in {}", store.path().display());
    Ok(keys)
}
