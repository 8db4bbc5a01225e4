//! Polling of asynchronously transitioning resources.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::api::RancherApi;
use crate::error::{Error, Result};
use crate::types::{Schema, Transition, Transitioning};

/// Interval between two reloads of a resource being waited on.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Suspends the run between polls.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub interval: Duration,
    /// Reloads before giving up; `None` polls until the resource settles.
    pub max_attempts: Option<u32>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }
}

/// Polls a single resource until a condition holds, reloading it in place.
#[derive(Clone)]
pub struct Waiter {
    config: WaitConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl Waiter {
    pub fn new(config: WaitConfig) -> Self {
        Self::with_sleeper(config, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(config: WaitConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { config, sleeper }
    }

    pub fn config(&self) -> WaitConfig {
        self.config
    }

    /// Reload `resource` until `settled` returns true.
    ///
    /// Reload errors are returned as-is without retrying.
    pub async fn wait_until<A, T, F>(&self, api: &A, resource: &mut T, settled: F) -> Result<()>
    where
        A: RancherApi,
        T: Schema,
        F: Fn(&T) -> bool + Send + Sync,
    {
        let mut attempts: u32 = 0;
        loop {
            if settled(resource) {
                return Ok(());
            }

            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(Error::WaitExhausted {
                    kind: T::TYPE,
                    id: resource.id().to_string(),
                    attempts,
                });
            }

            self.sleeper.sleep(self.config.interval).await;
            api.reload(resource).await?;
            attempts += 1;
            debug!("Polled {} {} ({} attempts)", T::TYPE, resource.id(), attempts);
        }
    }

    /// Wait until the transitioning flag reads `no`.
    pub async fn wait_for_transition<A, T>(&self, api: &A, resource: &mut T) -> Result<()>
    where
        A: RancherApi,
        T: Schema + Transitioning,
    {
        self.wait_until(api, resource, |r| r.transitioning() == Transition::No)
            .await
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(WaitConfig::default())
    }
}
