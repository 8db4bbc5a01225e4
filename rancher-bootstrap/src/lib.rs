//! File driven Rancher configuration.
//!
//! Reconciles a Rancher server (LDAP auth backend, accounts, environments,
//! environment membership, registries and registry credentials) against a
//! declarative YAML document.

pub mod api;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod keys;
pub mod lookup;
pub mod matcher;
pub mod reconciler;
pub mod types;
pub mod wait;

pub use api::RancherApi;
pub use bootstrap::{Bootstrap, BootstrapReport};
pub use client::{ClientOpts, RancherClient};
pub use config::DesiredConfig;
pub use error::{Error, Result};
pub use wait::{WaitConfig, Waiter};
