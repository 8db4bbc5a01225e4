//! rancher-bootstrap: file driven Rancher configuration.
//!
//! Reads the desired state from a YAML file and reconciles the Rancher
//! server against it:
//! - Enables the LDAP auth backend
//! - Adds accounts and environments, purges environments marked `Purged`
//! - Adds environment members
//! - Configures registries and their credentials per environment

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rancher_bootstrap::keys::{KeyStore, ensure_admin_keys};
use rancher_bootstrap::{Bootstrap, ClientOpts, DesiredConfig, RancherClient, Waiter};

/// File driven Rancher configuration
#[derive(Parser, Debug)]
#[command(name = "rancher-bootstrap", version, about)]
struct Args {
    /// Path to config file
    #[arg(short, long = "config-file", default_value = "./config.yml", global = true)]
    config_file: PathBuf,

    /// Path where admin keys will be stored
    #[arg(short, long = "key-file", default_value = "./.keys", global = true)]
    key_file: PathBuf,

    /// Interval between polls of transitioning resources, in milliseconds
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Give up waiting on a transitioning resource after this many polls
    #[arg(long, global = true)]
    max_poll_attempts: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the server against the config file (default)
    Apply,

    /// Get the registration command for nodes
    #[command(visible_alias = "rc")]
    RegistrationCommand {
        /// Environment names
        #[arg(required = true)]
        projects: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rancher_bootstrap=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = DesiredConfig::load(&args.config_file)
        .with_context(|| format!("Could not load config {}", args.config_file.display()))?;
    info!("Using Rancher URL: {}", config.server.url);

    let mut wait = config.wait.to_config();
    if let Some(ms) = args.poll_interval_ms {
        wait.interval = Duration::from_millis(ms);
    }
    if args.max_poll_attempts.is_some() {
        wait.max_attempts = args.max_poll_attempts;
    }
    let waiter = Waiter::new(wait);

    let anonymous = RancherClient::new(ClientOpts::new(&config.server.url))?;
    let keys = ensure_admin_keys(&KeyStore::new(&args.key_file), &anonymous)
        .await
        .context("Failed to get admin API keys")?;
    info!("Using Access Key: {}", keys.access_key);

    let client = RancherClient::new(
        ClientOpts::new(&config.server.url).with_keys(&keys.access_key, &keys.secret_key),
    )?;
    let bootstrap = Bootstrap::new(Arc::new(client), waiter);

    match args.command.unwrap_or(Commands::Apply) {
        Commands::Apply => {
            let report = bootstrap
                .run(&config)
                .await
                .context("Failed to bootstrap Rancher")?;
            if report.changed() {
                info!("Bootstrap complete");
            } else {
                info!("Bootstrap complete, nothing to change");
            }
        }
        Commands::RegistrationCommand { projects } => {
            for project in &projects {
                let command = bootstrap
                    .registration_command(project)
                    .await
                    .with_context(|| {
                        format!("Could not get registration command for: {}", project)
                    })?;
                println!("{}", command);
            }
        }
    }

    Ok(())
}
