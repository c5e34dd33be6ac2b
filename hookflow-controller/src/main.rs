//! Hookflow Controller
//!
//! Keeps the GitHub side of every Workflow converged with what it declares.
//!
//! Architecture:
//! - Configuration: flags and environment, validated on startup
//! - Clients: GitHub and cluster APIs behind the traits of `hookflow-client`
//! - Services: syncers for webhooks, deploy keys and repository metadata,
//!   secret management, and the reconciler driving them
//! - Scheduler: periodic listing of workflows and per-workflow passes
//!
//! Each pass records remote identifiers and a Ready condition on the
//! workflow status. Deleted workflows are finalized by removing their
//! webhook and deploy keys before the finalizer is released.

mod config;
mod error;
mod keys;
mod scheduler;
mod service;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::scheduler::WorkflowPoller;
use crate::service::{
    DeployKeySyncer, Reconciler, RepositorySyncer, SecretManager, WebhookSyncer,
};
use hookflow_client::{GithubClient, KubeClient, WorkflowStore};
use hookflow_pipeline::PipelineDefaults;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hookflow_controller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hookflow Controller");

    let config = Config::parse();
    config.validate()?;
    info!(
        "Loaded configuration: kube_api_url={}, github_api_url={}",
        config.kube_api_url, config.github_api_url
    );

    let defaults = load_defaults(config.defaults_file.as_deref()).await?;
    let kube_token = read_token(&config.kube_token_file).await;

    // Initialize clients
    let kube = Arc::new(KubeClient::new(config.kube_api_url.clone(), kube_token));
    let github = Arc::new(GithubClient::new(
        config.github_api_url.clone(),
        config.github_token.clone(),
    ));

    info!("Clients initialized");

    wait_for_api(kube.as_ref()).await?;

    // Initialize services
    let reconciler = Arc::new(Reconciler::new(
        RepositorySyncer::new(github.clone()),
        Arc::new(WebhookSyncer::new(github.clone())),
        Arc::new(DeployKeySyncer::new(github)),
        SecretManager::new(kube.clone()),
        defaults,
    ));

    info!("Services initialized");

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let poller = WorkflowPoller::new(config.clone(), kube, reconciler, shutdown);

    info!(
        "Poll interval: {:?}, reconcile timeout: {:?}, max parallel reconciles: {}",
        config.poll_interval(),
        config.reconcile_timeout(),
        config.max_parallel_reconciles
    );

    if let Err(e) = poller.run().await {
        error!("Poller error: {}", e);
        return Err(e);
    }

    info!("Hookflow Controller stopped");
    Ok(())
}

/// Loads global pipeline defaults, falling back to built-in values
async fn load_defaults(path: Option<&Path>) -> Result<PipelineDefaults> {
    let Some(path) = path else {
        info!("No defaults file configured, using built-in defaults");
        return Ok(PipelineDefaults::default());
    };

    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read defaults file {}", path.display()))?;

    PipelineDefaults::from_yaml(&text)
        .with_context(|| format!("Invalid defaults file {}", path.display()))
}

/// Reads the cluster API token, if one is mounted
async fn read_token(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(token) => Some(token.trim().to_string()),
        Err(e) => {
            warn!(
                "No cluster API token at {} ({}), sending unauthenticated requests",
                path.display(),
                e
            );
            None
        }
    }
}

/// Cancels `shutdown` on Ctrl-C
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown.cancel();
    });
}

/// Waits for the cluster API with retry logic and exponential backoff
///
/// This handles the case where the API server is not reachable yet when
/// the controller starts (common in container environments).
async fn wait_for_api(store: &dyn WorkflowStore) -> Result<()> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match store.list_workflows().await {
            Ok(workflows) => {
                info!(
                    "Cluster API reachable after {} attempt(s), {} workflow(s) found",
                    attempt,
                    workflows.len()
                );
                return Ok(());
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    error!("Cluster API unreachable after {} attempts", MAX_RETRIES);
                    return Err(anyhow::anyhow!("Failed to reach the cluster API: {}", e));
                }

                warn!(
                    "Failed to reach the cluster API (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
