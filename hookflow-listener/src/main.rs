//! Hookflow Listener
//!
//! HTTP endpoint GitHub webhooks deliver to. Each delivery is parsed,
//! authenticated against its workflow's webhook secret, filtered by the
//! workflow's trigger criteria and, when accepted, compiled into a pipeline
//! run and submitted to the cluster.

mod api;
mod config;
mod github;
mod service;
#[cfg(test)]
mod testing;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::service::EventSink;
use hookflow_client::{GithubClient, KubeClient};
use hookflow_pipeline::PipelineDefaults;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hookflow_listener=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hookflow Listener");

    let config = Config::parse();
    config.validate()?;

    let defaults = load_defaults(config.defaults_file.as_deref()).await?;
    let kube_token = read_token(&config.kube_token_file).await;

    let kube = Arc::new(KubeClient::new(config.kube_api_url.clone(), kube_token));
    let github = Arc::new(GithubClient::new(
        config.github_api_url.clone(),
        config.github_token.clone(),
    ));

    let sink = EventSink::new(
        kube.clone(),
        kube.clone(),
        github,
        kube,
        defaults,
        config.request_timeout(),
    );

    // Build router with all API endpoints
    let app = api::create_router(Arc::new(sink));

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    info!("Hookflow Listener stopped");
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

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
