//! Listener configuration
//!
//! Bind address, API endpoints, credentials and request handling limits.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Listener configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "hookflow-listener")]
#[command(about = "Receives GitHub webhook deliveries and submits pipeline runs", long_about = None)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "HOOKFLOW_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// Cluster API server URL
    #[arg(
        long,
        env = "HOOKFLOW_KUBE_API_URL",
        default_value = "https://kubernetes.default.svc"
    )]
    pub kube_api_url: String,

    /// File holding the bearer token for the cluster API
    #[arg(
        long,
        env = "HOOKFLOW_KUBE_TOKEN_FILE",
        default_value = "/var/run/secrets/kubernetes.io/serviceaccount/token"
    )]
    pub kube_token_file: PathBuf,

    /// GitHub API URL
    #[arg(long, env = "HOOKFLOW_GITHUB_API_URL", default_value = hookflow_client::DEFAULT_API_URL)]
    pub github_api_url: String,

    /// GitHub token used to read workflow files from repositories
    #[arg(long, env = "HOOKFLOW_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// YAML file with global pipeline defaults
    #[arg(long, env = "HOOKFLOW_DEFAULTS_FILE")]
    pub defaults_file: Option<PathBuf>,

    /// Seconds a delivery may take before it is answered with an error
    #[arg(long, env = "HOOKFLOW_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl Config {
    /// Upper bound for handling one delivery
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            anyhow::bail!("bind_addr must be a socket address, got {}", self.bind_addr);
        }

        for (name, url) in [
            ("kube_api_url", &self.kube_api_url),
            ("github_api_url", &self.github_api_url),
        ] {
            if url.is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }

            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        Ok(())
    }
}
