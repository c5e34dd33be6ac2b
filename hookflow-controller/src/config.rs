//! Controller configuration
//!
//! Defines all configurable parameters for the controller including
//! API endpoints, credentials and reconcile loop tuning.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Controller configuration
///
/// Every value can be given as a flag or through the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "hookflow-controller")]
#[command(about = "Keeps GitHub webhooks and deploy keys converged with Workflow objects", long_about = None)]
pub struct Config {
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

    /// GitHub token used to manage webhooks and deploy keys
    #[arg(long, env = "HOOKFLOW_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// YAML file with global pipeline defaults
    #[arg(long, env = "HOOKFLOW_DEFAULTS_FILE")]
    pub defaults_file: Option<PathBuf>,

    /// Seconds between reconcile cycles
    #[arg(long, env = "HOOKFLOW_POLL_INTERVAL", default_value_t = 30)]
    pub poll_interval_secs: u64,

    /// Maximum number of workflows reconciled concurrently
    #[arg(long, env = "HOOKFLOW_MAX_PARALLEL_RECONCILES", default_value_t = 4)]
    pub max_parallel_reconciles: usize,

    /// Seconds a single reconcile pass may take before it is abandoned
    #[arg(long, env = "HOOKFLOW_RECONCILE_TIMEOUT", default_value_t = 120)]
    pub reconcile_timeout_secs: u64,
}

impl Config {
    /// How often workflows are reconciled
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Upper bound for one reconcile pass
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
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

        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.reconcile_timeout_secs == 0 {
            anyhow::bail!("reconcile_timeout must be greater than 0");
        }

        if self.max_parallel_reconciles == 0 {
            anyhow::bail!("max_parallel_reconciles must be greater than 0");
        }

        Ok(())
    }
}
