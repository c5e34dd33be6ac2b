//! Cluster API client
//!
//! Implements [`WorkflowStore`](crate::WorkflowStore), [`SecretStore`](crate::SecretStore)
//! and [`PipelineRunStore`](crate::PipelineRunStore) against a Kubernetes-style REST API.

mod pipeline_runs;
mod secrets;
mod workflows;

use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;

/// HTTP client for the cluster API server
#[derive(Debug, Clone)]
pub struct KubeClient {
    /// Base URL of the API server (e.g., "https://kubernetes.default.svc")
    base_url: String,
    /// Service account token sent as a bearer credential
    token: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl KubeClient {
    /// Create a new cluster client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the API server
    /// * `token` - Optional bearer token
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(base_url, token, Client::new())
    }

    /// Create a new cluster client with a custom HTTP client
    pub fn with_client(base_url: impl Into<String>, token: Option<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    /// Get the base URL of the API server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "Cluster API request");

        let builder = self.client.request(method, url);

        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}
