//! GitHub REST client
//!
//! Implements [`HooksApi`](crate::HooksApi), [`DeployKeysApi`](crate::DeployKeysApi),
//! [`RepositoriesApi`](crate::RepositoriesApi) and [`ContentsApi`](crate::ContentsApi)
//! on top of the GitHub REST API.

mod contents;
mod hooks;
mod keys;
mod repos;

use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;

/// Default GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const ACCEPT_JSON: &str = "application/vnd.github+json";

const USER_AGENT: &str = "hookflow";

/// HTTP client for the GitHub REST API
#[derive(Debug, Clone)]
pub struct GithubClient {
    /// Base URL of the API (e.g., "https://api.github.com")
    base_url: String,
    /// Token sent as a bearer credential
    token: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl GithubClient {
    /// Create a new GitHub client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the API (e.g., "https://api.github.com")
    /// * `token` - Optional bearer token
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(base_url, token, Client::new())
    }

    /// Create a new GitHub client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, token: Option<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    /// Get the base URL of the API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a JSON request against `path`, with auth and API headers applied
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_accepting(method, path, ACCEPT_JSON)
    }

    fn request_accepting(&self, method: Method, path: &str, accept: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "GitHub API request");

        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, accept)
            .header(reqwest::header::USER_AGENT, USER_AGENT);

        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}
