//! Hookflow HTTP Clients
//!
//! Type-safe clients for the two remote APIs Hookflow talks to:
//!
//! - [`GithubClient`]: webhooks, deploy keys, repository metadata and file contents
//! - [`KubeClient`]: Workflow objects, Secrets and PipelineRun submission
//!
//! Both implement the traits in [`api`], which is what the controller and
//! listener services depend on.
//!
//! # Example
//!
//! ```no_run
//! use hookflow_client::{GithubClient, RepositoriesApi};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hookflow_client::ClientError> {
//!     let github = GithubClient::new("https://api.github.com", None);
//!     let repo = github.get_repository("john-doe", "my-repo").await?;
//!
//!     println!("default branch: {}", repo.default_branch);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
mod github;
mod kube;
mod response;

// Re-export commonly used types
pub use api::{
    ContentsApi, DeployKeysApi, HooksApi, PipelineRunStore, RepositoriesApi, SecretStore,
    WorkflowStore,
};
pub use error::{ClientError, Result};
pub use github::{DEFAULT_API_URL, GithubClient};
pub use kube::KubeClient;
