//! API traits
//!
//! Stateless interfaces over the remote APIs the controller and listener
//! depend on. Services hold these as trait objects so tests can substitute
//! in-memory fakes.
//!
//! Every method is an async call that can be cancelled by dropping the
//! returned future; callers bound them with `tokio::time::timeout`.

use async_trait::async_trait;
use hookflow_core::domain::pipeline_run::PipelineRun;
use hookflow_core::domain::workflow::Workflow;
use hookflow_core::domain::Secret;
use hookflow_core::dto::github::{Hook, Key, RemoteRepository};

use crate::error::Result;

/// Repository webhooks
#[async_trait]
pub trait HooksApi: Send + Sync {
    /// Fetches a webhook
    ///
    /// # Arguments
    /// * `owner` - Repository owner
    /// * `repo` - Repository name
    /// * `id` - Webhook id
    async fn get_hook(&self, owner: &str, repo: &str, id: i64) -> Result<Hook>;

    /// Installs a webhook and returns it with its assigned id
    async fn create_hook(&self, owner: &str, repo: &str, hook: &Hook) -> Result<Hook>;

    /// Replaces the settings of an existing webhook
    async fn edit_hook(&self, owner: &str, repo: &str, id: i64, hook: &Hook) -> Result<Hook>;

    async fn delete_hook(&self, owner: &str, repo: &str, id: i64) -> Result<()>;
}

/// Repository deploy keys
#[async_trait]
pub trait DeployKeysApi: Send + Sync {
    async fn get_key(&self, owner: &str, repo: &str, id: i64) -> Result<Key>;

    /// Adds a deploy key and returns it with its assigned id
    async fn create_key(&self, owner: &str, repo: &str, key: &Key) -> Result<Key>;

    async fn delete_key(&self, owner: &str, repo: &str, id: i64) -> Result<()>;
}

/// Repository metadata
#[async_trait]
pub trait RepositoriesApi: Send + Sync {
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<RemoteRepository>;
}

/// File contents
#[async_trait]
pub trait ContentsApi: Send + Sync {
    /// Reads the raw contents of a file
    ///
    /// # Arguments
    /// * `owner` - Repository owner
    /// * `repo` - Repository name
    /// * `path` - Path of the file relative to the repository root
    /// * `git_ref` - Commit SHA, branch or tag to read from
    ///
    /// # Returns
    /// The file bytes, or a not-found error when the file does not exist at `git_ref`
    async fn get_file(&self, owner: &str, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>>;
}

/// Stored Workflow objects
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get_workflow(&self, namespace: &str, name: &str) -> Result<Workflow>;

    /// Lists workflows across all namespaces
    async fn list_workflows(&self) -> Result<Vec<Workflow>>;

    /// Persists metadata and spec changes (e.g. finalizers)
    async fn update_workflow(&self, workflow: &Workflow) -> Result<Workflow>;

    /// Persists the status subresource
    async fn update_status(&self, workflow: &Workflow) -> Result<Workflow>;
}

/// Stored Secret objects
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;

    async fn create_secret(&self, secret: &Secret) -> Result<Secret>;

    async fn update_secret(&self, secret: &Secret) -> Result<Secret>;
}

/// Pipeline-run submission
#[async_trait]
pub trait PipelineRunStore: Send + Sync {
    /// Submits a pipeline run and returns it with its generated name
    async fn create_pipeline_run(&self, pipeline_run: &PipelineRun) -> Result<PipelineRun>;
}
