//! In-memory fakes of the cluster and GitHub contents APIs

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use hookflow_client::{
    ClientError, ContentsApi, PipelineRunStore, Result, SecretStore, WorkflowStore,
};
use hookflow_core::domain::pipeline_run::PipelineRun;
use hookflow_core::domain::{ObjectMeta, Secret, Workflow};

use crate::service::event_sink::SECRET_TOKEN_KEY;

/// Fake cluster holding workflows, secrets and submitted pipeline runs
#[derive(Debug, Default)]
pub struct FakeCluster {
    workflows: BTreeMap<String, Workflow>,
    secrets: BTreeMap<String, Secret>,
    /// Calls that fail, with the status they fail with
    failing: BTreeMap<&'static str, u16>,
    pub pipeline_runs: Mutex<Vec<PipelineRun>>,
}

impl FakeCluster {
    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflows.insert(workflow.metadata.key(), workflow);
        self
    }

    /// Stores the webhook secret of workflow `namespace/name`
    pub fn with_webhook_secret(mut self, namespace: &str, name: &str, token: &[u8]) -> Self {
        let mut secret = Secret::new(ObjectMeta::named(namespace, format!("{}-webhook-secret", name)));
        secret.data.insert(SECRET_TOKEN_KEY.to_string(), token.to_vec());
        self.secrets.insert(secret.metadata.key(), secret);
        self
    }

    pub fn failing(mut self, call: &'static str, status: u16) -> Self {
        self.failing.insert(call, status);
        self
    }

    fn check(&self, call: &str) -> Result<()> {
        match self.failing.get(call) {
            Some(&status) => Err(ClientError::api_error(status, "injected failure")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WorkflowStore for FakeCluster {
    async fn get_workflow(&self, namespace: &str, name: &str) -> Result<Workflow> {
        self.check("get_workflow")?;
        self.workflows
            .get(&format!("{}/{}", namespace, name))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("workflow {}/{}", namespace, name)))
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        Ok(self.workflows.values().cloned().collect())
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<Workflow> {
        Ok(workflow.clone())
    }

    async fn update_status(&self, workflow: &Workflow) -> Result<Workflow> {
        Ok(workflow.clone())
    }
}

#[async_trait]
impl SecretStore for FakeCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.check("get_secret")?;
        self.secrets
            .get(&format!("{}/{}", namespace, name))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("secret {}/{}", namespace, name)))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret> {
        Ok(secret.clone())
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret> {
        Ok(secret.clone())
    }
}

#[async_trait]
impl PipelineRunStore for FakeCluster {
    /// Names runs `{generateName}{n}`, n counting submissions from 1
    async fn create_pipeline_run(&self, pipeline_run: &PipelineRun) -> Result<PipelineRun> {
        self.check("create_pipeline_run")?;
        let mut runs = self.pipeline_runs.lock().unwrap();

        let mut created = pipeline_run.clone();
        created.metadata.name = format!("{}{}", pipeline_run.metadata.generate_name, runs.len() + 1);
        runs.push(created.clone());
        Ok(created)
    }
}

/// Fake GitHub contents API keyed by repository, path and ref
#[derive(Debug, Default)]
pub struct FakeContents {
    files: Mutex<BTreeMap<(String, String, String), Vec<u8>>>,
    failure: Mutex<Option<u16>>,
}

impl FakeContents {
    pub fn insert(&self, repository: &str, path: &str, git_ref: &str, contents: &str) {
        self.files.lock().unwrap().insert(
            (repository.to_string(), path.to_string(), git_ref.to_string()),
            contents.as_bytes().to_vec(),
        );
    }

    /// Makes every read fail with `status`
    pub fn fail_with(&self, status: u16) {
        *self.failure.lock().unwrap() = Some(status);
    }
}

#[async_trait]
impl ContentsApi for FakeContents {
    async fn get_file(&self, owner: &str, repo: &str, path: &str, git_ref: &str) -> Result<Vec<u8>> {
        if let Some(status) = *self.failure.lock().unwrap() {
            return Err(ClientError::api_error(status, "injected failure"));
        }

        let key = (format!("{}/{}", owner, repo), path.to_string(), git_ref.to_string());
        self.files
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(path.to_string()))
    }
}
