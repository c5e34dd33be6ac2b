//! In-memory fakes of the remote APIs, with a call log for idempotence checks

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use hookflow_client::{
    ClientError, DeployKeysApi, HooksApi, RepositoriesApi, Result, SecretStore, WorkflowStore,
};
use hookflow_core::domain::{Secret, Workflow};
use hookflow_core::dto::github::{Hook, Key, RemoteRepository};

#[derive(Debug, Default)]
pub struct GithubState {
    next_id: i64,
    pub hooks: BTreeMap<i64, Hook>,
    pub keys: BTreeMap<i64, Key>,
    pub repositories: BTreeMap<String, RemoteRepository>,
    pub calls: Vec<String>,
    /// Calls that fail, with the status they fail with
    pub failing: BTreeMap<&'static str, u16>,
    /// Calls that fail once
    failing_once: Vec<(String, u16)>,
}

impl GithubState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, call: &str, owner: &str, repo: &str) -> Result<()> {
        let line = format!("{} {}/{}", call, owner, repo);
        self.calls.push(line.clone());
        if let Some(&status) = self.failing.get(call) {
            return Err(ClientError::api_error(status, "injected failure"));
        }
        take_failure(&mut self.failing_once, &line)
    }
}

/// Pops the first one-shot failure matching `line`
///
/// A failure matches on the whole line (`create_key john-doe/tools`) or on
/// the call name alone (`create_key`).
fn take_failure(failures: &mut Vec<(String, u16)>, line: &str) -> Result<()> {
    let call = line.split(' ').next().unwrap_or_default();
    match failures
        .iter()
        .position(|(pattern, _)| pattern == line || pattern == call)
    {
        Some(index) => {
            let (_, status) = failures.remove(index);
            Err(ClientError::api_error(status, "transient"))
        }
        None => Ok(()),
    }
}

/// Fake GitHub holding webhooks, deploy keys and repository metadata
#[derive(Debug, Default)]
pub struct FakeGithub {
    pub state: Mutex<GithubState>,
}

impl FakeGithub {
    pub fn with_repository(self, full_name: &str, default_branch: &str, private: bool) -> Self {
        self.state.lock().unwrap().repositories.insert(
            full_name.to_string(),
            RemoteRepository {
                full_name: full_name.to_string(),
                default_branch: default_branch.to_string(),
                private,
            },
        );
        self
    }

    /// Number of recorded calls to `call`
    pub fn count(&self, call: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(call))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Makes the next call matching `call` fail with `status`
    pub fn fail_once(&self, call: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failing_once
            .push((call.to_string(), status));
    }
}

fn not_found(what: &str, id: i64) -> ClientError {
    ClientError::NotFound(format!("{} {}", what, id))
}

#[async_trait]
impl HooksApi for FakeGithub {
    async fn get_hook(&self, owner: &str, repo: &str, id: i64) -> Result<Hook> {
        let mut state = self.state.lock().unwrap();
        state.record("get_hook", owner, repo)?;
        state.hooks.get(&id).cloned().ok_or_else(|| not_found("hook", id))
    }

    async fn create_hook(&self, owner: &str, repo: &str, hook: &Hook) -> Result<Hook> {
        let mut state = self.state.lock().unwrap();
        state.record("create_hook", owner, repo)?;
        let id = state.next_id();
        let mut created = hook.clone();
        created.id = Some(id);
        state.hooks.insert(id, created.clone());
        Ok(created)
    }

    async fn edit_hook(&self, owner: &str, repo: &str, id: i64, hook: &Hook) -> Result<Hook> {
        let mut state = self.state.lock().unwrap();
        state.record("edit_hook", owner, repo)?;
        if !state.hooks.contains_key(&id) {
            return Err(not_found("hook", id));
        }
        let mut edited = hook.clone();
        edited.id = Some(id);
        state.hooks.insert(id, edited.clone());
        Ok(edited)
    }

    async fn delete_hook(&self, owner: &str, repo: &str, id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.record("delete_hook", owner, repo)?;
        state.hooks.remove(&id).map(|_| ()).ok_or_else(|| not_found("hook", id))
    }
}

#[async_trait]
impl DeployKeysApi for FakeGithub {
    async fn get_key(&self, owner: &str, repo: &str, id: i64) -> Result<Key> {
        let mut state = self.state.lock().unwrap();
        state.record("get_key", owner, repo)?;
        state.keys.get(&id).cloned().ok_or_else(|| not_found("key", id))
    }

    async fn create_key(&self, owner: &str, repo: &str, key: &Key) -> Result<Key> {
        let mut state = self.state.lock().unwrap();
        state.record("create_key", owner, repo)?;
        let id = state.next_id();
        let mut created = key.clone();
        created.id = Some(id);
        state.keys.insert(id, created.clone());
        Ok(created)
    }

    async fn delete_key(&self, owner: &str, repo: &str, id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.record("delete_key", owner, repo)?;
        state.keys.remove(&id).map(|_| ()).ok_or_else(|| not_found("key", id))
    }
}

#[async_trait]
impl RepositoriesApi for FakeGithub {
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<RemoteRepository> {
        let mut state = self.state.lock().unwrap();
        state.record("get_repository", owner, repo)?;
        let full_name = format!("{}/{}", owner, repo);
        state
            .repositories
            .get(&full_name)
            .cloned()
            .ok_or(ClientError::NotFound(full_name))
    }
}

/// Fake cluster storage for secrets and workflows
#[derive(Debug, Default)]
pub struct FakeCluster {
    pub secrets: Mutex<BTreeMap<String, Secret>>,
    pub workflows: Mutex<BTreeMap<String, Workflow>>,
    pub status_updates: Mutex<usize>,
    failing_once: Mutex<Vec<(String, u16)>>,
}

impl FakeCluster {
    pub fn with_workflow(self, workflow: Workflow) -> Self {
        self.workflows
            .lock()
            .unwrap()
            .insert(workflow.metadata.key(), workflow);
        self
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&format!("{}/{}", namespace, name))
            .cloned()
    }

    /// Makes the next secret call matching `call` fail with `status`
    ///
    /// `call` is a call name (`create_secret`) optionally followed by the
    /// secret key (`create_secret dev/hello-webhook-secret`).
    pub fn fail_once(&self, call: &str, status: u16) {
        self.failing_once
            .lock()
            .unwrap()
            .push((call.to_string(), status));
    }

    fn check(&self, call: &str, key: &str) -> Result<()> {
        take_failure(
            &mut self.failing_once.lock().unwrap(),
            &format!("{} {}", call, key),
        )
    }

    pub fn workflow(&self, namespace: &str, name: &str) -> Option<Workflow> {
        self.workflows
            .lock()
            .unwrap()
            .get(&format!("{}/{}", namespace, name))
            .cloned()
    }
}

#[async_trait]
impl SecretStore for FakeCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.check("get_secret", &format!("{}/{}", namespace, name))?;
        self.secret(namespace, name)
            .ok_or_else(|| ClientError::NotFound(format!("secret {}/{}", namespace, name)))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret> {
        let key = secret.metadata.key();
        self.check("create_secret", &key)?;
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&key) {
            return Err(ClientError::api_error(409, "already exists"));
        }
        secrets.insert(key, secret.clone());
        Ok(secret.clone())
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret> {
        let key = secret.metadata.key();
        self.check("update_secret", &key)?;
        let mut secrets = self.secrets.lock().unwrap();
        if !secrets.contains_key(&key) {
            return Err(ClientError::NotFound(key));
        }
        secrets.insert(key, secret.clone());
        Ok(secret.clone())
    }
}

#[async_trait]
impl WorkflowStore for FakeCluster {
    async fn get_workflow(&self, namespace: &str, name: &str) -> Result<Workflow> {
        self.workflow(namespace, name)
            .ok_or_else(|| ClientError::NotFound(format!("workflow {}/{}", namespace, name)))
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        Ok(self.workflows.lock().unwrap().values().cloned().collect())
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<Workflow> {
        let mut workflows = self.workflows.lock().unwrap();
        let stored = workflows
            .get_mut(&workflow.metadata.key())
            .ok_or_else(|| ClientError::NotFound(workflow.metadata.key()))?;
        stored.metadata = workflow.metadata.clone();
        stored.spec = workflow.spec.clone();
        Ok(stored.clone())
    }

    async fn update_status(&self, workflow: &Workflow) -> Result<Workflow> {
        let mut workflows = self.workflows.lock().unwrap();
        let stored = workflows
            .get_mut(&workflow.metadata.key())
            .ok_or_else(|| ClientError::NotFound(workflow.metadata.key()))?;
        stored.status = workflow.status.clone();
        *self.status_updates.lock().unwrap() += 1;
        Ok(stored.clone())
    }
}
