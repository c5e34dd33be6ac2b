//! Deploy key syncer
//!
//! Installs an SSH deploy key on every repository of a workflow that needs
//! one to be checked out. GitHub keys cannot be edited, so a key whose
//! read-only flag drifted is deleted and recreated with new key material.

use std::sync::Arc;

use async_trait::async_trait;
use hookflow_client::{ClientError, DeployKeysApi};
use hookflow_core::domain::{
    Repository, SyncAction, SyncKind, SyncResult, SyncResultEntry, Workflow,
};
use hookflow_core::dto::github::Key;
use tracing::{debug, info, warn};

use super::syncer::{ResourceSyncer, is_gone};
use crate::error::SyncError;
use crate::keys;

/// Syncer for per-repository deploy keys
pub struct DeployKeySyncer {
    keys: Arc<dyn DeployKeysApi>,
}

impl DeployKeySyncer {
    pub fn new(keys: Arc<dyn DeployKeysApi>) -> Self {
        Self { keys }
    }

    /// Adds a deploy key backed by a freshly generated key pair
    async fn create(
        &self,
        workflow: &Workflow,
        repo: &Repository,
        action: SyncAction,
    ) -> Result<SyncResultEntry, SyncError> {
        let pair = keys::generate_key_pair(repo).map_err(|source| SyncError::KeyGeneration {
            repository: repo.to_string(),
            source,
        })?;

        let key = Key {
            id: None,
            key: pair.public_key.clone(),
            title: format!("{}-ssh-public-key", workflow.name()),
            read_only: repo.wants_read_only_key(),
        };

        let created = self
            .keys
            .create_key(&repo.owner, &repo.name, &key)
            .await
            .map_err(|e| SyncError::deploy_key(repo, e))?;
        let id = created.id.ok_or_else(|| {
            SyncError::deploy_key(
                repo,
                ClientError::ParseError("created deploy key has no id".to_string()),
            )
        })?;

        info!(repository = %repo, key_id = id, read_only = key.read_only, "Created deploy key");

        Ok(SyncResultEntry {
            id,
            repository: repo.clone(),
            action,
            secret: Some(pair.private_key),
        })
    }

    /// Deletes a key, treating an already deleted one as success
    async fn remove(&self, repo: &Repository, id: i64) -> Result<(), SyncError> {
        match self.keys.delete_key(&repo.owner, &repo.name, id).await {
            Ok(()) => {
                info!(repository = %repo, key_id = id, "Deleted deploy key");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(repository = %repo, key_id = id, "Deploy key was already deleted");
                Ok(())
            }
            Err(e) => Err(SyncError::deploy_key(repo, e)),
        }
    }

    async fn sync_repository(
        &self,
        workflow: &Workflow,
        repo: &Repository,
    ) -> Result<Option<SyncResultEntry>, SyncError> {
        let Some(id) = workflow.deploy_key_id(repo) else {
            return self.create(workflow, repo, SyncAction::Created).await.map(Some);
        };

        let current = match self.keys.get_key(&repo.owner, &repo.name, id).await {
            Ok(key) => key,
            Err(e) if e.is_not_found() => {
                warn!(repository = %repo, key_id = id, "Deploy key was deleted out-of-band, recreating it");
                return self.create(workflow, repo, SyncAction::Created).await.map(Some);
            }
            Err(e) => return Err(SyncError::deploy_key(repo, e)),
        };

        if current.read_only == repo.wants_read_only_key() {
            debug!(repository = %repo, key_id = id, "Deploy key is up to date");
            return Ok(None);
        }

        info!(repository = %repo, key_id = id, "Deploy key access changed, rotating it");
        self.remove(repo, id).await?;
        self.create(workflow, repo, SyncAction::Updated).await.map(Some)
    }
}

#[async_trait]
impl ResourceSyncer for DeployKeySyncer {
    async fn sync(&self, workflow: &Workflow) -> Result<SyncResult, SyncError> {
        let mut result = SyncResult::new(SyncKind::DeployKey);

        for repo in workflow.repositories() {
            if !repo.needs_ssh_private_keys() {
                continue;
            }

            match self.sync_repository(workflow, repo).await {
                Ok(Some(entry)) => result.push(entry),
                Ok(None) => {}
                Err(error) if result.is_empty() => return Err(error),
                Err(error) => {
                    return Err(SyncError::Partial {
                        synced: result,
                        error: Box::new(error),
                    });
                }
            }
        }

        Ok(result)
    }

    async fn delete(
        &self,
        workflow: &Workflow,
        gone: &[Repository],
    ) -> Result<SyncResult, SyncError> {
        let mut result = SyncResult::new(SyncKind::DeployKey);

        for repo in workflow.repositories() {
            if is_gone(gone, repo) {
                debug!(repository = %repo, "Repository is gone, so is its deploy key");
                if let Some(id) = workflow.deploy_key_id(repo) {
                    result.push(SyncResultEntry {
                        id,
                        repository: repo.clone(),
                        action: SyncAction::Deleted,
                        secret: None,
                    });
                }
                continue;
            }
            if !repo.needs_ssh_private_keys() {
                continue;
            }

            let id = workflow
                .deploy_key_id(repo)
                .ok_or_else(|| SyncError::UnknownDeployKey(repo.to_string()))?;
            self.remove(repo, id).await?;

            result.push(SyncResultEntry {
                id,
                repository: repo.clone(),
                action: SyncAction::Deleted,
                secret: None,
            });
        }

        Ok(result)
    }

    async fn discard(&self, entries: &[SyncResultEntry]) -> Result<(), SyncError> {
        for entry in entries {
            self.remove(&entry.repository, entry.id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGithub;
    use hookflow_core::domain::ObjectMeta;
    use hookflow_core::domain::workflow::DeployKey;

    fn workflow() -> Workflow {
        let mut workflow = Workflow {
            metadata: ObjectMeta::named("dev", "hello"),
            ..Default::default()
        };

        let mut primary = Repository::new("john-doe", "my-repo");
        primary.private = true;
        workflow.spec.repository = primary;

        let mut tools = Repository::new("john-doe", "tools");
        tools.deploy_key = Some(DeployKey { read_only: false });
        workflow.spec.additional_repositories.push(tools);

        workflow
            .spec
            .additional_repositories
            .push(Repository::new("john-doe", "public-docs"));

        workflow
    }

    fn setup() -> (Arc<FakeGithub>, DeployKeySyncer) {
        let github = Arc::new(FakeGithub::default());
        let syncer = DeployKeySyncer::new(github.clone());
        (github, syncer)
    }

    #[tokio::test]
    async fn test_creates_keys_only_where_needed() {
        let (github, syncer) = setup();
        let workflow = workflow();

        let result = syncer.sync(&workflow).await.unwrap();

        let repos: Vec<String> = result
            .entries
            .iter()
            .map(|e| e.repository.to_string())
            .collect();
        assert_eq!(repos, vec!["john-doe/my-repo", "john-doe/tools"]);
        assert_eq!(result.rotated().count(), 2);

        let state = github.state.lock().unwrap();
        let primary = &state.keys[&result.entries[0].id];
        assert!(primary.read_only);
        assert_eq!(primary.title, "hello-ssh-public-key");
        assert!(primary.key.starts_with("ssh-ed25519 "));
        assert!(!state.keys[&result.entries[1].id].read_only);
    }

    #[tokio::test]
    async fn test_second_sync_is_a_no_op() {
        let (github, syncer) = setup();
        let mut workflow = workflow();

        syncer.sync(&workflow).await.unwrap().apply(&mut workflow.status);
        github.clear_calls();

        let result = syncer.sync(&workflow).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(github.count("get_key"), 2);
        assert_eq!(github.count("create_key"), 0);
    }

    #[tokio::test]
    async fn test_access_mismatch_rotates_key() {
        let (github, syncer) = setup();
        let mut workflow = workflow();

        let first = syncer.sync(&workflow).await.unwrap();
        first.apply(&mut workflow.status);
        let old = first.entries[0].clone();

        github
            .state
            .lock()
            .unwrap()
            .keys
            .get_mut(&old.id)
            .unwrap()
            .read_only = false;
        github.clear_calls();

        let result = syncer.sync(&workflow).await.unwrap();
        assert_eq!(result.entries.len(), 1);
        let rotated = &result.entries[0];
        assert_eq!(rotated.action, SyncAction::Updated);
        assert_ne!(rotated.id, old.id);
        assert_ne!(rotated.secret, old.secret);
        assert_eq!(github.count("delete_key"), 1);
        assert_eq!(github.count("create_key"), 1);
        assert!(!github.state.lock().unwrap().keys.contains_key(&old.id));
    }

    #[tokio::test]
    async fn test_delete_requires_known_ids() {
        let (github, syncer) = setup();
        let mut workflow = workflow();

        let err = syncer.delete(&workflow, &[]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error deleting deploy key for repository john-doe/my-repo: the key's identifier is unknown"
        );

        syncer.sync(&workflow).await.unwrap().apply(&mut workflow.status);
        syncer.delete(&workflow, &[]).await.unwrap().apply(&mut workflow.status);

        assert!(github.state.lock().unwrap().keys.is_empty());
        assert!(workflow.status.annotations.is_empty());
    }

    #[tokio::test]
    async fn test_failure_reports_keys_created_before_it() {
        let (github, syncer) = setup();
        let mut workflow = workflow();
        github.fail_once("create_key john-doe/tools", 502);

        let (synced, error) = match syncer.sync(&workflow).await.unwrap_err() {
            SyncError::Partial { synced, error } => (synced, error),
            other => panic!("expected a partial failure, got {:?}", other),
        };
        assert!(matches!(*error, SyncError::DeployKey { .. }));
        assert_eq!(synced.entries.len(), 1);
        assert_eq!(synced.entries[0].repository.to_string(), "john-doe/my-repo");
        synced.apply(&mut workflow.status);

        // Only the failed repository gets a key on the next sync
        github.clear_calls();
        let result = syncer.sync(&workflow).await.unwrap();
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].repository.to_string(), "john-doe/tools");
        assert_eq!(github.count("create_key"), 1);
        assert_eq!(github.state.lock().unwrap().keys.len(), 2);
    }

    #[tokio::test]
    async fn test_first_failure_is_not_partial() {
        let (github, syncer) = setup();
        let workflow = workflow();
        github.fail_once("create_key john-doe/my-repo", 502);

        let err = syncer.sync(&workflow).await.unwrap_err();
        assert!(matches!(err, SyncError::DeployKey { .. }));
        assert!(github.state.lock().unwrap().keys.is_empty());
    }

    #[tokio::test]
    async fn test_delete_skips_gone_repositories() {
        let (github, syncer) = setup();
        let mut workflow = workflow();

        let tools = workflow.spec.additional_repositories[0].clone();
        syncer.sync(&workflow).await.unwrap().apply(&mut workflow.status);
        let tools_key = workflow.deploy_key_id(&tools).unwrap();
        github.clear_calls();

        syncer
            .delete(&workflow, &[tools])
            .await
            .unwrap()
            .apply(&mut workflow.status);

        assert_eq!(github.count("delete_key"), 1);
        assert!(workflow.status.annotations.is_empty());
        assert!(github.state.lock().unwrap().keys.contains_key(&tools_key));
    }
}
