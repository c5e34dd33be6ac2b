//! Secret management
//!
//! Maps generated secret material onto the two secrets a workflow owns:
//! `{workflow}-webhook-secret` with the webhook token under `secret-token`,
//! and `{workflow}-ssh-private-keys` with one `{repo}_id_rsa` entry per
//! repository. Both carry an owner reference to the workflow so they are
//! garbage-collected with it.

use std::collections::BTreeSet;
use std::sync::Arc;

use hookflow_client::SecretStore;
use hookflow_core::domain::workflow::WORKFLOW_LABEL;
use hookflow_core::domain::{ObjectMeta, Secret, SyncResult, Workflow};
use tracing::info;

use crate::error::SyncError;

/// Data key holding the webhook token
pub const SECRET_TOKEN_KEY: &str = "secret-token";

// =============================================================================
// Object mapping
// =============================================================================

fn owned_metadata(workflow: &Workflow, name: String) -> ObjectMeta {
    let mut metadata = ObjectMeta::named(workflow.namespace(), name);
    metadata
        .labels
        .insert(WORKFLOW_LABEL.to_string(), workflow.name().to_string());
    metadata.owner_references.push(workflow.owner_reference());
    metadata
}

/// Webhook secret of `workflow` holding `token`
pub fn of_webhook(workflow: &Workflow, token: &[u8]) -> Secret {
    let mut secret = Secret::new(owned_metadata(workflow, workflow.webhook_secret_name()));
    set_secret_token(&mut secret, token);
    secret
}

/// Deploy-keys secret of `workflow` holding the private keys in `keys`
pub fn of_deploy_keys(workflow: &Workflow, keys: &SyncResult) -> Secret {
    let mut secret = Secret::new(owned_metadata(workflow, workflow.deploy_keys_secret_name()));
    set_ssh_private_keys(&mut secret, keys);
    secret
}

pub fn set_secret_token(secret: &mut Secret, token: &[u8]) {
    secret
        .data
        .insert(SECRET_TOKEN_KEY.to_string(), token.to_vec());
}

/// Stores every rotated private key of `keys`, keeping the other entries
pub fn set_ssh_private_keys(secret: &mut Secret, keys: &SyncResult) {
    for (entry, private_key) in keys.rotated() {
        secret.data.insert(
            entry.repository.ssh_private_key_name(),
            private_key.to_vec(),
        );
    }
}

// =============================================================================
// Persistence
// =============================================================================

/// Creates or updates the secrets owned by workflows
pub struct SecretManager {
    store: Arc<dyn SecretStore>,
}

impl SecretManager {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Stores a newly generated webhook token
    pub async fn apply_webhook_secret(
        &self,
        workflow: &Workflow,
        token: &[u8],
    ) -> Result<(), SyncError> {
        self.apply(of_webhook(workflow, token), |existing| {
            set_secret_token(existing, token)
        })
        .await
    }

    /// Stores newly generated deploy-key private keys
    pub async fn apply_deploy_keys_secret(
        &self,
        workflow: &Workflow,
        keys: &SyncResult,
    ) -> Result<(), SyncError> {
        self.apply(of_deploy_keys(workflow, keys), |existing| {
            set_ssh_private_keys(existing, keys)
        })
        .await
    }

    /// Whether the webhook secret of `workflow` holds a token
    ///
    /// The token of an existing hook cannot be read back from GitHub, so a
    /// lost token is only recovered by recreating the webhook.
    pub async fn has_webhook_token(&self, workflow: &Workflow) -> Result<bool, SyncError> {
        let secret = self
            .read(workflow.namespace(), &workflow.webhook_secret_name())
            .await?;
        Ok(secret.is_some_and(|secret| secret.get(SECRET_TOKEN_KEY).is_some()))
    }

    /// Data keys of the private keys stored for `workflow`
    pub async fn stored_private_keys(
        &self,
        workflow: &Workflow,
    ) -> Result<BTreeSet<String>, SyncError> {
        let secret = self
            .read(workflow.namespace(), &workflow.deploy_keys_secret_name())
            .await?;
        Ok(secret
            .map(|secret| secret.data.into_keys().collect())
            .unwrap_or_default())
    }

    async fn read(&self, namespace: &str, name: &str) -> Result<Option<Secret>, SyncError> {
        match self.store.get_secret(namespace, name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(SyncError::read_secret(name, e)),
        }
    }

    async fn apply(
        &self,
        desired: Secret,
        update: impl FnOnce(&mut Secret) + Send,
    ) -> Result<(), SyncError> {
        let namespace = desired.metadata.namespace.clone();
        let name = desired.metadata.name.clone();

        match self.store.get_secret(&namespace, &name).await {
            Ok(mut existing) => {
                update(&mut existing);
                self.store
                    .update_secret(&existing)
                    .await
                    .map_err(|e| SyncError::secret(&name, e))?;
                info!(secret = %name, "Updated secret");
            }
            Err(e) if e.is_not_found() => {
                self.store
                    .create_secret(&desired)
                    .await
                    .map_err(|e| SyncError::secret(&name, e))?;
                info!(secret = %name, "Created secret");
            }
            Err(e) => return Err(SyncError::secret(&name, e)),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCluster;
    use hookflow_core::domain::{Repository, SyncAction, SyncKind, SyncResultEntry};

    fn workflow() -> Workflow {
        let mut workflow = Workflow {
            metadata: ObjectMeta::named("dev", "hello"),
            ..Default::default()
        };
        workflow.metadata.uid = "0b6e0f3c".to_string();
        workflow.spec.repository = Repository::new("john-doe", "my-repo");
        workflow
    }

    fn rotated(repo: &str, key: &[u8]) -> SyncResult {
        let mut result = SyncResult::new(SyncKind::DeployKey);
        result.push(SyncResultEntry {
            id: 7,
            repository: Repository::new("john-doe", repo),
            action: SyncAction::Created,
            secret: Some(key.to_vec()),
        });
        result
    }

    #[test]
    fn test_of_webhook() {
        let secret = of_webhook(&workflow(), b"token");

        assert_eq!(secret.metadata.name, "hello-webhook-secret");
        assert_eq!(secret.metadata.namespace, "dev");
        assert_eq!(secret.metadata.labels[WORKFLOW_LABEL], "hello");
        assert_eq!(secret.get("secret-token"), Some(&b"token"[..]));

        let owner = &secret.metadata.owner_references[0];
        assert_eq!(owner.kind, "Workflow");
        assert_eq!(owner.name, "hello");
        assert_eq!(owner.uid, "0b6e0f3c");
        assert!(owner.controller);
    }

    #[test]
    fn test_of_deploy_keys() {
        let secret = of_deploy_keys(&workflow(), &rotated("my-repo", b"pem"));

        assert_eq!(secret.metadata.name, "hello-ssh-private-keys");
        assert_eq!(secret.get("my-repo_id_rsa"), Some(&b"pem"[..]));
    }

    #[tokio::test]
    async fn test_apply_creates_then_updates_in_place() {
        let cluster = Arc::new(FakeCluster::default());
        let manager = SecretManager::new(cluster.clone());
        let workflow = workflow();

        manager
            .apply_deploy_keys_secret(&workflow, &rotated("my-repo", b"first"))
            .await
            .unwrap();
        manager
            .apply_deploy_keys_secret(&workflow, &rotated("tools", b"second"))
            .await
            .unwrap();
        manager
            .apply_deploy_keys_secret(&workflow, &rotated("my-repo", b"third"))
            .await
            .unwrap();

        let secret = cluster.secret("dev", "hello-ssh-private-keys").unwrap();
        assert_eq!(secret.data.len(), 2);
        assert_eq!(secret.get("my-repo_id_rsa"), Some(&b"third"[..]));
        assert_eq!(secret.get("tools_id_rsa"), Some(&b"second"[..]));
    }

    #[tokio::test]
    async fn test_apply_webhook_secret() {
        let cluster = Arc::new(FakeCluster::default());
        let manager = SecretManager::new(cluster.clone());
        let workflow = workflow();

        manager.apply_webhook_secret(&workflow, b"one").await.unwrap();
        manager.apply_webhook_secret(&workflow, b"two").await.unwrap();

        let secret = cluster.secret("dev", "hello-webhook-secret").unwrap();
        assert_eq!(secret.get(SECRET_TOKEN_KEY), Some(&b"two"[..]));
    }

    #[tokio::test]
    async fn test_reads_what_is_stored() {
        let cluster = Arc::new(FakeCluster::default());
        let manager = SecretManager::new(cluster.clone());
        let workflow = workflow();

        assert!(!manager.has_webhook_token(&workflow).await.unwrap());
        assert!(manager.stored_private_keys(&workflow).await.unwrap().is_empty());

        manager.apply_webhook_secret(&workflow, b"one").await.unwrap();
        manager
            .apply_deploy_keys_secret(&workflow, &rotated("my-repo", b"pem"))
            .await
            .unwrap();

        assert!(manager.has_webhook_token(&workflow).await.unwrap());
        let stored = manager.stored_private_keys(&workflow).await.unwrap();
        assert_eq!(stored.into_iter().collect::<Vec<_>>(), vec!["my-repo_id_rsa"]);
    }

    #[tokio::test]
    async fn test_read_failures_are_errors() {
        let cluster = Arc::new(FakeCluster::default());
        let manager = SecretManager::new(cluster.clone());
        cluster.fail_once("get_secret dev/hello-webhook-secret", 500);

        let err = manager.has_webhook_token(&workflow()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error reading secret hello-webhook-secret: API error (status 500): transient"
        );
    }
}
