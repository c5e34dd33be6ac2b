//! Webhook syncer
//!
//! Keeps the GitHub webhook of a workflow's primary repository pointed at
//! the trigger listener with the expected settings.

use std::sync::Arc;

use async_trait::async_trait;
use hookflow_client::{ClientError, HooksApi};
use hookflow_core::domain::{
    Repository, SyncAction, SyncKind, SyncResult, SyncResultEntry, Workflow,
};
use hookflow_core::dto::github::Hook;
use tracing::{debug, info, warn};

use super::syncer::{ResourceSyncer, is_gone};
use crate::error::SyncError;
use crate::keys;

/// Syncer for the primary repository's webhook
pub struct WebhookSyncer {
    hooks: Arc<dyn HooksApi>,
}

impl WebhookSyncer {
    pub fn new(hooks: Arc<dyn HooksApi>) -> Self {
        Self { hooks }
    }

    /// Installs a new webhook with a freshly generated secret token
    async fn create(&self, repo: &Repository, mut desired: Hook) -> Result<SyncResult, SyncError> {
        let token = keys::generate_webhook_token();
        desired.config.secret = Some(token.clone());

        let created = self
            .hooks
            .create_hook(&repo.owner, &repo.name, &desired)
            .await
            .map_err(|e| SyncError::webhook(repo, e))?;
        let id = created.id.ok_or_else(|| {
            SyncError::webhook(
                repo,
                ClientError::ParseError("created webhook has no id".to_string()),
            )
        })?;

        info!(repository = %repo, webhook_id = id, "Created webhook");

        let mut result = SyncResult::new(SyncKind::Webhook);
        result.push(SyncResultEntry {
            id,
            repository: repo.clone(),
            action: SyncAction::Created,
            secret: Some(token.into_bytes()),
        });
        Ok(result)
    }

    /// Deletes a webhook, treating an already deleted one as success
    async fn remove(&self, repo: &Repository, id: i64) -> Result<(), SyncError> {
        match self.hooks.delete_hook(&repo.owner, &repo.name, id).await {
            Ok(()) => {
                info!(repository = %repo, webhook_id = id, "Deleted webhook");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(repository = %repo, webhook_id = id, "Webhook was already deleted");
                Ok(())
            }
            Err(e) => Err(SyncError::webhook(repo, e)),
        }
    }
}

#[async_trait]
impl ResourceSyncer for WebhookSyncer {
    async fn sync(&self, workflow: &Workflow) -> Result<SyncResult, SyncError> {
        let repo = &workflow.spec.repository;
        let desired = Hook::desired(workflow.hooks_url(), workflow.webhook_events(), None);

        let Some(id) = workflow.webhook_id() else {
            return self.create(repo, desired).await;
        };

        let current = match self.hooks.get_hook(&repo.owner, &repo.name, id).await {
            Ok(hook) => hook,
            Err(e) if e.is_not_found() => {
                warn!(repository = %repo, webhook_id = id, "Webhook was deleted out-of-band, recreating it");
                return self.create(repo, desired).await;
            }
            Err(e) => return Err(SyncError::webhook(repo, e)),
        };

        if !current.diverges_from(&desired) {
            debug!(repository = %repo, webhook_id = id, "Webhook is up to date");
            return Ok(SyncResult::new(SyncKind::Webhook));
        }

        // GitHub never returns a hook's secret, so the stored token stays valid
        self.hooks
            .edit_hook(&repo.owner, &repo.name, id, &desired)
            .await
            .map_err(|e| SyncError::webhook(repo, e))?;

        info!(repository = %repo, webhook_id = id, "Updated webhook settings");

        let mut result = SyncResult::new(SyncKind::Webhook);
        result.push(SyncResultEntry {
            id,
            repository: repo.clone(),
            action: SyncAction::Updated,
            secret: None,
        });
        Ok(result)
    }

    async fn delete(
        &self,
        workflow: &Workflow,
        gone: &[Repository],
    ) -> Result<SyncResult, SyncError> {
        let repo = &workflow.spec.repository;
        let mut result = SyncResult::new(SyncKind::Webhook);

        if is_gone(gone, repo) {
            debug!(repository = %repo, "Repository is gone, so is its webhook");
            if let Some(id) = workflow.webhook_id() {
                result.push(SyncResultEntry {
                    id,
                    repository: repo.clone(),
                    action: SyncAction::Deleted,
                    secret: None,
                });
            }
            return Ok(result);
        }

        let id = workflow
            .webhook_id()
            .ok_or_else(|| SyncError::UnknownWebhook(repo.to_string()))?;
        self.remove(repo, id).await?;

        result.push(SyncResultEntry {
            id,
            repository: repo.clone(),
            action: SyncAction::Deleted,
            secret: None,
        });
        Ok(result)
    }

    async fn discard(&self, entries: &[SyncResultEntry]) -> Result<(), SyncError> {
        for entry in entries {
            self.remove(&entry.repository, entry.id).await?;
        }
        Ok(())
    }
}
