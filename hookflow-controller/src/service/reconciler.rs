//! Reconciler
//!
//! Runs one reconcile pass for a workflow: repository metadata, webhook,
//! webhook secret, deploy keys, deploy-keys secret, then the Ready
//! condition. The first failing phase is recorded on the status and ends the
//! pass. Every step is safe to re-run from scratch.
//!
//! The id of a created resource is recorded only once its secret material is
//! stored, and a resource whose secret material went missing is recreated.

use std::sync::Arc;

use hookflow_core::domain::{SyncAction, SyncKind, SyncResult, SyncResultEntry, Workflow};
use hookflow_pipeline::PipelineDefaults;
use tracing::{debug, info, warn};

use super::repos::RepositorySyncer;
use super::secrets::SecretManager;
use super::syncer::ResourceSyncer;
use crate::error::SyncError;

/// Converges a workflow's remote resources and secrets
pub struct Reconciler {
    repositories: RepositorySyncer,
    webhooks: Arc<dyn ResourceSyncer>,
    deploy_keys: Arc<dyn ResourceSyncer>,
    secrets: SecretManager,
    defaults: PipelineDefaults,
}

impl Reconciler {
    pub fn new(
        repositories: RepositorySyncer,
        webhooks: Arc<dyn ResourceSyncer>,
        deploy_keys: Arc<dyn ResourceSyncer>,
        secrets: SecretManager,
        defaults: PipelineDefaults,
    ) -> Self {
        Self {
            repositories,
            webhooks,
            deploy_keys,
            secrets,
            defaults,
        }
    }

    /// Runs a reconcile pass
    ///
    /// Repository metadata is written to `workflow.spec`; identity
    /// annotations and the Ready condition to `workflow.status`. Global
    /// defaults only shape what is synced and are not written back.
    ///
    /// # Returns
    /// The error of the failing phase, already recorded on the status
    pub async fn reconcile(&self, workflow: &mut Workflow) -> Result<(), SyncError> {
        debug!(workflow = %workflow.metadata.key(), "Reconciling workflow");

        if let Err(e) = self.repositories.sync(workflow).await {
            workflow.status.mark_repositories_error(e.to_string());
            return Err(e);
        }

        let mut effective = workflow.clone();
        self.defaults.apply(&mut effective);

        if let Err(e) = self.sync_webhook(&mut effective, workflow).await {
            workflow.status.mark_webhook_error(e.to_string());
            return Err(e);
        }

        effective.status = workflow.status.clone();
        if let Err(e) = self.sync_deploy_keys(&mut effective, workflow).await {
            workflow.status.mark_deploy_keys_error(e.to_string());
            return Err(e);
        }

        if !workflow.status.is_ready() {
            info!(workflow = %workflow.metadata.key(), "Workflow is ready");
        }
        workflow.status.mark_ready();
        Ok(())
    }

    /// Syncs the webhook of `effective` and records the outcome on `workflow`
    async fn sync_webhook(
        &self,
        effective: &mut Workflow,
        workflow: &mut Workflow,
    ) -> Result<(), SyncError> {
        if let Some(id) = effective.webhook_id() {
            if !self.secrets.has_webhook_token(effective).await? {
                warn!(
                    workflow = %workflow.metadata.key(),
                    webhook_id = id,
                    "Webhook secret is missing, recreating the webhook"
                );
                let deleted = self.webhooks.delete(effective, &[]).await?;
                deleted.apply(&mut effective.status);
                deleted.apply(&mut workflow.status);
            }
        }

        let result = self.webhooks.sync(effective).await?;

        if let Some((_, token)) = result.rotated().next() {
            if let Err(e) = self.secrets.apply_webhook_secret(workflow, token).await {
                roll_back(self.webhooks.as_ref(), workflow, &result).await;
                return Err(e);
            }
        }

        result.apply(&mut workflow.status);
        Ok(())
    }

    /// Syncs the deploy keys of `effective` and records the outcome on
    /// `workflow`
    ///
    /// Keys created before a failing repository are still stored and
    /// recorded.
    async fn sync_deploy_keys(
        &self,
        effective: &mut Workflow,
        workflow: &mut Workflow,
    ) -> Result<(), SyncError> {
        let stale = self.keys_without_private_key(effective).await?;
        if !stale.is_empty() {
            warn!(
                workflow = %workflow.metadata.key(),
                keys = stale.entries.len(),
                "Deploy key private keys are missing, recreating the keys"
            );
            self.deploy_keys.discard(&stale.entries).await?;
            stale.apply(&mut effective.status);
            stale.apply(&mut workflow.status);
        }

        let (result, failure) = match self.deploy_keys.sync(effective).await {
            Ok(result) => (result, None),
            Err(e) => {
                let (synced, error) = e.into_partial(SyncKind::DeployKey);
                (synced, Some(error))
            }
        };

        if result.rotated().next().is_some() {
            if let Err(e) = self.secrets.apply_deploy_keys_secret(workflow, &result).await {
                roll_back(self.deploy_keys.as_ref(), workflow, &result).await;
                return Err(e);
            }
        }

        result.apply(&mut workflow.status);
        failure.map_or(Ok(()), Err)
    }

    /// Recorded deploy keys whose private key is not stored, as deletions
    async fn keys_without_private_key(
        &self,
        workflow: &Workflow,
    ) -> Result<SyncResult, SyncError> {
        let stored = self.secrets.stored_private_keys(workflow).await?;
        let mut stale = SyncResult::new(SyncKind::DeployKey);

        for repo in workflow.repositories() {
            if !repo.needs_ssh_private_keys() || stored.contains(&repo.ssh_private_key_name()) {
                continue;
            }
            if let Some(id) = workflow.deploy_key_id(repo) {
                stale.push(SyncResultEntry {
                    id,
                    repository: repo.clone(),
                    action: SyncAction::Deleted,
                    secret: None,
                });
            }
        }

        Ok(stale)
    }

    /// Deletes the webhook, then the deploy keys of a workflow being deleted
    ///
    /// Resources of repositories that no longer exist are considered
    /// deleted. Any other failure aborts finalization so it can be retried.
    pub async fn finalize(&self, workflow: &mut Workflow) -> Result<(), SyncError> {
        info!(workflow = %workflow.metadata.key(), "Finalizing workflow");

        let gone = self.repositories.sync_existing(workflow).await?;

        self.webhooks
            .delete(workflow, &gone)
            .await?
            .apply(&mut workflow.status);

        self.deploy_keys
            .delete(workflow, &gone)
            .await?
            .apply(&mut workflow.status);

        Ok(())
    }
}

/// Discards the resources of `result` whose secret material was not stored
///
/// Leaves their ids unrecorded either way, so a resource that cannot be
/// discarded stays behind on GitHub unused.
async fn roll_back(syncer: &dyn ResourceSyncer, workflow: &Workflow, result: &SyncResult) {
    let created: Vec<SyncResultEntry> = result
        .rotated()
        .map(|(entry, _)| entry.clone())
        .collect();

    match syncer.discard(&created).await {
        Ok(()) => debug!(
            workflow = %workflow.metadata.key(),
            "Discarded resources whose secret could not be stored"
        ),
        Err(e) => warn!(
            workflow = %workflow.metadata.key(),
            ids = ?created.iter().map(|entry| entry.id).collect::<Vec<_>>(),
            "Failed to discard resources whose secret could not be stored: {}",
            e
        ),
    }
}
