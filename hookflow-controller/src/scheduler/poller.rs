//! Workflow poller
//!
//! Lists workflows on every tick and runs one pass per workflow in its own
//! task. Passes are bounded by a semaphore and a timeout, and are abandoned
//! on shutdown. An abandoned pass persists nothing, so the next pass sees
//! the previous annotations and converges from there.

use anyhow::{Context, Result};
use hookflow_client::WorkflowStore;
use hookflow_core::domain::Workflow;
use hookflow_core::domain::workflow::{FINALIZER, WorkflowSpec, WorkflowStatus};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::service::Reconciler;

/// Poller that continuously reconciles every workflow
pub struct WorkflowPoller {
    config: Config,
    store: Arc<dyn WorkflowStore>,
    reconciler: Arc<Reconciler>,
    semaphore: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl WorkflowPoller {
    /// Creates a new workflow poller
    pub fn new(
        config: Config,
        store: Arc<dyn WorkflowStore>,
        reconciler: Arc<Reconciler>,
        shutdown: CancellationToken,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_reconciles));
        Self {
            config,
            store,
            reconciler,
            semaphore,
            shutdown,
        }
    }

    /// Starts the polling loop, returning once shutdown is requested
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting workflow poller (interval: {:?})",
            self.config.poll_interval()
        );

        let mut interval = time::interval(self.config.poll_interval());

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping workflow poller");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            debug!("Polling workflows");

            match self.poll_once().await {
                Ok(count) => debug!("Processed {} workflow(s) this cycle", count),
                Err(e) => error!("Error during poll cycle: {:#}", e),
            }
        }
    }

    /// Performs a single poll cycle
    ///
    /// # Returns
    /// The number of workflows processed
    pub async fn poll_once(&self) -> Result<usize> {
        let workflows = self
            .store
            .list_workflows()
            .await
            .context("Failed to list workflows")?;

        let handles: Vec<_> = workflows
            .into_iter()
            .map(|workflow| self.spawn_pass(workflow))
            .collect();
        let count = handles.len();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Reconcile task panicked: {}", e);
            }
        }

        Ok(count)
    }

    /// Spawns a task running one pass for `workflow`
    fn spawn_pass(&self, workflow: Workflow) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let reconciler = Arc::clone(&self.reconciler);
        let semaphore = Arc::clone(&self.semaphore);
        let shutdown = self.shutdown.clone();
        let timeout = self.config.reconcile_timeout();

        tokio::spawn(async move {
            let key = workflow.metadata.key();

            // Permit is released when dropped
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };

            let pass = Self::process(store, reconciler, workflow);
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(workflow = %key, "Reconcile pass abandoned on shutdown");
                }
                outcome = time::timeout(timeout, pass) => match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(workflow = %key, "Reconcile pass failed: {:#}", e),
                    Err(_) => warn!(workflow = %key, "Reconcile pass timed out after {:?}", timeout),
                },
            }
        })
    }

    /// Reconciles or finalizes one workflow and persists the outcome
    async fn process(
        store: Arc<dyn WorkflowStore>,
        reconciler: Arc<Reconciler>,
        mut workflow: Workflow,
    ) -> Result<()> {
        if workflow.metadata.is_being_deleted() {
            return Self::finalize(store.as_ref(), &reconciler, workflow).await;
        }

        if !workflow.metadata.has_finalizer(FINALIZER) {
            workflow.metadata.finalizers.push(FINALIZER.to_string());
            workflow = store
                .update_workflow(&workflow)
                .await
                .context("Failed to add finalizer")?;
        }

        let spec = workflow.spec.clone();
        let status = workflow.status.clone();

        let outcome = reconciler.reconcile(&mut workflow).await;
        Self::persist(store.as_ref(), workflow, &spec, &status).await?;

        outcome.context("Failed to reconcile workflow")
    }

    /// Writes back repository metadata and status when they changed
    async fn persist(
        store: &dyn WorkflowStore,
        mut workflow: Workflow,
        spec_before: &WorkflowSpec,
        status_before: &WorkflowStatus,
    ) -> Result<()> {
        if workflow.spec != *spec_before {
            let status = std::mem::take(&mut workflow.status);
            workflow = store
                .update_workflow(&workflow)
                .await
                .context("Failed to persist repository metadata")?;
            workflow.status = status;
        }

        if workflow.status != *status_before {
            store
                .update_status(&workflow)
                .await
                .context("Failed to persist workflow status")?;
        }

        Ok(())
    }

    /// Deletes remote resources, then releases the finalizer
    async fn finalize(
        store: &dyn WorkflowStore,
        reconciler: &Reconciler,
        mut workflow: Workflow,
    ) -> Result<()> {
        if !workflow.metadata.has_finalizer(FINALIZER) {
            return Ok(());
        }

        reconciler
            .finalize(&mut workflow)
            .await
            .context("Failed to finalize workflow")?;

        workflow.metadata.remove_finalizer(FINALIZER);
        store
            .update_workflow(&workflow)
            .await
            .context("Failed to remove finalizer")?;

        info!(workflow = %workflow.metadata.key(), "Workflow finalized");
        Ok(())
    }
}
