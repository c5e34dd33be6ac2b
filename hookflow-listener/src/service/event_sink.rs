//! Event sink
//!
//! Runs a parsed delivery through the trigger path: workflow lookup,
//! signature verification, the repository's own workflow file, trigger
//! criteria, compilation and pipeline-run submission.

use std::sync::Arc;
use std::time::Duration;

use hookflow_client::{
    ClientError, ContentsApi, PipelineRunStore, SecretStore, WorkflowStore,
};
use hookflow_core::domain::event::PING;
use hookflow_core::domain::{Event, Workflow};
use hookflow_pipeline::{
    ActionRegistry, CompileError, ConfigError, PipelineDefaults, PipelineRunBuilder, can_trigger,
    source,
};
use thiserror::Error;
use tokio::time;
use tracing::{debug, info};

use crate::github::EventError;
use crate::github::signature;

/// Secret key holding the webhook token
pub const SECRET_TOKEN_KEY: &str = "secret-token";

/// Errors ending a delivery without a pipeline run
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    InvalidEvent(#[from] EventError),

    #[error("Workflow {0} not found")]
    WorkflowNotFound(String),

    #[error("An internal error has occurred while reading workflow {workflow}")]
    ReadWorkflow {
        workflow: String,
        #[source]
        source: ClientError,
    },

    #[error("An internal error has occurred while verifying the request signature")]
    ReadSecret { secret: String, reason: String },

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    Rejected(String),

    #[error(
        "An internal error has occurred while trying to read the workflow's configuration from the repository"
    )]
    ReadWorkflowFile {
        path: String,
        #[source]
        source: ClientError,
    },

    #[error("Workflow file {path} is invalid: {source}")]
    InvalidWorkflowFile {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("Workflow {workflow} can't be compiled: {source}")]
    Compile {
        workflow: String,
        #[source]
        source: CompileError,
    },

    #[error("An internal error has occurred while creating the PipelineRun for workflow {workflow}")]
    CreatePipelineRun {
        workflow: String,
        #[source]
        source: ClientError,
    },

    #[error("Handling the event for workflow {0} took too long")]
    TimedOut(String),
}

/// Successful outcome of a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The event needs no pipeline run (e.g. `ping`)
    Acknowledged(String),
    /// A pipeline run was submitted under the given name
    Created(String),
}

/// Coordinates pipeline runs for incoming GitHub events
pub struct EventSink {
    workflows: Arc<dyn WorkflowStore>,
    secrets: Arc<dyn SecretStore>,
    contents: Arc<dyn ContentsApi>,
    pipeline_runs: Arc<dyn PipelineRunStore>,
    defaults: PipelineDefaults,
    actions: ActionRegistry,
    timeout: Duration,
}

impl EventSink {
    /// Creates an event sink
    ///
    /// # Arguments
    /// * `workflows` - Source of Workflow objects
    /// * `secrets` - Source of webhook secrets
    /// * `contents` - Reader of workflow files committed to repositories
    /// * `pipeline_runs` - Where compiled pipeline runs are submitted
    /// * `defaults` - Global pipeline defaults
    /// * `timeout` - Upper bound for handling one delivery
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        secrets: Arc<dyn SecretStore>,
        contents: Arc<dyn ContentsApi>,
        pipeline_runs: Arc<dyn PipelineRunStore>,
        defaults: PipelineDefaults,
        timeout: Duration,
    ) -> Self {
        Self {
            workflows,
            secrets,
            contents,
            pipeline_runs,
            defaults,
            actions: ActionRegistry::default(),
            timeout,
        }
    }

    /// Handles one delivery addressed to workflow `namespace/name`
    ///
    /// Every remote call shares the sink's timeout; a delivery that exceeds
    /// it submits nothing.
    pub async fn handle(
        &self,
        namespace: &str,
        name: &str,
        event: &Event,
    ) -> Result<Trigger, TriggerError> {
        let key = format!("{}/{}", namespace, name);

        match time::timeout(self.timeout, self.trigger(namespace, name, &key, event)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TriggerError::TimedOut(key)),
        }
    }

    async fn trigger(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        event: &Event,
    ) -> Result<Trigger, TriggerError> {
        let workflow = self
            .workflows
            .get_workflow(namespace, name)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    TriggerError::WorkflowNotFound(key.to_string())
                } else {
                    TriggerError::ReadWorkflow {
                        workflow: key.to_string(),
                        source: e,
                    }
                }
            })?;

        self.verify_signature(&workflow, event).await?;

        if event.name == PING {
            info!(workflow = %key, "Webhook ping received");
            return Ok(Trigger::Acknowledged(format!(
                "Ping received, the webhook of workflow {} is working",
                key
            )));
        }

        let mut workflow = self.read_workflow_file(workflow, event).await?;
        self.defaults.apply(&mut workflow);

        let verdict = can_trigger(&workflow, event);
        if !verdict.accepted {
            info!(workflow = %key, "{}", verdict.message);
            return Err(TriggerError::Rejected(verdict.message));
        }

        let pipeline_run = PipelineRunBuilder::new(&workflow, event, &self.defaults, &self.actions)
            .build()
            .map_err(|e| TriggerError::Compile {
                workflow: key.to_string(),
                source: e,
            })?;

        let created = self
            .pipeline_runs
            .create_pipeline_run(&pipeline_run)
            .await
            .map_err(|e| TriggerError::CreatePipelineRun {
                workflow: key.to_string(),
                source: e,
            })?;

        let run_name = created.metadata.name;
        info!(workflow = %key, pipeline_run = %run_name, "PipelineRun has been successfully created");
        Ok(Trigger::Created(run_name))
    }

    /// Checks the delivery signature against the workflow's webhook token
    async fn verify_signature(&self, workflow: &Workflow, event: &Event) -> Result<(), TriggerError> {
        let secret_name = workflow.webhook_secret_name();
        let unreadable = |reason: String| TriggerError::ReadSecret {
            secret: format!("{}/{}", workflow.namespace(), secret_name),
            reason,
        };

        let secret = self
            .secrets
            .get_secret(workflow.namespace(), &secret_name)
            .await
            .map_err(|e| unreadable(e.to_string()))?;
        let token = secret
            .get(SECRET_TOKEN_KEY)
            .ok_or_else(|| unreadable(format!("key {} is missing", SECRET_TOKEN_KEY)))?;

        let verification = signature::verify(&event.body, &event.hmac_signature, token);
        if !verification.valid {
            info!(workflow = %workflow.metadata.key(), "{}", verification.message);
            return Err(TriggerError::AccessDenied(verification.message));
        }

        debug!(workflow = %workflow.metadata.key(), "{}", verification.message);
        Ok(())
    }

    /// Overlays the workflow file committed at the event's head commit
    ///
    /// Events without a head commit, and commits without the file, keep the
    /// stored workflow.
    async fn read_workflow_file(&self, workflow: Workflow, event: &Event) -> Result<Workflow, TriggerError> {
        if event.head_commit_sha.is_empty() {
            return Ok(workflow);
        }

        let repo = &workflow.spec.repository;
        let path = self.defaults.workflow_file(&workflow);

        let contents = match self
            .contents
            .get_file(&repo.owner, &repo.name, &path, &event.head_commit_sha)
            .await
        {
            Ok(contents) => contents,
            Err(e) if e.is_not_found() => {
                debug!(repository = %repo, path = %path, "No workflow file in repository, using stored workflow");
                return Ok(workflow);
            }
            Err(e) => return Err(TriggerError::ReadWorkflowFile { path, source: e }),
        };

        debug!(repository = %repo, path = %path, commit = %event.head_commit_sha, "Using workflow file from repository");
        source::overlay(&workflow, &contents)
            .map_err(|e| TriggerError::InvalidWorkflowFile { path, source: e })
    }
}
