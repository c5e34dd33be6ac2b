//! Workflow domain types
//!
//! A Workflow is the user-declared desired state: a source repository, the
//! trigger filters deciding which GitHub deliveries may run it, and the tasks
//! compiled into a pipeline run when it triggers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::meta::{ObjectMeta, OwnerReference};
use super::pipeline_run::PodTemplate;

/// API group of the Workflow resource
pub const API_GROUP: &str = "hookflow.dev";

/// Served version of the Workflow resource
pub const API_VERSION: &str = "v1alpha1";

/// Kind of the Workflow resource
pub const KIND: &str = "Workflow";

/// Label attached to every object derived from a workflow
pub const WORKFLOW_LABEL: &str = "hookflow.dev/workflow";

/// Finalizer guarding cleanup of remote GitHub resources
pub const FINALIZER: &str = "hookflow.dev/finalizer";

/// Condition type summarizing the health of a workflow
pub const CONDITION_READY: &str = "Ready";

/// Built-in action that checks out the workflow's repositories
pub const CHECKOUT_ACTION: &str = "checkout";

/// Workflow resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkflowSpec,
    #[serde(default)]
    pub status: WorkflowStatus,
}

fn default_api_version() -> String {
    format!("{}/{}", API_GROUP, API_VERSION)
}

fn default_kind() -> String {
    KIND.to_string()
}

/// Result of listing workflows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowList {
    #[serde(default)]
    pub items: Vec<Workflow>,
}

/// Desired state of a workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Primary repository; its events trigger the workflow
    #[serde(rename = "repo", default)]
    pub repository: Repository,

    #[serde(rename = "additionalRepos", default, skip_serializing_if = "Vec::is_empty")]
    pub additional_repositories: Vec<Repository>,

    #[serde(default)]
    pub webhook: Webhook,

    /// Event names allowed to trigger the workflow
    #[serde(rename = "triggersOn", default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,

    /// Branch glob patterns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,

    /// Changed-file glob patterns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,

    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
}

/// GitHub repository managed by a workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub name: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_key: Option<DeployKey>,
    #[serde(default)]
    pub private: bool,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether checking out this repository requires an SSH private key
    ///
    /// True for private repositories and for repositories declaring a
    /// writable deploy key.
    pub fn needs_ssh_private_keys(&self) -> bool {
        self.private || self.deploy_key.as_ref().is_some_and(|key| !key.read_only)
    }

    /// Read-only flag wanted for this repository's deploy key
    pub fn wants_read_only_key(&self) -> bool {
        self.deploy_key.as_ref().is_none_or(|key| key.read_only)
    }

    /// Secret data key holding this repository's SSH private key
    pub fn ssh_private_key_name(&self) -> String {
        format!("{}_id_rsa", self.name)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployKey {
    #[serde(default)]
    pub read_only: bool,
}

/// Webhook settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    /// Base URL under which the trigger listener is reachable
    #[serde(default)]
    pub url: String,
    /// Events GitHub should deliver; falls back to the trigger events
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
}

/// Values applied to every task that does not set its own
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplate>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account: String,
}

/// A unit of work in the compiled pipeline
///
/// Either a reference to a reusable task (`uses`) or an embedded list of steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(rename = "needs", default, skip_serializing_if = "Vec::is_empty")]
    pub need: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplate>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: u32,
    /// Resource quantities, e.g. `cpu: 500m`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<EmbeddedStep>,
    /// Duration string such as `1h`, passed through to the engine untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Step declared inline in a task: a shell body (`run`) or a built-in action (`uses`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedStep {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub working_dir: String,
}

// =============================================================================
// Status
// =============================================================================

/// Observed state of a workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Identity annotations of remote resources, see [`webhook_id_annotation`]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Reason recorded when the Ready condition is false
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    WebhookError,
    DeployKeysError,
    RepositoriesError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::WebhookError => "WebhookError",
            FailureReason::DeployKeysError => "DeployKeysError",
            FailureReason::RepositoriesError => "RepositoriesError",
        }
    }
}

impl WorkflowStatus {
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == CONDITION_READY)
    }

    pub fn is_ready(&self) -> bool {
        self.ready_condition()
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    pub fn mark_ready(&mut self) {
        self.set_ready(ConditionStatus::True, "", "");
    }

    pub fn mark_failure(&mut self, reason: FailureReason, message: impl Into<String>) {
        self.set_ready(ConditionStatus::False, reason.as_str(), &message.into());
    }

    pub fn mark_webhook_error(&mut self, message: impl Into<String>) {
        self.mark_failure(FailureReason::WebhookError, message);
    }

    pub fn mark_deploy_keys_error(&mut self, message: impl Into<String>) {
        self.mark_failure(FailureReason::DeployKeysError, message);
    }

    pub fn mark_repositories_error(&mut self, message: impl Into<String>) {
        self.mark_failure(FailureReason::RepositoriesError, message);
    }

    fn set_ready(&mut self, status: ConditionStatus, reason: &str, message: &str) {
        let now = Utc::now();
        match self
            .conditions
            .iter_mut()
            .find(|c| c.type_ == CONDITION_READY)
        {
            Some(condition) => {
                if condition.status != status {
                    condition.last_transition_time = Some(now);
                }
                condition.status = status;
                condition.reason = reason.to_string();
                condition.message = message.to_string();
            }
            None => self.conditions.push(Condition {
                type_: CONDITION_READY.to_string(),
                status,
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: Some(now),
            }),
        }
    }
}

// =============================================================================
// Identity annotations
// =============================================================================

/// Annotation holding the id of the webhook installed on `repo`
pub fn webhook_id_annotation(repo: &Repository) -> String {
    format!("{}/github.{}.{}.webhook-id", API_GROUP, repo.owner, repo.name)
}

/// Annotation holding the id of the deploy key installed on `repo`
pub fn deploy_key_id_annotation(repo: &Repository) -> String {
    format!("{}/github.{}.{}.key-id", API_GROUP, repo.owner, repo.name)
}

impl Workflow {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Primary repository followed by the additional ones
    pub fn repositories(&self) -> Vec<&Repository> {
        std::iter::once(&self.spec.repository)
            .chain(self.spec.additional_repositories.iter())
            .collect()
    }

    /// Id of the webhook believed to exist on the primary repository
    pub fn webhook_id(&self) -> Option<i64> {
        self.annotation_id(&webhook_id_annotation(&self.spec.repository))
    }

    /// Id of the deploy key believed to exist on `repo`
    pub fn deploy_key_id(&self, repo: &Repository) -> Option<i64> {
        self.annotation_id(&deploy_key_id_annotation(repo))
    }

    fn annotation_id(&self, key: &str) -> Option<i64> {
        self.status
            .annotations
            .get(key)
            .and_then(|value| value.parse().ok())
    }

    pub fn webhook_secret_name(&self) -> String {
        format!("{}-webhook-secret", self.metadata.name)
    }

    pub fn deploy_keys_secret_name(&self) -> String {
        format!("{}-ssh-private-keys", self.metadata.name)
    }

    /// URL GitHub posts deliveries to
    pub fn hooks_url(&self) -> String {
        format!(
            "{}/api/{}/namespaces/{}/workflows/{}/hooks",
            self.spec.webhook.url.trim_end_matches('/'),
            API_VERSION,
            self.metadata.namespace,
            self.metadata.name
        )
    }

    /// Events the GitHub webhook subscribes to
    ///
    /// Explicit webhook events win, then the trigger events, then `push`.
    pub fn webhook_events(&self) -> Vec<String> {
        if !self.spec.webhook.events.is_empty() {
            self.spec.webhook.events.clone()
        } else if !self.spec.events.is_empty() {
            self.spec.events.clone()
        } else {
            vec!["push".to_string()]
        }
    }

    /// Controlling owner reference placed on objects derived from this workflow
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: default_api_version(),
            kind: KIND.to_string(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
            controller: true,
            block_owner_deletion: true,
        }
    }
}
