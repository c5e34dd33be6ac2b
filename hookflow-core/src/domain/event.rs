//! Canonical GitHub event

use serde_json::Value;

/// Event name of branch pushes
pub const PUSH: &str = "push";

/// Event name of pull request activity
pub const PULL_REQUEST: &str = "pull_request";

/// Event name GitHub sends once a webhook is installed
pub const PING: &str = "ping";

/// A GitHub delivery normalized for filtering and compilation
///
/// Built once per inbound delivery and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// Event name from `X-GitHub-Event` (push, pull_request, ping, ...)
    pub name: String,
    /// Repository full name, `owner/name`
    pub repository: String,
    pub branch: String,
    pub head_commit_sha: String,
    /// Added, modified and removed files across all commits, first-seen order
    pub changes: Vec<String>,
    /// Raw request body
    pub body: Vec<u8>,
    /// Decoded request body, queried by `$(event {...})` expressions
    pub payload: Value,
    /// Value of `X-Hub-Signature-256`
    pub hmac_signature: String,
    pub delivery_id: String,
    pub hook_id: String,
}

impl Event {
    /// Whether the event carries branch and change information
    pub fn is_branch_event(&self) -> bool {
        self.name == PUSH || self.name == PULL_REQUEST
    }
}
