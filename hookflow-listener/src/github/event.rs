//! GitHub event parsing
//!
//! Turns a webhook delivery (headers plus JSON body) into the canonical
//! [`Event`]. Each supported event type has its own payload shape; every
//! other type only contributes its repository.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use axum::http::HeaderMap;
use hookflow_core::domain::Event;
use hookflow_core::domain::event::{PULL_REQUEST, PUSH};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::signature::SIGNATURE_HEADER;

/// Header naming the event type
pub const EVENT_HEADER: &str = "X-GitHub-Event";

/// Header carrying the unique delivery id
pub const DELIVERY_HEADER: &str = "X-GitHub-Delivery";

/// Header carrying the id of the webhook that sent the delivery
pub const HOOK_ID_HEADER: &str = "X-GitHub-Hook-ID";

static BRANCH_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^refs/heads/(.*)$").expect("valid branch ref regex"));

/// Errors raised when a request is not a usable GitHub delivery
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Missing required header {0}")]
    MissingHeader(&'static str),

    #[error("Unable to parse the request body as a Github {event} event: {source}")]
    InvalidBody {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RepositoryField {
    full_name: String,
}

/// Any payload exposing a repository
#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    repository: Option<RepositoryField>,
}

#[derive(Debug, Deserialize)]
struct Commit {
    #[serde(default)]
    id: String,
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    modified: Vec<String>,
    #[serde(default)]
    removed: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref", default)]
    git_ref: String,
    head_commit: Option<Commit>,
    #[serde(default)]
    commits: Vec<Commit>,
}

#[derive(Debug, Deserialize)]
struct PullRequestHead {
    #[serde(rename = "ref", default)]
    git_ref: String,
    #[serde(default)]
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    head: PullRequestHead,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    pull_request: PullRequest,
}

/// Parser of inbound GitHub deliveries
pub struct EventParser;

impl EventParser {
    /// Builds the canonical event of a delivery
    ///
    /// # Arguments
    /// * `headers` - Request headers, looked up case-insensitively
    /// * `body` - Raw request body
    ///
    /// # Returns
    /// The event, or an error when the event header is missing or the body
    /// doesn't decode as the announced event type
    pub fn parse(headers: &HeaderMap, body: &[u8]) -> Result<Event, EventError> {
        let name = header(headers, EVENT_HEADER)
            .filter(|name| !name.is_empty())
            .ok_or(EventError::MissingHeader(EVENT_HEADER))?;

        let invalid = |source| EventError::InvalidBody {
            event: name.clone(),
            source,
        };

        let payload: Value = serde_json::from_slice(body).map_err(invalid)?;
        let repository = RepositoryPayload::deserialize(&payload)
            .map_err(invalid)?
            .repository
            .map(|repository| repository.full_name)
            .unwrap_or_default();

        let mut event = Event {
            name: name.clone(),
            repository,
            hmac_signature: header(headers, SIGNATURE_HEADER).unwrap_or_default(),
            delivery_id: header(headers, DELIVERY_HEADER).unwrap_or_default(),
            hook_id: header(headers, HOOK_ID_HEADER).unwrap_or_default(),
            ..Default::default()
        };

        match name.as_str() {
            PUSH => {
                let push = PushPayload::deserialize(&payload).map_err(invalid)?;
                event.branch = branch_name(&push.git_ref);
                event.head_commit_sha = push.head_commit.map(|c| c.id).unwrap_or_default();
                event.changes = changed_files(&push.commits);
            }
            PULL_REQUEST => {
                let pull_request = PullRequestPayload::deserialize(&payload).map_err(invalid)?;
                let head = pull_request.pull_request.head;
                event.branch = branch_name(&head.git_ref);
                event.head_commit_sha = head.sha;
            }
            _ => {}
        }

        event.payload = payload;
        event.body = body.to_vec();
        Ok(event)
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
}

/// Strips `refs/heads/` from a fully qualified ref; other refs are kept as-is
fn branch_name(git_ref: &str) -> String {
    BRANCH_REF
        .captures(git_ref)
        .and_then(|captures| captures.get(1))
        .map_or(git_ref, |branch| branch.as_str())
        .to_string()
}

/// Added, modified and removed files across commits, without duplicates
fn changed_files(commits: &[Commit]) -> Vec<String> {
    let mut seen = BTreeSet::new();

    commits
        .iter()
        .flat_map(|commit| commit.added.iter().chain(&commit.modified).chain(&commit.removed))
        .filter(|file| seen.insert(file.as_str()))
        .cloned()
        .collect()
}
