//! Sync results
//!
//! A sync never mutates the workflow it converges. It reports what it did as
//! a [`SyncResult`] delta, and the caller applies the delta to the workflow
//! status before persisting it.

use super::workflow::{Repository, WorkflowStatus, deploy_key_id_annotation, webhook_id_annotation};

/// Kind of remote resource a sync manages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Webhook,
    DeployKey,
}

impl SyncKind {
    /// Status annotation recording the remote id for `repo`
    pub fn annotation(&self, repo: &Repository) -> String {
        match self {
            SyncKind::Webhook => webhook_id_annotation(repo),
            SyncKind::DeployKey => deploy_key_id_annotation(repo),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
    Deleted,
}

/// One changed remote resource
#[derive(Clone, PartialEq)]
pub struct SyncResultEntry {
    pub id: i64,
    pub repository: Repository,
    pub action: SyncAction,
    /// Fresh secret material; only present for created or rotated resources
    pub secret: Option<Vec<u8>>,
}

impl std::fmt::Debug for SyncResultEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncResultEntry")
            .field("id", &self.id)
            .field("repository", &self.repository)
            .field("action", &self.action)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Everything a single sync changed
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub kind: SyncKind,
    pub entries: Vec<SyncResultEntry>,
}

impl SyncResult {
    pub fn new(kind: SyncKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: SyncResultEntry) {
        self.entries.push(entry);
    }

    /// Whether nothing was created, updated or deleted
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries carrying new secret material
    pub fn rotated(&self) -> impl Iterator<Item = (&SyncResultEntry, &[u8])> {
        self.entries
            .iter()
            .filter_map(|entry| entry.secret.as_deref().map(|secret| (entry, secret)))
    }

    /// Records created and updated ids on `status`, and forgets deleted ones
    pub fn apply(&self, status: &mut WorkflowStatus) {
        for entry in &self.entries {
            let key = self.kind.annotation(&entry.repository);
            match entry.action {
                SyncAction::Created | SyncAction::Updated => {
                    status.annotations.insert(key, entry.id.to_string());
                }
                SyncAction::Deleted => {
                    status.annotations.remove(&key);
                }
            }
        }
    }
}

/// SSH key pair generated for a deploy key
///
/// Generated fresh on every create or rotation.
#[derive(Clone, PartialEq)]
pub struct KeyPair {
    /// OpenSSH PEM-encoded private key
    pub private_key: Vec<u8>,
    /// Public key in `authorized_keys` format
    pub public_key: String,
    pub repository: Repository,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}
