//! Reconcile errors

use hookflow_client::ClientError;
use hookflow_core::domain::{Repository, SyncKind, SyncResult};
use thiserror::Error;

/// Errors raised while converging remote resources
///
/// Remote failures keep the underlying [`ClientError`] as their source.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Error syncing webhook for repository {repository}: {source}")]
    Webhook {
        repository: String,
        #[source]
        source: ClientError,
    },

    #[error("Error deleting webhook for repository {0}: the webhook's identifier is unknown")]
    UnknownWebhook(String),

    #[error("Error syncing deploy key for repository {repository}: {source}")]
    DeployKey {
        repository: String,
        #[source]
        source: ClientError,
    },

    #[error("Error deleting deploy key for repository {0}: the key's identifier is unknown")]
    UnknownDeployKey(String),

    #[error("Error reading repository {repository}: {source}")]
    Repository {
        repository: String,
        #[source]
        source: ClientError,
    },

    #[error("Error generating SSH key pair for repository {repository}: {source}")]
    KeyGeneration {
        repository: String,
        #[source]
        source: ssh_key::Error,
    },

    #[error("Error writing secret {name}: {source}")]
    Secret {
        name: String,
        #[source]
        source: ClientError,
    },

    #[error("Error reading secret {name}: {source}")]
    ReadSecret {
        name: String,
        #[source]
        source: ClientError,
    },

    /// A sync failed after changing some resources, listed in `synced`
    #[error("{error}")]
    Partial {
        synced: SyncResult,
        error: Box<SyncError>,
    },
}

impl SyncError {
    pub fn webhook(repo: &Repository, source: ClientError) -> Self {
        Self::Webhook {
            repository: repo.to_string(),
            source,
        }
    }

    pub fn deploy_key(repo: &Repository, source: ClientError) -> Self {
        Self::DeployKey {
            repository: repo.to_string(),
            source,
        }
    }

    pub fn repository(repo: &Repository, source: ClientError) -> Self {
        Self::Repository {
            repository: repo.to_string(),
            source,
        }
    }

    pub fn secret(name: impl Into<String>, source: ClientError) -> Self {
        Self::Secret {
            name: name.into(),
            source,
        }
    }

    pub fn read_secret(name: impl Into<String>, source: ClientError) -> Self {
        Self::ReadSecret {
            name: name.into(),
            source,
        }
    }

    /// Splits a sync failure into what was changed before it and the failure
    pub fn into_partial(self, kind: SyncKind) -> (SyncResult, SyncError) {
        match self {
            SyncError::Partial { synced, error } => (synced, *error),
            error => (SyncResult::new(kind), error),
        }
    }
}
