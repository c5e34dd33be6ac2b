//! Resource syncer trait
//!
//! A syncer converges one kind of remote GitHub resource with what a
//! workflow declares, keyed by the identity annotations on its status.

use async_trait::async_trait;
use hookflow_core::domain::{Repository, SyncResult, SyncResultEntry, Workflow};

use crate::error::SyncError;

/// Service trait for converging a remote resource kind
///
/// No method mutates the workflow. Changes are reported as a [`SyncResult`]
/// delta for the caller to apply and persist.
#[async_trait]
pub trait ResourceSyncer: Send + Sync {
    /// Creates, recreates or updates remote resources to match `workflow`
    ///
    /// # Returns
    /// Entries for every resource created or updated. Created and rotated
    /// resources carry their fresh secret material. A failure after some
    /// resources changed is reported as [`SyncError::Partial`].
    async fn sync(&self, workflow: &Workflow) -> Result<SyncResult, SyncError>;

    /// Deletes the remote resources recorded on `workflow`
    ///
    /// Resources of repositories listed in `gone` went away with their
    /// repository and are only forgotten. Fails when a resource that should
    /// exist has no recorded identifier.
    async fn delete(
        &self,
        workflow: &Workflow,
        gone: &[Repository],
    ) -> Result<SyncResult, SyncError>;

    /// Deletes the given resources, treating already deleted ones as success
    async fn discard(&self, entries: &[SyncResultEntry]) -> Result<(), SyncError>;
}

/// Whether `repo` is listed in `gone`
pub(crate) fn is_gone(gone: &[Repository], repo: &Repository) -> bool {
    gone.iter().any(|g| g.owner == repo.owner && g.name == repo.name)
}
