//! Repository metadata sync
//!
//! Records the default branch and visibility GitHub reports for each
//! repository of a workflow. Visibility decides whether a repository needs a
//! deploy key, and the default branch is the checkout fallback.

use std::sync::Arc;

use hookflow_client::RepositoriesApi;
use hookflow_core::domain::{Repository, Workflow};
use hookflow_core::dto::github::RemoteRepository;
use tracing::{debug, warn};

use crate::error::SyncError;

/// Refreshes repository metadata on workflows
pub struct RepositorySyncer {
    repositories: Arc<dyn RepositoriesApi>,
}

impl RepositorySyncer {
    pub fn new(repositories: Arc<dyn RepositoriesApi>) -> Self {
        Self { repositories }
    }

    /// Updates every repository of `workflow` from GitHub
    ///
    /// A default branch declared by the user is kept.
    ///
    /// # Returns
    /// Whether any repository changed
    pub async fn sync(&self, workflow: &mut Workflow) -> Result<bool, SyncError> {
        let mut changed = false;

        for repo in repositories_mut(workflow) {
            let remote = self
                .repositories
                .get_repository(&repo.owner, &repo.name)
                .await
                .map_err(|e| SyncError::repository(repo, e))?;
            changed |= refresh(repo, remote);
        }

        Ok(changed)
    }

    /// Updates the repositories of `workflow` that still exist on GitHub
    ///
    /// Repositories GitHub no longer knows keep their stored metadata.
    ///
    /// # Returns
    /// The repositories that no longer exist
    pub async fn sync_existing(
        &self,
        workflow: &mut Workflow,
    ) -> Result<Vec<Repository>, SyncError> {
        let mut gone = Vec::new();

        for repo in repositories_mut(workflow) {
            match self.repositories.get_repository(&repo.owner, &repo.name).await {
                Ok(remote) => {
                    refresh(repo, remote);
                }
                Err(e) if e.is_not_found() => {
                    warn!(repository = %repo, "Repository no longer exists");
                    gone.push(repo.clone());
                }
                Err(e) => return Err(SyncError::repository(repo, e)),
            }
        }

        Ok(gone)
    }
}

fn repositories_mut(workflow: &mut Workflow) -> impl Iterator<Item = &mut Repository> {
    std::iter::once(&mut workflow.spec.repository)
        .chain(workflow.spec.additional_repositories.iter_mut())
}

/// Copies remote metadata onto `repo`, returning whether it changed
fn refresh(repo: &mut Repository, remote: RemoteRepository) -> bool {
    let mut changed = false;

    if repo.default_branch.is_empty() && !remote.default_branch.is_empty() {
        repo.default_branch = remote.default_branch;
        changed = true;
    }
    if repo.private != remote.private {
        repo.private = remote.private;
        changed = true;
    }

    debug!(
        repository = %repo,
        default_branch = %repo.default_branch,
        private = repo.private,
        "Read repository metadata"
    );
    changed
}
