//! Workflows committed alongside source code
//!
//! A repository may carry its own version of a workflow at
//! `{workflows-dir}/{name}.yaml`. When a delivery references a commit, that
//! file's trigger filters and tasks take precedence over the stored object.

use hookflow_core::domain::Workflow;

use crate::error::ConfigError;

/// Overlays the workflow file read from the repository onto `stored`
///
/// Identity, status, repositories and webhook settings always come from the
/// stored object, since those back remote resources the controller manages.
pub fn overlay(stored: &Workflow, contents: &[u8]) -> Result<Workflow, ConfigError> {
    let committed: Workflow = serde_yaml::from_slice(contents)?;

    let mut workflow = stored.clone();
    let spec = committed.spec;
    workflow.spec.description = spec.description;
    workflow.spec.events = spec.events;
    workflow.spec.branches = spec.branches;
    workflow.spec.paths = spec.paths;
    workflow.spec.defaults = spec.defaults;
    workflow.spec.tasks = spec.tasks;

    Ok(workflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookflow_core::domain::meta::ObjectMeta;
    use hookflow_core::domain::workflow::Repository;

    #[test]
    fn test_overlay_keeps_identity_and_repository() {
        let mut stored = Workflow {
            metadata: ObjectMeta::named("dev", "hello"),
            ..Default::default()
        };
        stored.spec.repository = Repository::new("john-doe", "my-repo");
        stored.spec.events = vec!["push".to_string()];

        let committed = br#"
metadata:
  name: ignored
spec:
  repo:
    owner: someone-else
    name: elsewhere
  triggersOn: [pull_request]
  branches: ["release-*"]
  tasks:
    lint:
      steps:
        - run: make lint
"#;

        let workflow = overlay(&stored, committed).unwrap();
        assert_eq!(workflow.metadata.name, "hello");
        assert_eq!(workflow.spec.repository.to_string(), "john-doe/my-repo");
        assert_eq!(workflow.spec.events, vec!["pull_request"]);
        assert_eq!(workflow.spec.branches, vec!["release-*"]);
        assert!(workflow.spec.tasks.contains_key("lint"));
    }

    #[test]
    fn test_overlay_rejects_malformed_yaml() {
        let stored = Workflow::default();
        assert!(overlay(&stored, b"spec: [").is_err());
    }
}
