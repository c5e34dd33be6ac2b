//! Template substitution

use std::collections::BTreeMap;
use std::sync::LazyLock;

use hookflow_core::domain::{Event, Workflow};
use regex::{Captures, Regex};
use serde_json::Value;

use super::json_path;

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\(((event\s*\{[^\}]+\})|(workflow\.[^\)]+))\)").expect("valid expression pattern")
});

static EVENT_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"event\s*(\{[^\}]+\})").expect("valid event pattern"));

/// Values available to expressions while compiling one workflow run
#[derive(Debug, Clone)]
pub struct Replacements<'a> {
    special_variables: BTreeMap<&'static str, String>,
    payload: &'a Value,
}

impl<'a> Replacements<'a> {
    pub fn new(workflow: &Workflow, event: &'a Event) -> Self {
        let special_variables = BTreeMap::from([
            ("workflow.name", workflow.name().to_string()),
            ("workflow.repo.owner", workflow.spec.repository.owner.clone()),
            ("workflow.repo.name", workflow.spec.repository.name.clone()),
            ("workflow.head-commit", event.head_commit_sha.clone()),
        ]);

        Self {
            special_variables,
            payload: &event.payload,
        }
    }

    /// Expands every known expression in `text`
    ///
    /// Unknown variables and expressions that fail to evaluate are left
    /// verbatim.
    pub fn expand(&self, text: &str) -> String {
        EXPRESSION
            .replace_all(text, |captures: &Captures| {
                self.resolve(&captures[1])
                    .unwrap_or_else(|| captures[0].to_string())
            })
            .into_owned()
    }

    fn resolve(&self, key: &str) -> Option<String> {
        if let Some(captures) = EVENT_EXPRESSION.captures(key) {
            return match json_path::query(self.payload, &captures[1]) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::debug!(expression = key, error = %e, "leaving event expression unexpanded");
                    None
                }
            };
        }

        self.special_variables.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookflow_core::domain::meta::ObjectMeta;
    use hookflow_core::domain::workflow::{Repository, WorkflowSpec};
    use serde_json::json;

    fn workflow() -> Workflow {
        Workflow {
            metadata: ObjectMeta::named("dev", "hello-world"),
            spec: WorkflowSpec {
                repository: Repository::new("john-doe", "my-repo"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn event() -> Event {
        Event {
            name: "push".to_string(),
            head_commit_sha: "833568e".to_string(),
            payload: json!({"forced": false, "sender": {"login": "john-doe"}}),
            ..Default::default()
        }
    }

    #[test]
    fn test_workflow_variables() {
        let event = event();
        let replacements = Replacements::new(&workflow(), &event);

        assert_eq!(replacements.expand("$(workflow.name)"), "hello-world");
        assert_eq!(
            replacements.expand("--repo $(workflow.repo.owner)/$(workflow.repo.name)"),
            "--repo john-doe/my-repo"
        );
        assert_eq!(replacements.expand("$(workflow.head-commit)"), "833568e");
    }

    #[test]
    fn test_event_expressions() {
        let event = event();
        let replacements = Replacements::new(&workflow(), &event);

        assert_eq!(replacements.expand("$(event {.forced})"), "false");
        assert_eq!(
            replacements.expand("Hello $(event{.sender.login}), welcome to $(workflow.repo.name)"),
            "Hello john-doe, welcome to my-repo"
        );
    }

    #[test]
    fn test_unknown_expressions_are_left_verbatim() {
        let event = event();
        let replacements = Replacements::new(&workflow(), &event);

        assert_eq!(replacements.expand("$(workflow.nope)"), "$(workflow.nope)");
        assert_eq!(
            replacements.expand("$(workspaces.project.path)"),
            "$(workspaces.project.path)"
        );
        assert_eq!(replacements.expand("$(event {sender})"), "$(event {sender})");
    }
}
