//! Pipeline-run compiler
//!
//! Turns a workflow and the event that triggered it into a fresh pipeline
//! run. Each task becomes a node of the graph; only explicit `needs` edges
//! order nodes. Built-in actions used by a task's steps get a hook after
//! each assembly stage.

use std::collections::BTreeMap;

use hookflow_core::domain::meta::ObjectMeta;
use hookflow_core::domain::pipeline_run::{
    EmbeddedTask, EnvVar, Param, PipelineRun, PipelineRunSpec, PipelineSpec, PipelineTask,
    PipelineTaskRunSpec, ResourceRequirements, Step, StepTemplate, TaskRef,
};
use hookflow_core::domain::workflow::{EmbeddedStep, Task, WORKFLOW_LABEL};
use hookflow_core::domain::{Event, Workflow};

use crate::action::{ActionContext, ActionRegistry, BuiltInAction};
use crate::defaults::{PipelineDefaults, merge_absent};
use crate::error::CompileError;
use crate::variables::Replacements;

/// Strict-mode preamble of every generated script
pub(crate) const SCRIPT_PREAMBLE: &str = "#!/usr/bin/env sh\nset -eu\n";

/// Script steps always pull so mutable tags pick up new images
const SCRIPT_PULL_POLICY: &str = "Always";

/// Builds pipeline runs from a workflow and its triggering event
pub struct PipelineRunBuilder<'a> {
    workflow: &'a Workflow,
    event: &'a Event,
    defaults: &'a PipelineDefaults,
    actions: &'a ActionRegistry,
}

impl<'a> PipelineRunBuilder<'a> {
    /// Creates a builder
    ///
    /// # Arguments
    /// * `workflow` - The workflow to compile, with defaults already applied
    /// * `event` - The event that triggered it
    /// * `defaults` - Global pipeline defaults
    /// * `actions` - Built-in actions steps may use
    pub fn new(
        workflow: &'a Workflow,
        event: &'a Event,
        defaults: &'a PipelineDefaults,
        actions: &'a ActionRegistry,
    ) -> Self {
        Self {
            workflow,
            event,
            defaults,
            actions,
        }
    }

    fn context(&self) -> ActionContext<'a> {
        ActionContext {
            workflow: self.workflow,
            event: self.event,
        }
    }

    /// Compiles the pipeline run
    ///
    /// # Returns
    /// A pipeline run ready for submission, or an error if a step uses an
    /// unknown built-in action
    pub fn build(&self) -> Result<PipelineRun, CompileError> {
        let ctx = self.context();
        let replacements = Replacements::new(self.workflow, self.event);

        let mut used_actions: Vec<&dyn BuiltInAction> = Vec::new();
        let mut tasks = Vec::with_capacity(self.workflow.spec.tasks.len());

        for (name, task) in &self.workflow.spec.tasks {
            let (pipeline_task, actions) = self.build_pipeline_task(name, task, &replacements)?;
            tasks.push(pipeline_task);
            for action in actions {
                push_unique(&mut used_actions, action);
            }
        }

        let mut pipeline_spec = PipelineSpec {
            description: self.workflow.spec.description.clone(),
            tasks,
            workspaces: Vec::new(),
        };
        for action in &used_actions {
            action.post_pipeline_spec_creation(&ctx, &mut pipeline_spec);
        }

        let mut pipeline_run = PipelineRun {
            metadata: self.build_metadata(&replacements),
            spec: PipelineRunSpec {
                pipeline_spec,
                task_run_specs: self.build_task_run_specs(),
                workspaces: Vec::new(),
            },
            ..Default::default()
        };
        for action in &used_actions {
            action.post_pipeline_run_creation(&ctx, &mut pipeline_run);
        }

        Ok(pipeline_run)
    }

    fn build_metadata(&self, replacements: &Replacements<'_>) -> ObjectMeta {
        let workflow = self.workflow;

        let mut labels = BTreeMap::from([(WORKFLOW_LABEL.to_string(), workflow.name().to_string())]);
        merge_absent(&mut labels, &expand_values(&workflow.metadata.labels, replacements));
        merge_absent(&mut labels, &expand_values(&self.defaults.labels, replacements));

        let mut annotations = expand_values(&workflow.metadata.annotations, replacements);
        merge_absent(&mut annotations, &expand_values(&self.defaults.annotations, replacements));

        ObjectMeta {
            generate_name: format!("{}-run-", workflow.name()),
            namespace: workflow.namespace().to_string(),
            labels,
            annotations,
            ..Default::default()
        }
    }

    fn build_pipeline_task(
        &self,
        name: &str,
        task: &Task,
        replacements: &Replacements<'_>,
    ) -> Result<(PipelineTask, Vec<&'a dyn BuiltInAction>), CompileError> {
        let mut pipeline_task = PipelineTask {
            name: name.to_string(),
            run_after: task.need.clone(),
            retries: task.retries,
            timeout: task.timeout.clone(),
            ..Default::default()
        };

        let mut actions = Vec::new();
        match &task.uses {
            Some(task_ref) => {
                pipeline_task.task_ref = Some(TaskRef {
                    name: task_ref.clone(),
                });
                pipeline_task.params = task
                    .params
                    .iter()
                    .map(|(name, value)| Param {
                        name: name.clone(),
                        value: replacements.expand(value),
                    })
                    .collect();
            }
            None => {
                let (embedded, used) = self.build_embedded_task(name, task, replacements)?;
                pipeline_task.task_spec = Some(embedded);
                actions = used;
            }
        }

        let ctx = self.context();
        for action in &actions {
            action.post_pipeline_task_creation(&ctx, &mut pipeline_task);
        }

        Ok((pipeline_task, actions))
    }

    fn build_embedded_task(
        &self,
        name: &str,
        task: &Task,
        replacements: &Replacements<'_>,
    ) -> Result<(EmbeddedTask, Vec<&'a dyn BuiltInAction>), CompileError> {
        let ctx = self.context();
        let mut actions: Vec<&'a dyn BuiltInAction> = Vec::new();
        let mut steps = Vec::with_capacity(task.steps.len());

        for step in &task.steps {
            match &step.uses {
                Some(id) => {
                    let action = self.actions.get(id).ok_or_else(|| CompileError::UnknownAction {
                        task: name.to_string(),
                        action: id.clone(),
                    })?;
                    steps.push(action.build_step(&ctx, step));
                    push_unique(&mut actions, action);
                }
                None => steps.push(self.build_script_step(step, replacements)),
            }
        }

        let mut embedded = EmbeddedTask {
            step_template: build_step_template(task),
            steps,
            ..Default::default()
        };
        for action in &actions {
            action.post_embedded_task_creation(&ctx, &mut embedded);
        }

        Ok((embedded, actions))
    }

    fn build_script_step(&self, step: &EmbeddedStep, replacements: &Replacements<'_>) -> Step {
        let image = if step.image.is_empty() {
            self.defaults.image_for(self.workflow)
        } else {
            step.image.clone()
        };

        Step {
            name: step.name.clone(),
            image,
            image_pull_policy: SCRIPT_PULL_POLICY.to_string(),
            script: replacements.expand(&format!("{}{}", SCRIPT_PREAMBLE, step.run)),
            env: EnvVar::from_map(&step.env),
            working_dir: step.working_dir.clone(),
            volume_mounts: Vec::new(),
        }
    }

    /// Run overrides for tasks that customize their service account or pod template
    fn build_task_run_specs(&self) -> Vec<PipelineTaskRunSpec> {
        let workflow_defaults = self.workflow.spec.defaults.as_ref();

        self.workflow
            .spec
            .tasks
            .iter()
            .filter_map(|(name, task)| {
                let service_account = Some(task.service_account.clone())
                    .filter(|sa| !sa.is_empty())
                    .or_else(|| {
                        workflow_defaults
                            .map(|d| d.service_account.clone())
                            .filter(|sa| !sa.is_empty())
                    })
                    .unwrap_or_default();
                let pod_template = task
                    .pod_template
                    .clone()
                    .or_else(|| workflow_defaults.and_then(|d| d.pod_template.clone()));

                if service_account.is_empty() && pod_template.is_none() {
                    return None;
                }

                Some(PipelineTaskRunSpec {
                    pipeline_task_name: name.clone(),
                    task_service_account_name: service_account,
                    task_pod_template: pod_template,
                })
            })
            .collect()
    }
}

/// Step template sharing the task's env and resources, if it declares any
///
/// Resource requests equal limits.
fn build_step_template(task: &Task) -> Option<StepTemplate> {
    if task.env.is_empty() && task.resources.is_empty() {
        return None;
    }

    let resources = (!task.resources.is_empty()).then(|| ResourceRequirements {
        limits: task.resources.clone(),
        requests: task.resources.clone(),
    });

    Some(StepTemplate {
        env: EnvVar::from_map(&task.env),
        resources,
    })
}

fn expand_values(
    values: &BTreeMap<String, String>,
    replacements: &Replacements<'_>,
) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(key, value)| (key.clone(), replacements.expand(value)))
        .collect()
}

fn push_unique<'a>(actions: &mut Vec<&'a dyn BuiltInAction>, action: &'a dyn BuiltInAction) {
    if !actions.iter().any(|a| a.id() == action.id()) {
        actions.push(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::checkout::GIT_INIT_IMAGE;
    use hookflow_core::domain::workflow::{Defaults, Repository, WorkflowSpec};
    use serde_json::json;

    fn workflow(tasks: BTreeMap<String, Task>) -> Workflow {
        let mut repo = Repository::new("john-doe", "my-repo");
        repo.private = true;

        Workflow {
            metadata: ObjectMeta::named("dev", "hello"),
            spec: WorkflowSpec {
                repository: repo,
                tasks,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn event() -> Event {
        Event {
            name: "push".to_string(),
            repository: "john-doe/my-repo".to_string(),
            branch: "main".to_string(),
            head_commit_sha: "833568e".to_string(),
            payload: json!({"sender": {"login": "john-doe"}}),
            ..Default::default()
        }
    }

    fn build(workflow: &Workflow, defaults: &PipelineDefaults) -> Result<PipelineRun, CompileError> {
        let event = event();
        let actions = ActionRegistry::default();
        PipelineRunBuilder::new(workflow, &event, defaults, &actions).build()
    }

    #[test]
    fn test_task_references_keep_retries_and_timeout() {
        let tasks = BTreeMap::from([
            (
                "build".to_string(),
                Task {
                    uses: Some("golang-builder".to_string()),
                    ..Default::default()
                },
            ),
            (
                "test".to_string(),
                Task {
                    uses: Some("golang-testing".to_string()),
                    need: vec!["build".to_string()],
                    retries: 2,
                    timeout: Some("1h".to_string()),
                    params: BTreeMap::from([("package".to_string(), "$(workflow.repo.name)/...".to_string())]),
                    ..Default::default()
                },
            ),
        ]);

        let run = build(&workflow(tasks), &PipelineDefaults::default()).unwrap();
        let spec = &run.spec.pipeline_spec;

        let build_task = spec.task("build").unwrap();
        assert_eq!(build_task.task_ref.as_ref().unwrap().name, "golang-builder");
        assert_eq!(build_task.retries, 0);
        assert_eq!(build_task.timeout, None);
        assert!(build_task.run_after.is_empty());

        let test_task = spec.task("test").unwrap();
        assert_eq!(test_task.task_ref.as_ref().unwrap().name, "golang-testing");
        assert_eq!(test_task.retries, 2);
        assert_eq!(test_task.timeout.as_deref(), Some("1h"));
        assert_eq!(test_task.run_after, vec!["build"]);
        assert_eq!(test_task.params[0].value, "my-repo/...");

        assert!(run.spec.task_run_specs.is_empty());
        assert!(run.spec.workspaces.is_empty());
    }

    #[test]
    fn test_metadata_labels_are_first_writer_wins() {
        let mut wf = workflow(BTreeMap::new());
        wf.metadata
            .labels
            .insert("example-label".to_string(), "abc".to_string());

        let defaults = PipelineDefaults {
            labels: BTreeMap::from([
                ("head-commit".to_string(), "$(workflow.head-commit)".to_string()),
                ("example-label".to_string(), "def".to_string()),
            ]),
            annotations: BTreeMap::from([("triggered-by".to_string(), "$(event {.sender.login})".to_string())]),
            ..Default::default()
        };

        let run = build(&wf, &defaults).unwrap();
        assert_eq!(run.metadata.generate_name, "hello-run-");
        assert_eq!(run.metadata.namespace, "dev");
        assert_eq!(
            run.metadata.labels,
            BTreeMap::from([
                ("hookflow.dev/workflow".to_string(), "hello".to_string()),
                ("example-label".to_string(), "abc".to_string()),
                ("head-commit".to_string(), "833568e".to_string()),
            ])
        );
        assert_eq!(run.metadata.annotations["triggered-by"], "john-doe");
    }

    #[test]
    fn test_embedded_task_with_checkout() {
        let tasks = BTreeMap::from([(
            "unit".to_string(),
            Task {
                env: BTreeMap::from([("GOFLAGS".to_string(), "-mod=vendor".to_string())]),
                resources: BTreeMap::from([("cpu".to_string(), "500m".to_string())]),
                steps: vec![
                    EmbeddedStep {
                        uses: Some("checkout".to_string()),
                        ..Default::default()
                    },
                    EmbeddedStep {
                        name: "test".to_string(),
                        image: "golang:1.16".to_string(),
                        run: "go test ./... # $(workflow.name)".to_string(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        )]);

        let run = build(&workflow(tasks), &PipelineDefaults::default()).unwrap();
        let task = run.spec.pipeline_spec.task("unit").unwrap();
        let embedded = task.task_spec.as_ref().unwrap();

        let template = embedded.step_template.as_ref().unwrap();
        assert_eq!(template.env[0].name, "GOFLAGS");
        let resources = template.resources.as_ref().unwrap();
        assert_eq!(resources.limits, resources.requests);

        let checkout = &embedded.steps[0];
        assert_eq!(checkout.name, "checkout");
        assert_eq!(checkout.image, GIT_INIT_IMAGE);
        assert!(checkout.script.contains("-url=\"git@github.com:john-doe/my-repo.git\""));
        assert!(checkout.script.contains("-revision=\"833568e\""));
        assert!(checkout.script.starts_with(SCRIPT_PREAMBLE));

        let test = &embedded.steps[1];
        assert_eq!(test.script, "#!/usr/bin/env sh\nset -eu\ngo test ./... # hello");
        assert_eq!(test.image_pull_policy, "Always");
        assert_eq!(test.working_dir, "$(workspaces.projects.path)/my-repo");

        assert_eq!(embedded.results[0].name, "my-repo-commit");
        assert_eq!(embedded.volumes[0].name, "ssh-private-keys");
        assert_eq!(task.workspaces[0].workspace, "projects");
        assert_eq!(run.spec.pipeline_spec.workspaces[0].name, "projects");
        assert_eq!(run.spec.workspaces[0].name, "projects");
    }

    #[test]
    fn test_script_image_fallbacks() {
        let tasks = BTreeMap::from([(
            "lint".to_string(),
            Task {
                steps: vec![EmbeddedStep {
                    run: "make lint".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
        )]);

        let mut wf = workflow(tasks);
        let run = build(&wf, &PipelineDefaults::default()).unwrap();
        let step = &run.spec.pipeline_spec.tasks[0].task_spec.as_ref().unwrap().steps[0];
        assert_eq!(step.image, "gcr.io/google-containers/busybox");
        assert!(step.working_dir.is_empty());

        wf.spec.defaults = Some(Defaults {
            image: "alpine:3".to_string(),
            ..Default::default()
        });
        let run = build(&wf, &PipelineDefaults::default()).unwrap();
        let step = &run.spec.pipeline_spec.tasks[0].task_spec.as_ref().unwrap().steps[0];
        assert_eq!(step.image, "alpine:3");
    }

    #[test]
    fn test_task_run_specs_only_for_customized_tasks() {
        let tasks = BTreeMap::from([
            (
                "build".to_string(),
                Task {
                    uses: Some("golang-builder".to_string()),
                    service_account: "builder".to_string(),
                    ..Default::default()
                },
            ),
            (
                "test".to_string(),
                Task {
                    uses: Some("golang-testing".to_string()),
                    ..Default::default()
                },
            ),
        ]);

        let run = build(&workflow(tasks), &PipelineDefaults::default()).unwrap();
        assert_eq!(
            run.spec.task_run_specs,
            vec![PipelineTaskRunSpec {
                pipeline_task_name: "build".to_string(),
                task_service_account_name: "builder".to_string(),
                task_pod_template: None,
            }]
        );
    }

    #[test]
    fn test_unknown_action_fails() {
        let tasks = BTreeMap::from([(
            "deploy".to_string(),
            Task {
                steps: vec![EmbeddedStep {
                    uses: Some("teleport".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            },
        )]);

        assert_eq!(
            build(&workflow(tasks), &PipelineDefaults::default()),
            Err(CompileError::UnknownAction {
                task: "deploy".to_string(),
                action: "teleport".to_string()
            })
        );
    }
}
