//! Checkout action
//!
//! Clones the workflow's repositories into the shared `projects` workspace
//! and records the checked-out commit of each one as a task result.

use hookflow_core::domain::pipeline_run::{
    EmbeddedTask, EmptyDir, PipelineRun, PipelineSpec, PipelineTask,
    PipelineWorkspaceDeclaration, SecretVolumeSource, Step, TaskResult, Volume, VolumeMount,
    WorkspaceBinding, WorkspaceDeclaration, WorkspacePipelineTaskBinding,
};
use hookflow_core::domain::workflow::{CHECKOUT_ACTION, EmbeddedStep, Repository};
use hookflow_core::domain::Event;

use super::{ActionContext, BuiltInAction};
use crate::builder::SCRIPT_PREAMBLE;

/// Image used for checking out code
pub const GIT_INIT_IMAGE: &str =
    "gcr.io/tekton-releases/github.com/tektoncd/pipeline/cmd/git-init:v0.18.1";

/// Workspace hosting checked-out repositories
pub const PROJECTS_WORKSPACE: &str = "projects";

/// Path of the projects workspace, as a parameter expression
pub const PROJECTS_WORKSPACE_PATH: &str = "$(workspaces.projects.path)";

/// Where SSH private keys are mounted inside checkout steps
pub const SSH_PRIVATE_KEYS_MOUNT_PATH: &str = "/var/run/secrets/workflows";

/// Volume projecting the deploy-keys secret
pub const SSH_PRIVATE_KEYS_VOLUME: &str = "ssh-private-keys";

/// r-- for the owner
const SSH_PRIVATE_KEYS_MODE: i32 = 0o400;

const CLONE_DEPTH: u32 = 1;

/// Parameters of one repository checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOptions {
    pub url: String,
    pub revision: String,
    pub destination: String,
    pub result_name: String,
    pub ssh_private_key: Option<String>,
    pub depth: u32,
}

impl CheckoutOptions {
    /// Options for checking out `repo` at the commit referenced by `event`
    ///
    /// Falls back to the repository's default branch when the event carries
    /// no head commit.
    pub fn new(repo: &Repository, event: &Event) -> Self {
        let (url, ssh_private_key) = if repo.needs_ssh_private_keys() {
            (
                format!("git@github.com:{}/{}.git", repo.owner, repo.name),
                Some(format!(
                    "{}/{}",
                    SSH_PRIVATE_KEYS_MOUNT_PATH,
                    repo.ssh_private_key_name()
                )),
            )
        } else {
            (format!("https://github.com/{}/{}", repo.owner, repo.name), None)
        };

        let revision = if event.head_commit_sha.is_empty() {
            repo.default_branch.clone()
        } else {
            event.head_commit_sha.clone()
        };

        Self {
            url,
            revision,
            destination: checkout_path(repo),
            result_name: result_name(repo),
            ssh_private_key,
            depth: CLONE_DEPTH,
        }
    }

    /// Shell script performing the clone
    pub fn script(&self) -> String {
        let mut script = String::from(SCRIPT_PREAMBLE);

        if let Some(key) = &self.ssh_private_key {
            script.push_str(&format!(
                "mkdir -p ~/.ssh\n\
                 cat > ~/.ssh/config<<EOF\n\
                 Host github.com\n  User git\n  Hostname github.com\n  IdentityFile {}\n\
                 EOF\n",
                key
            ));
        }

        script.push_str(&format!(
            "/ko-app/git-init \\\n    \
             -url=\"{}\" \\\n    \
             -revision=\"{}\" \\\n    \
             -path=\"{}\" \\\n    \
             -sslVerify=\"true\" \\\n    \
             -submodules=\"true\" \\\n    \
             -depth=\"{}\"\n\
             cd {}\n\
             echo -n \"$(git rev-parse HEAD)\" > /tekton/results/{}",
            self.url,
            self.revision,
            self.destination,
            self.depth,
            self.destination,
            self.result_name
        ));

        script
    }
}

/// Directory `repo` is checked out into
pub fn checkout_path(repo: &Repository) -> String {
    format!("{}/{}", PROJECTS_WORKSPACE_PATH, repo.name)
}

/// Task result holding the commit checked out for `repo`
pub fn result_name(repo: &Repository) -> String {
    format!("{}-commit", repo.name)
}

fn checkout_step(name: String, repo: &Repository, event: &Event) -> Step {
    let options = CheckoutOptions::new(repo, event);

    let volume_mounts = if repo.needs_ssh_private_keys() {
        vec![VolumeMount {
            name: SSH_PRIVATE_KEYS_VOLUME.to_string(),
            mount_path: SSH_PRIVATE_KEYS_MOUNT_PATH.to_string(),
            read_only: true,
        }]
    } else {
        Vec::new()
    };

    Step {
        name,
        image: GIT_INIT_IMAGE.to_string(),
        script: options.script(),
        volume_mounts,
        ..Default::default()
    }
}

/// Built-in `checkout` action
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutAction;

impl BuiltInAction for CheckoutAction {
    fn id(&self) -> &'static str {
        CHECKOUT_ACTION
    }

    fn build_step(&self, ctx: &ActionContext<'_>, step: &EmbeddedStep) -> Step {
        let name = if step.name.is_empty() {
            CHECKOUT_ACTION.to_string()
        } else {
            step.name.clone()
        };

        checkout_step(name, &ctx.workflow.spec.repository, ctx.event)
    }

    fn post_embedded_task_creation(&self, ctx: &ActionContext<'_>, task: &mut EmbeddedTask) {
        let workflow = ctx.workflow;
        let primary = &workflow.spec.repository;

        if !task.workspaces.iter().any(|w| w.name == PROJECTS_WORKSPACE) {
            task.workspaces.push(WorkspaceDeclaration {
                name: PROJECTS_WORKSPACE.to_string(),
            });
        }

        // Non-checkout steps run inside the primary repository
        for step in task.steps.iter_mut() {
            if step.image != GIT_INIT_IMAGE && step.working_dir.is_empty() {
                step.working_dir = checkout_path(primary);
            }
        }

        // Additional repositories are not bound to the event, so they are
        // checked out at their default branch.
        let unbound = Event::default();
        let additional: Vec<Step> = workflow
            .spec
            .additional_repositories
            .iter()
            .map(|repo| checkout_step(format!("checkout-{}", repo.name), repo, &unbound))
            .filter(|step| !task.steps.iter().any(|existing| existing.name == step.name))
            .collect();
        let at = task.steps.len().min(1);
        task.steps.splice(at..at, additional);

        for repo in workflow.repositories() {
            let name = result_name(repo);
            if !task.results.iter().any(|r| r.name == name) {
                task.results.push(TaskResult { name });
            }
        }

        let needs_ssh_private_keys = workflow
            .repositories()
            .iter()
            .any(|repo| repo.needs_ssh_private_keys());

        if needs_ssh_private_keys && !task.volumes.iter().any(|v| v.name == SSH_PRIVATE_KEYS_VOLUME) {
            task.volumes.push(Volume {
                name: SSH_PRIVATE_KEYS_VOLUME.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: workflow.deploy_keys_secret_name(),
                    default_mode: Some(SSH_PRIVATE_KEYS_MODE),
                }),
            });
        }
    }

    fn post_pipeline_task_creation(&self, _ctx: &ActionContext<'_>, task: &mut PipelineTask) {
        if !task.workspaces.iter().any(|w| w.name == PROJECTS_WORKSPACE) {
            task.workspaces.push(WorkspacePipelineTaskBinding {
                name: PROJECTS_WORKSPACE.to_string(),
                workspace: PROJECTS_WORKSPACE.to_string(),
            });
        }
    }

    fn post_pipeline_spec_creation(&self, _ctx: &ActionContext<'_>, spec: &mut PipelineSpec) {
        if !spec.workspaces.iter().any(|w| w.name == PROJECTS_WORKSPACE) {
            spec.workspaces.push(PipelineWorkspaceDeclaration {
                name: PROJECTS_WORKSPACE.to_string(),
            });
        }
    }

    fn post_pipeline_run_creation(&self, _ctx: &ActionContext<'_>, run: &mut PipelineRun) {
        if !run.spec.workspaces.iter().any(|w| w.name == PROJECTS_WORKSPACE) {
            run.spec.workspaces.push(WorkspaceBinding {
                name: PROJECTS_WORKSPACE.to_string(),
                empty_dir: Some(EmptyDir {}),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookflow_core::domain::meta::ObjectMeta;
    use hookflow_core::domain::workflow::{WorkflowSpec, Workflow};

    fn workflow(private: bool) -> Workflow {
        let mut repo = Repository::new("john-doe", "my-repo");
        repo.private = private;
        repo.default_branch = "main".to_string();

        Workflow {
            metadata: ObjectMeta::named("dev", "hello"),
            spec: WorkflowSpec {
                repository: repo,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn event() -> Event {
        Event {
            name: "push".to_string(),
            head_commit_sha: "833568e".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_public_checkout_script() {
        let options = CheckoutOptions::new(&workflow(false).spec.repository, &event());

        assert_eq!(
            options.script(),
            "#!/usr/bin/env sh\n\
             set -eu\n\
             /ko-app/git-init \\\n    \
             -url=\"https://github.com/john-doe/my-repo\" \\\n    \
             -revision=\"833568e\" \\\n    \
             -path=\"$(workspaces.projects.path)/my-repo\" \\\n    \
             -sslVerify=\"true\" \\\n    \
             -submodules=\"true\" \\\n    \
             -depth=\"1\"\n\
             cd $(workspaces.projects.path)/my-repo\n\
             echo -n \"$(git rev-parse HEAD)\" > /tekton/results/my-repo-commit"
        );
    }

    #[test]
    fn test_private_checkout_uses_ssh() {
        let wf = workflow(true);
        let event = event();
        let ctx = ActionContext {
            workflow: &wf,
            event: &event,
        };

        let step = CheckoutAction.build_step(&ctx, &EmbeddedStep::default());
        assert_eq!(step.name, "checkout");
        assert_eq!(step.image, GIT_INIT_IMAGE);
        assert!(step.script.contains("-url=\"git@github.com:john-doe/my-repo.git\""));
        assert!(step.script.contains("-revision=\"833568e\""));
        assert!(step
            .script
            .contains("IdentityFile /var/run/secrets/workflows/my-repo_id_rsa"));
        assert_eq!(step.volume_mounts.len(), 1);
        assert!(step.volume_mounts[0].read_only);
    }

    #[test]
    fn test_revision_falls_back_to_default_branch() {
        let options = CheckoutOptions::new(&workflow(false).spec.repository, &Event::default());
        assert_eq!(options.revision, "main");
    }

    #[test]
    fn test_embedded_task_hook() {
        let mut wf = workflow(false);
        let mut lib = Repository::new("john-doe", "lib");
        lib.private = true;
        lib.default_branch = "develop".to_string();
        wf.spec.additional_repositories.push(lib);

        let event = event();
        let ctx = ActionContext {
            workflow: &wf,
            event: &event,
        };

        let mut task = EmbeddedTask {
            steps: vec![
                CheckoutAction.build_step(&ctx, &EmbeddedStep::default()),
                Step {
                    name: "test".to_string(),
                    ..Default::default()
                },
                Step {
                    name: "report".to_string(),
                    working_dir: "/tmp".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        CheckoutAction.post_embedded_task_creation(&ctx, &mut task);
        CheckoutAction.post_embedded_task_creation(&ctx, &mut task);

        let names: Vec<&str> = task.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["checkout", "checkout-lib", "test", "report"]);
        assert!(task.steps[1].script.contains("-revision=\"develop\""));
        assert!(task.steps[1].working_dir.is_empty());
        assert_eq!(task.steps[2].working_dir, "$(workspaces.projects.path)/my-repo");
        assert_eq!(task.steps[3].working_dir, "/tmp");

        assert_eq!(task.workspaces.len(), 1);
        let results: Vec<&str> = task.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(results, vec!["my-repo-commit", "lib-commit"]);

        assert_eq!(task.volumes.len(), 1);
        let secret = task.volumes[0].secret.as_ref().unwrap();
        assert_eq!(secret.secret_name, "hello-ssh-private-keys");
        assert_eq!(secret.default_mode, Some(256));
    }

    #[test]
    fn test_public_repositories_get_no_volume() {
        let wf = workflow(false);
        let event = event();
        let ctx = ActionContext {
            workflow: &wf,
            event: &event,
        };
        let mut task = EmbeddedTask {
            steps: vec![CheckoutAction.build_step(&ctx, &EmbeddedStep::default())],
            ..Default::default()
        };

        CheckoutAction.post_embedded_task_creation(&ctx, &mut task);

        assert!(task.volumes.is_empty());
        assert!(task.steps[0].volume_mounts.is_empty());
    }

    #[test]
    fn test_later_hooks_declare_workspace_once() {
        let wf = workflow(false);
        let event = event();
        let ctx = ActionContext {
            workflow: &wf,
            event: &event,
        };

        let mut task = PipelineTask::default();
        let mut spec = PipelineSpec::default();
        let mut run = PipelineRun::default();
        for _ in 0..2 {
            CheckoutAction.post_pipeline_task_creation(&ctx, &mut task);
            CheckoutAction.post_pipeline_spec_creation(&ctx, &mut spec);
            CheckoutAction.post_pipeline_run_creation(&ctx, &mut run);
        }

        assert_eq!(
            task.workspaces,
            vec![WorkspacePipelineTaskBinding {
                name: "projects".to_string(),
                workspace: "projects".to_string()
            }]
        );
        assert_eq!(spec.workspaces.len(), 1);
        assert_eq!(run.spec.workspaces.len(), 1);
        assert_eq!(run.spec.workspaces[0].empty_dir, Some(EmptyDir {}));
    }
}
