//! Built-in actions
//!
//! A built-in action is a named step generator (`uses: checkout`) that can
//! also hook into every stage of pipeline-run assembly to inject structure
//! the step depends on, such as workspaces, volumes and results. The compiler
//! only dispatches to actions by id; it knows nothing about what they do.

pub mod checkout;

pub use checkout::CheckoutAction;

use hookflow_core::domain::pipeline_run::{
    EmbeddedTask, PipelineRun, PipelineSpec, PipelineTask, Step,
};
use hookflow_core::domain::workflow::EmbeddedStep;
use hookflow_core::domain::{Event, Workflow};

/// Inputs shared by every action while compiling one run
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub workflow: &'a Workflow,
    pub event: &'a Event,
}

/// Trait for built-in actions.
///
/// The four `post_*` hooks run in assembly order, once per embedded task
/// (for the task-level hooks) or once per run (for the spec and run hooks)
/// in which the action is used. Hooks must tolerate being called again on
/// a structure they already modified.
pub trait BuiltInAction: Send + Sync {
    /// Identifier referenced by `uses` in embedded steps
    fn id(&self) -> &'static str;

    /// Builds the step replacing an embedded step that uses this action
    fn build_step(&self, ctx: &ActionContext<'_>, step: &EmbeddedStep) -> Step;

    /// Called once the embedded task holding the step is assembled
    fn post_embedded_task_creation(&self, _ctx: &ActionContext<'_>, _task: &mut EmbeddedTask) {}

    /// Called once the pipeline task wrapping that embedded task is assembled
    fn post_pipeline_task_creation(&self, _ctx: &ActionContext<'_>, _task: &mut PipelineTask) {}

    /// Called once the whole pipeline spec is assembled
    fn post_pipeline_spec_creation(&self, _ctx: &ActionContext<'_>, _spec: &mut PipelineSpec) {}

    /// Called once the pipeline run is assembled
    fn post_pipeline_run_creation(&self, _ctx: &ActionContext<'_>, _run: &mut PipelineRun) {}
}

/// Registry of built-in actions
///
/// Provides a central place to register and look up actions by id.
pub struct ActionRegistry {
    actions: Vec<Box<dyn BuiltInAction>>,
}

impl ActionRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Registers an action
    ///
    /// # Panics
    /// Panics if an action with the same id is already registered
    pub fn register(&mut self, action: Box<dyn BuiltInAction>) {
        let id = action.id();
        if self.actions.iter().any(|a| a.id() == id) {
            panic!("Action with id '{}' is already registered", id);
        }
        self.actions.push(action);
    }

    /// Gets an action by id
    pub fn get(&self, id: &str) -> Option<&dyn BuiltInAction> {
        self.actions
            .iter()
            .find(|a| a.id() == id)
            .map(|a| a.as_ref())
    }
}

impl Default for ActionRegistry {
    /// Registry with every built-in action
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CheckoutAction));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoAction;

    impl BuiltInAction for EchoAction {
        fn id(&self) -> &'static str {
            "echo"
        }

        fn build_step(&self, _ctx: &ActionContext<'_>, step: &EmbeddedStep) -> Step {
            Step {
                name: step.name.clone(),
                script: "echo".to_string(),
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_default_registry_has_checkout() {
        let registry = ActionRegistry::default();
        assert!(registry.get("checkout").is_some());
        assert!(registry.get("deploy").is_none());
    }

    #[test]
    fn test_register_custom_action() {
        let mut registry = ActionRegistry::default();
        registry.register(Box::new(EchoAction));

        assert!(registry.get("checkout").is_some());
        assert_eq!(registry.get("echo").map(|a| a.id()), Some("echo"));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let mut registry = ActionRegistry::new();
        registry.register(Box::new(EchoAction));
        registry.register(Box::new(EchoAction));
    }
}
