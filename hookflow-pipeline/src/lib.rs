//! Hookflow Pipeline Compilation
//!
//! This crate turns workflows into pipeline runs. It includes:
//! - Trigger filters deciding whether an event may run a workflow
//! - Variable expansion over workflow metadata and event payloads
//! - Built-in actions and their registry
//! - Global pipeline defaults and workflows committed to repositories
//! - The pipeline-run compiler itself

pub mod action;
pub mod builder;
pub mod defaults;
pub mod error;
pub mod filter;
pub mod source;
pub mod variables;

pub use action::{ActionContext, ActionRegistry, BuiltInAction, CheckoutAction};
pub use builder::PipelineRunBuilder;
pub use defaults::PipelineDefaults;
pub use error::{CompileError, ConfigError};
pub use filter::{Verdict, can_trigger};
pub use variables::Replacements;
