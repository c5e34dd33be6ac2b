//! Error types for pipeline compilation and configuration

use thiserror::Error;

/// Errors raised while compiling a workflow into a pipeline run
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    /// A step references a built-in action nobody registered
    #[error("task {task} uses unknown built-in action {action:?}")]
    UnknownAction { task: String, action: String },
}

/// Errors raised while reading pipeline defaults or repository workflows
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
