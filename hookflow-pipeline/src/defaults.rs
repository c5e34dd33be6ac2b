//! Global pipeline defaults
//!
//! Cluster-wide settings applied to every workflow: where workflow files live
//! inside repositories, the fallback step image, the fallback webhook URL and
//! the labels and annotations stamped on every pipeline run.
//!
//! Defaults are read from a flat key/value document, each key with its own
//! validating parser. Values of `labels` and `annotations` may be nested maps
//! or YAML text holding a map.

use std::collections::BTreeMap;
use std::path::Path;

use hookflow_core::domain::Workflow;
use serde_yaml::Value;

use crate::error::ConfigError;

/// Image used when neither the step, the workflow nor the defaults declare one
pub const FALLBACK_IMAGE: &str = "gcr.io/google-containers/busybox";

/// Directory holding workflow files, relative to the repository root
pub const DEFAULT_WORKFLOWS_DIR: &str = ".hookflow/workflows";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefaults {
    pub workflows_dir: String,
    pub default_image: String,
    pub webhook: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            workflows_dir: DEFAULT_WORKFLOWS_DIR.to_string(),
            default_image: FALLBACK_IMAGE.to_string(),
            webhook: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }
}

type Parser = fn(&mut PipelineDefaults, &str) -> Result<(), ConfigError>;

const PARSERS: [(&str, Parser); 5] = [
    ("workflows-dir", parse_workflows_dir),
    ("default-image", parse_default_image),
    ("webhook", parse_webhook),
    ("labels", parse_labels),
    ("annotations", parse_annotations),
];

impl PipelineDefaults {
    /// Parses defaults from string key/value pairs
    ///
    /// Unknown keys are ignored. Absent keys keep their fallback value.
    pub fn from_map(data: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut defaults = Self::default();

        for (key, value) in data {
            match PARSERS.iter().find(|(name, _)| name == key) {
                Some((_, parse)) => parse(&mut defaults, value)?,
                None => tracing::warn!(key = %key, "ignoring unknown pipeline default"),
            }
        }

        if defaults.default_image.is_empty() {
            defaults.default_image = FALLBACK_IMAGE.to_string();
        }
        if defaults.workflows_dir.is_empty() {
            defaults.workflows_dir = DEFAULT_WORKFLOWS_DIR.to_string();
        }

        Ok(defaults)
    }

    /// Parses defaults from a YAML document
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let document: Option<BTreeMap<String, Value>> = serde_yaml::from_str(text)?;

        let data = document
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(text) => text,
                    Value::Null => String::new(),
                    other => serde_yaml::to_string(&other)?,
                };
                Ok((key, text))
            })
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        Self::from_map(&data)
    }

    /// Location of `workflow`'s file inside its repository
    pub fn workflow_file(&self, workflow: &Workflow) -> String {
        format!(
            "{}/{}.yaml",
            self.workflows_dir.trim_end_matches('/'),
            workflow.name()
        )
    }

    /// Fills what `workflow` leaves unset
    ///
    /// Labels and annotations are first-writer-wins: values already on the
    /// workflow are kept.
    pub fn apply(&self, workflow: &mut Workflow) {
        merge_absent(&mut workflow.metadata.labels, &self.labels);
        merge_absent(&mut workflow.metadata.annotations, &self.annotations);

        if workflow.spec.webhook.url.is_empty() {
            if let Some(webhook) = &self.webhook {
                workflow.spec.webhook.url = webhook.clone();
            }
        }

        let image = self.image_for(workflow);
        for task in workflow.spec.tasks.values_mut() {
            for step in task.steps.iter_mut() {
                if step.image.is_empty() && step.uses.is_none() {
                    step.image = image.clone();
                }
            }
        }
    }

    /// Image for steps that declare none: the workflow's default, then the global one
    pub fn image_for(&self, workflow: &Workflow) -> String {
        workflow
            .spec
            .defaults
            .as_ref()
            .map(|defaults| defaults.image.as_str())
            .filter(|image| !image.is_empty())
            .unwrap_or(self.default_image.as_str())
            .to_string()
    }
}

/// Copies entries of `from` whose key is absent from `into`
pub fn merge_absent(into: &mut BTreeMap<String, String>, from: &BTreeMap<String, String>) {
    for (key, value) in from {
        into.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

fn parse_workflows_dir(defaults: &mut PipelineDefaults, value: &str) -> Result<(), ConfigError> {
    if Path::new(value).is_absolute() {
        return Err(ConfigError::invalid(
            "workflows-dir",
            "expected a relative path, but got an absolute one",
        ));
    }
    defaults.workflows_dir = value.to_string();
    Ok(())
}

fn parse_default_image(defaults: &mut PipelineDefaults, value: &str) -> Result<(), ConfigError> {
    defaults.default_image = value.trim().to_string();
    Ok(())
}

fn parse_webhook(defaults: &mut PipelineDefaults, value: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(value.trim())
        .map_err(|e| ConfigError::invalid("webhook", format!("invalid webhook URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(ConfigError::invalid(
            "webhook",
            "webhook URL must be an absolute http(s) URL",
        ));
    }

    defaults.webhook = Some(value.trim().to_string());
    Ok(())
}

fn parse_labels(defaults: &mut PipelineDefaults, value: &str) -> Result<(), ConfigError> {
    defaults.labels = parse_string_map("labels", value)?;
    Ok(())
}

fn parse_annotations(defaults: &mut PipelineDefaults, value: &str) -> Result<(), ConfigError> {
    defaults.annotations = parse_string_map("annotations", value)?;
    Ok(())
}

fn parse_string_map(key: &str, value: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    serde_yaml::from_str::<Option<BTreeMap<String, String>>>(value)
        .map(Option::unwrap_or_default)
        .map_err(|e| ConfigError::invalid(key, e.to_string()))
}
