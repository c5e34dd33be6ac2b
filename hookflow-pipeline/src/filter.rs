//! Trigger criteria
//!
//! Decides whether an event may run a workflow. Criteria are evaluated in a
//! fixed order (events, repository, branches, paths) and evaluation stops at
//! the first one that rejects the event.

use globset::Glob;
use hookflow_core::domain::{Event, Workflow};

const WORKFLOW_ACCEPTED: &str = "Workflow accepted";

const FILTER_SUCCEEDED: &str = "filter succeeded";

const NO_CONFIGURED_BRANCHES: &str = "skipped because there are no configured branches";

const NO_CONFIGURED_PATHS: &str = "skipped because there are no configured paths";

/// Prefix of every rejection message
pub const REJECTION_PREAMBLE: &str =
    "Workflow was rejected because Github event doesn't satisfy filter criteria: ";

/// Outcome of evaluating a single criterion or the whole chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub accepted: bool,
    pub message: String,
}

impl Verdict {
    fn accept(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    fn reject(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// A single trigger criterion
pub type Criterion = fn(&Workflow, &Event) -> Verdict;

/// Criteria in evaluation order
pub const CRITERIA: [(&str, Criterion); 4] = [
    ("events", events),
    ("repository", repository),
    ("branches", branches),
    ("paths", paths),
];

/// Evaluates every criterion until one rejects the event
pub fn can_trigger(workflow: &Workflow, event: &Event) -> Verdict {
    for (name, criterion) in CRITERIA {
        let verdict = criterion(workflow, event);
        tracing::debug!(criterion = name, accepted = verdict.accepted, reason = %verdict.message);

        if !verdict.accepted {
            return Verdict::reject(format!("{}{}", REJECTION_PREAMBLE, verdict.message));
        }
    }

    Verdict::accept(WORKFLOW_ACCEPTED)
}

/// Accepts events whose name is among the workflow's trigger events
pub fn events(workflow: &Workflow, event: &Event) -> Verdict {
    if workflow.spec.events.iter().any(|name| *name == event.name) {
        return Verdict::accept(FILTER_SUCCEEDED);
    }

    Verdict::reject(format!(
        "{} event doesn't match filters {}",
        event.name,
        list(&workflow.spec.events)
    ))
}

/// Accepts events coming from the workflow's primary repository
pub fn repository(workflow: &Workflow, event: &Event) -> Verdict {
    let expected = workflow.spec.repository.to_string();
    if event.repository == expected {
        return Verdict::accept(FILTER_SUCCEEDED);
    }

    Verdict::reject(format!(
        "repository {} doesn't match workflow's repository {}",
        event.repository, expected
    ))
}

/// Accepts events whose branch matches one of the configured branch globs
pub fn branches(workflow: &Workflow, event: &Event) -> Verdict {
    let patterns = &workflow.spec.branches;
    if patterns.is_empty() {
        return Verdict::accept(NO_CONFIGURED_BRANCHES);
    }
    if !event.is_branch_event() {
        return unsupported(event);
    }

    match matches_any(patterns, std::slice::from_ref(&event.branch)) {
        Ok(true) => Verdict::accept(FILTER_SUCCEEDED),
        Ok(false) => Verdict::reject(format!(
            "branch {} doesn't match filters {}",
            event.branch,
            list(patterns)
        )),
        Err(message) => Verdict::reject(message),
    }
}

/// Accepts events changing at least one file matching the configured path globs
pub fn paths(workflow: &Workflow, event: &Event) -> Verdict {
    if !event.is_branch_event() {
        return unsupported(event);
    }
    let patterns = &workflow.spec.paths;
    if patterns.is_empty() {
        return Verdict::accept(NO_CONFIGURED_PATHS);
    }

    match matches_any(patterns, &event.changes) {
        Ok(true) => Verdict::accept(FILTER_SUCCEEDED),
        Ok(false) => Verdict::reject(format!(
            "modified files don't match filters {}",
            list(patterns)
        )),
        Err(message) => Verdict::reject(message),
    }
}

fn unsupported(event: &Event) -> Verdict {
    Verdict::accept(format!(
        "skipped because {} event isn't supported",
        event.name
    ))
}

/// Whether any candidate matches any pattern; a malformed pattern is an error
fn matches_any(patterns: &[String], candidates: &[String]) -> Result<bool, String> {
    for pattern in patterns {
        let matcher = Glob::new(pattern)
            .map_err(|e| e.to_string())?
            .compile_matcher();

        if candidates.iter().any(|candidate| matcher.is_match(candidate)) {
            return Ok(true);
        }
    }

    Ok(false)
}

fn list(values: &[String]) -> String {
    format!("[{}]", values.join(" "))
}
