//! JSONPath queries against event payloads
//!
//! Supports the subset of JSONPath used in `$(event {...})` expressions:
//! child fields (`.a`, `['a']`), recursive descent (`..a`), indexes (`[0]`,
//! `[-1]`) and wildcards (`.*`, `[*]`). Missing keys never fail a query, they
//! just contribute no result.
//!
//! Rendering rules:
//! - a single string result is printed as-is
//! - a single string under a timestamp field (`timestamp`, `*_at`) holding an
//!   RFC 3339 date is printed as a Unix epoch
//! - any other single result is printed as compact JSON (`null` included)
//! - several or zero results are printed as a JSON array

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum JsonPathError {
    #[error("unclosed expression in template {0:?}")]
    Unclosed(String),

    #[error("templates mixing several expressions or text aren't supported")]
    MultipleSegments,

    #[error("invalid JSON path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("failed to render JSON path result: {0}")]
    Render(String),
}

/// Evaluates `template` against `payload` and renders the result as text
///
/// The template is either plain text, returned unchanged, or exactly one
/// `{...}` expression.
pub fn query(payload: &Value, template: &str) -> Result<String, JsonPathError> {
    let mut nodes = split_template(template)?;

    if nodes.len() > 1 {
        return Err(JsonPathError::MultipleSegments);
    }

    match nodes.pop() {
        None => Ok(String::new()),
        Some(Node::Text(text)) => Ok(text),
        Some(Node::Expression(expression)) => {
            let segments = parse_path(&expression)?;
            render(&evaluate(payload, &segments))
        }
    }
}

// =============================================================================
// Template
// =============================================================================

#[derive(Debug, PartialEq)]
enum Node {
    Text(String),
    Expression(String),
}

fn split_template(template: &str) -> Result<Vec<Node>, JsonPathError> {
    let mut nodes = Vec::new();
    let mut rest = template;

    while !rest.is_empty() {
        match rest.find('{') {
            Some(0) => {
                let end = rest
                    .find('}')
                    .ok_or_else(|| JsonPathError::Unclosed(template.to_string()))?;
                nodes.push(Node::Expression(rest[1..end].trim().to_string()));
                rest = &rest[end + 1..];
            }
            Some(start) => {
                nodes.push(Node::Text(rest[..start].to_string()));
                rest = &rest[start..];
            }
            None => {
                nodes.push(Node::Text(rest.to_string()));
                rest = "";
            }
        }
    }

    Ok(nodes)
}

// =============================================================================
// Path
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Recursive(String),
    Index(i64),
    Wildcard,
}

fn parse_path(expression: &str) -> Result<Vec<Segment>, JsonPathError> {
    let invalid = |reason: &str| JsonPathError::InvalidPath {
        path: expression.to_string(),
        reason: reason.to_string(),
    };

    let mut rest = expression.strip_prefix('$').unwrap_or(expression);
    let mut segments = Vec::new();

    if rest == "." {
        return Ok(segments);
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("..") {
            let (name, remaining) = take_name(after);
            if name.is_empty() {
                return Err(invalid("recursive descent without a field name"));
            }
            segments.push(Segment::Recursive(name.to_string()));
            rest = remaining;
        } else if let Some(after) = rest.strip_prefix('.') {
            let (name, remaining) = take_name(after);
            match name {
                "" => return Err(invalid("empty field name")),
                "*" => segments.push(Segment::Wildcard),
                _ => segments.push(Segment::Field(name.to_string())),
            }
            rest = remaining;
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']').ok_or_else(|| invalid("unclosed bracket"))?;
            segments.push(parse_bracket(after[..end].trim()).ok_or_else(|| invalid("bad subscript"))?);
            rest = &after[end + 1..];
        } else {
            return Err(invalid("expected '.' or '['"));
        }
    }

    Ok(segments)
}

fn take_name(input: &str) -> (&str, &str) {
    let end = input.find(['.', '[']).unwrap_or(input.len());
    (&input[..end], &input[end..])
}

fn parse_bracket(subscript: &str) -> Option<Segment> {
    if subscript == "*" {
        return Some(Segment::Wildcard);
    }

    for quote in ['\'', '"'] {
        if let Some(name) = subscript
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return Some(Segment::Field(name.to_string()));
        }
    }

    subscript.parse().ok().map(Segment::Index)
}

// =============================================================================
// Evaluation
// =============================================================================

/// A value found by a query, with the field name it was found under
#[derive(Debug, Clone, Copy)]
struct Match<'a> {
    key: Option<&'a str>,
    value: &'a Value,
}

fn evaluate<'a>(root: &'a Value, segments: &[Segment]) -> Vec<Match<'a>> {
    let mut current = vec![Match {
        key: None,
        value: root,
    }];

    for segment in segments {
        current = current
            .into_iter()
            .flat_map(|found| step(found, segment))
            .collect();
    }

    current
}

fn step<'a>(found: Match<'a>, segment: &Segment) -> Vec<Match<'a>> {
    match segment {
        Segment::Field(name) => field(found.value, name).into_iter().collect(),
        Segment::Index(index) => {
            let Value::Array(items) = found.value else {
                return Vec::new();
            };
            let len = items.len() as i64;
            let position = if *index < 0 { len + index } else { *index };
            if (0..len).contains(&position) {
                vec![Match {
                    key: found.key,
                    value: &items[position as usize],
                }]
            } else {
                Vec::new()
            }
        }
        Segment::Wildcard => match found.value {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| Match {
                    key: Some(key),
                    value,
                })
                .collect(),
            Value::Array(items) => items
                .iter()
                .map(|value| Match {
                    key: found.key,
                    value,
                })
                .collect(),
            _ => Vec::new(),
        },
        Segment::Recursive(name) => {
            let mut descendants = Vec::new();
            collect_descendants(found.value, &mut descendants);
            descendants
                .into_iter()
                .filter_map(|value| field(value, name))
                .collect()
        }
    }
}

fn field<'a>(value: &'a Value, name: &str) -> Option<Match<'a>> {
    value.as_object().and_then(|map| {
        map.get_key_value(name).map(|(key, value)| Match {
            key: Some(key),
            value,
        })
    })
}

/// `value` and everything below it, depth first
fn collect_descendants<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(value);
    match value {
        Value::Object(map) => map.values().for_each(|v| collect_descendants(v, out)),
        Value::Array(items) => items.iter().for_each(|v| collect_descendants(v, out)),
        _ => {}
    }
}

// =============================================================================
// Rendering
// =============================================================================

fn render(results: &[Match<'_>]) -> Result<String, JsonPathError> {
    if let [single] = results {
        return match single.value {
            Value::String(text) => Ok(epoch(single.key, text).unwrap_or_else(|| text.clone())),
            other => to_json(other),
        };
    }

    let values: Vec<&Value> = results.iter().map(|found| found.value).collect();
    to_json(&values)
}

fn epoch(key: Option<&str>, text: &str) -> Option<String> {
    let key = key?;
    if key != "timestamp" && !key.ends_with("_at") {
        return None;
    }
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|date| date.timestamp().to_string())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, JsonPathError> {
    serde_json::to_string(value).map_err(|e| JsonPathError::Render(e.to_string()))
}
