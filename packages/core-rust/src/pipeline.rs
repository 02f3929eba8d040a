//! Pipeline request types and step-level condition/transform evaluation.
//!
//! Conditions and transforms are data, not code: a request picks one of a
//! fixed set of kinds, or names a function the host registered in
//! [`StepFunctions`]. Both see only the previous step's result.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::StructuredError;
use crate::path::resolve_opt;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// A chain of steps submitted as one request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<ExecutionContext>,
}

/// One operation invocation within a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub tool_name: String,
    #[serde(default = "empty_params")]
    pub params: Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub condition: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transform: Option<Transform>,
}

fn empty_params() -> Value {
    Value::Object(Map::new())
}

impl Step {
    pub fn new(tool_name: impl Into<String>, params: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            params,
            condition: None,
            transform: None,
        }
    }

    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Per-step result of a completed run. Skipped steps keep their slot so the
/// output index always equals the step index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum StepOutcome {
    Completed {
        #[serde(rename = "toolName")]
        tool_name: String,
        result: Value,
    },
    Skipped {
        #[serde(rename = "toolName")]
        tool_name: String,
    },
}

impl StepOutcome {
    #[must_use]
    pub fn tool_name(&self) -> &str {
        match self {
            StepOutcome::Completed { tool_name, .. } | StepOutcome::Skipped { tool_name } => {
                tool_name
            }
        }
    }

    /// The operation result, or `None` for a skipped step.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match self {
            StepOutcome::Completed { result, .. } => Some(result),
            StepOutcome::Skipped { .. } => None,
        }
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped { .. })
    }
}

// ---------------------------------------------------------------------------
// Host-registered functions
// ---------------------------------------------------------------------------

pub type ConditionFn = dyn Fn(Option<&Value>) -> bool + Send + Sync;
pub type TransformFn = dyn Fn(Option<&Value>) -> Result<Value, String> + Send + Sync;

/// Named conditions and transforms a host makes available to pipeline requests.
#[derive(Clone, Default)]
pub struct StepFunctions {
    conditions: HashMap<String, Arc<ConditionFn>>,
    transforms: HashMap<String, Arc<TransformFn>>,
}

impl StepFunctions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_condition<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        self.conditions.insert(name.into(), Arc::new(f));
    }

    pub fn register_transform<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Option<&Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(f));
    }

    fn condition(&self, name: &str) -> Option<&ConditionFn> {
        self.conditions.get(name).map(|f| &**f)
    }

    fn transform(&self, name: &str) -> Option<&TransformFn> {
        self.transforms.get(name).map(|f| &**f)
    }
}

impl fmt::Debug for StepFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut conditions: Vec<_> = self.conditions.keys().collect();
        let mut transforms: Vec<_> = self.transforms.keys().collect();
        conditions.sort();
        transforms.sort();
        f.debug_struct("StepFunctions")
            .field("conditions", &conditions)
            .field("transforms", &transforms)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// One-shot predicate over the previous step's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Condition {
    /// The path resolves to a non-null value.
    Exists {
        #[serde(default)]
        path: String,
    },
    Equals {
        #[serde(default)]
        path: String,
        value: Value,
    },
    NotEquals {
        #[serde(default)]
        path: String,
        value: Value,
    },
    /// Array, object or string length at `path` is strictly greater than `length`.
    LengthGreaterThan {
        #[serde(default)]
        path: String,
        length: usize,
    },
    /// The string at `path` matches the regular expression `pattern`.
    Matches {
        #[serde(default)]
        path: String,
        pattern: String,
    },
    Not {
        condition: Box<Condition>,
    },
    /// True when every nested condition holds (true for an empty list).
    All {
        conditions: Vec<Condition>,
    },
    /// True when at least one nested condition holds (false for an empty list).
    Any {
        conditions: Vec<Condition>,
    },
    Named {
        name: String,
    },
}

impl Condition {
    /// Evaluates the condition against `previous`.
    ///
    /// Unresolvable paths make the comparison false rather than failing.
    ///
    /// # Errors
    ///
    /// Returns a `VALIDATION_ERROR` for an invalid regex or an unregistered name.
    pub fn evaluate(
        &self,
        previous: Option<&Value>,
        functions: &StepFunctions,
    ) -> Result<bool, StructuredError> {
        let outcome = match self {
            Condition::Exists { path } => {
                resolve_opt(previous, path).is_some_and(|v| !v.is_null())
            }
            Condition::Equals { path, value } => resolve_opt(previous, path) == Some(value),
            Condition::NotEquals { path, value } => resolve_opt(previous, path) != Some(value),
            Condition::LengthGreaterThan { path, length } => {
                resolve_opt(previous, path)
                    .and_then(value_len)
                    .is_some_and(|len| len > *length)
            }
            Condition::Matches { path, pattern } => {
                let re = Regex::new(pattern).map_err(|e| {
                    StructuredError::validation(format!("invalid condition pattern: {e}"))
                })?;
                resolve_opt(previous, path)
                    .and_then(Value::as_str)
                    .is_some_and(|s| re.is_match(s))
            }
            Condition::Not { condition } => !condition.evaluate(previous, functions)?,
            Condition::All { conditions } => {
                for c in conditions {
                    if !c.evaluate(previous, functions)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Any { conditions } => {
                for c in conditions {
                    if c.evaluate(previous, functions)? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::Named { name } => {
                let f = functions.condition(name).ok_or_else(|| {
                    StructuredError::validation(format!("unknown condition: {name}"))
                })?;
                f(previous)
            }
        };
        Ok(outcome)
    }
}

fn value_len(value: &Value) -> Option<usize> {
    match value {
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        Value::String(s) => Some(s.chars().count()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Computes a step's call parameters from the previous step's result.
///
/// The output replaces `Step::params` outright; it is never merged into them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Transform {
    /// JSON template with `{{path}}` placeholders.
    Template { template: Value },
    /// The value found at `path`.
    Select {
        #[serde(default)]
        path: String,
    },
    Named { name: String },
}

impl Transform {
    /// Produces the call parameters for a step.
    ///
    /// # Errors
    ///
    /// `TRANSFORM_ERROR` when a referenced path does not resolve (including when
    /// there is no previous result) or a named transform fails;
    /// `VALIDATION_ERROR` for an unregistered name.
    pub fn apply(
        &self,
        previous: Option<&Value>,
        functions: &StepFunctions,
    ) -> Result<Value, StructuredError> {
        match self {
            Transform::Template { template } => render(template, previous),
            Transform::Select { path } => lookup(previous, path).cloned(),
            Transform::Named { name } => {
                let f = functions.transform(name).ok_or_else(|| {
                    StructuredError::validation(format!("unknown transform: {name}"))
                })?;
                f(previous).map_err(|e| {
                    StructuredError::transform(format!("transform '{name}' failed: {e}"))
                })
            }
        }
    }
}

fn lookup<'a>(previous: Option<&'a Value>, path: &str) -> Result<&'a Value, StructuredError> {
    let Some(root) = previous else {
        return Err(StructuredError::transform(format!(
            "path '{path}' referenced but there is no previous result"
        )));
    };
    crate::path::resolve(root, path).ok_or_else(|| {
        StructuredError::transform(format!("path '{path}' not found in previous result"))
            .with_details(serde_json::json!({ "path": path }))
    })
}

fn render(template: &Value, previous: Option<&Value>) -> Result<Value, StructuredError> {
    match template {
        Value::String(s) => render_string(s, previous),
        Value::Array(items) => items
            .iter()
            .map(|item| render(item, previous))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), render(value, previous)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn render_string(s: &str, previous: Option<&Value>) -> Result<Value, StructuredError> {
    // A string that is exactly one placeholder keeps the resolved value's type.
    if let Some(inner) = s.strip_prefix("{{").and_then(|r| r.strip_suffix("}}")) {
        if !inner.contains("{{") && !inner.contains("}}") {
            return lookup(previous, inner.trim()).cloned();
        }
    }

    if !s.contains("{{") {
        return Ok(Value::String(s.to_string()));
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);
        let path = rest[start + 2..start + 2 + len].trim();
        match lookup(previous, path)? {
            Value::String(text) => out.push_str(text),
            other => out.push_str(&other.to_string()),
        }
        rest = &rest[start + 2 + len + 2..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorCode;

    fn none() -> StepFunctions {
        StepFunctions::new()
    }

    #[test]
    fn step_deserializes_with_defaults() {
        let step: Step = serde_json::from_value(json!({ "toolName": "list_issues" })).unwrap();
        assert_eq!(step.tool_name, "list_issues");
        assert_eq!(step.params, json!({}));
        assert!(step.condition.is_none());
        assert!(step.transform.is_none());
    }

    #[test]
    fn step_deserializes_tagged_condition_and_transform() {
        let step: Step = serde_json::from_value(json!({
            "toolName": "create_issue",
            "condition": { "kind": "lengthGreaterThan", "path": "nodes", "length": 0 },
            "transform": { "kind": "template", "template": { "teamId": "{{nodes.0.teamId}}" } },
        }))
        .unwrap();
        assert_eq!(
            step.condition,
            Some(Condition::LengthGreaterThan { path: "nodes".into(), length: 0 })
        );
        assert!(matches!(step.transform, Some(Transform::Template { .. })));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let done = StepOutcome::Completed { tool_name: "get_viewer".into(), result: json!({}) };
        let skipped = StepOutcome::Skipped { tool_name: "create_issue".into() };
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            json!({ "status": "completed", "toolName": "get_viewer", "result": {} })
        );
        assert_eq!(
            serde_json::to_value(&skipped).unwrap(),
            json!({ "status": "skipped", "toolName": "create_issue" })
        );
    }

    #[test]
    fn length_condition_on_empty_sequence_is_false() {
        let c = Condition::LengthGreaterThan { path: String::new(), length: 0 };
        assert!(!c.evaluate(Some(&json!([])), &none()).unwrap());
        assert!(c.evaluate(Some(&json!([1])), &none()).unwrap());
        assert!(!c.evaluate(None, &none()).unwrap());
    }

    #[test]
    fn equality_conditions() {
        let prev = json!({ "state": { "name": "Done" } });
        let eq = Condition::Equals { path: "state.name".into(), value: json!("Done") };
        let ne = Condition::NotEquals { path: "state.type".into(), value: json!("x") };
        assert!(eq.evaluate(Some(&prev), &none()).unwrap());
        assert!(ne.evaluate(Some(&prev), &none()).unwrap());
    }

    #[test]
    fn exists_treats_null_as_absent() {
        let prev = json!({ "assignee": null, "team": { "id": "t1" } });
        let assignee = Condition::Exists { path: "assignee".into() };
        let team = Condition::Exists { path: "team.id".into() };
        assert!(!assignee.evaluate(Some(&prev), &none()).unwrap());
        assert!(team.evaluate(Some(&prev), &none()).unwrap());
    }

    #[test]
    fn combinators() {
        let prev = json!({ "n": [1, 2] });
        let yes = Condition::Exists { path: "n".into() };
        let no = Condition::Exists { path: "m".into() };
        let all = Condition::All { conditions: vec![yes.clone(), no.clone()] };
        let any = Condition::Any { conditions: vec![no.clone(), yes] };
        let not = Condition::Not { condition: Box::new(no) };
        assert!(!all.evaluate(Some(&prev), &none()).unwrap());
        assert!(any.evaluate(Some(&prev), &none()).unwrap());
        assert!(not.evaluate(Some(&prev), &none()).unwrap());
        assert!(Condition::All { conditions: vec![] }.evaluate(None, &none()).unwrap());
        assert!(!Condition::Any { conditions: vec![] }.evaluate(None, &none()).unwrap());
    }

    #[test]
    fn matches_uses_regex_and_rejects_bad_patterns() {
        let prev = json!({ "identifier": "ENG-42" });
        let good = Condition::Matches { path: "identifier".into(), pattern: r"^ENG-\d+$".into() };
        assert!(good.evaluate(Some(&prev), &none()).unwrap());

        let bad = Condition::Matches { path: "identifier".into(), pattern: "(".into() };
        let err = bad.evaluate(Some(&prev), &none()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn named_condition_and_unknown_name() {
        let mut functions = StepFunctions::new();
        functions.register_condition("has_nodes", |r| {
            r.and_then(|v| v.get("nodes")).and_then(Value::as_array).is_some_and(|a| !a.is_empty())
        });
        let named = Condition::Named { name: "has_nodes".into() };
        assert!(named.evaluate(Some(&json!({ "nodes": [1] })), &functions).unwrap());

        let unknown = Condition::Named { name: "nope".into() };
        assert_eq!(
            unknown.evaluate(None, &functions).unwrap_err().code,
            ErrorCode::ValidationError
        );
    }

    #[test]
    fn template_preserves_types_and_interpolates_text() {
        let prev = json!({ "nodes": [{ "id": "i1", "teamId": "t1", "priority": 2 }] });
        let t = Transform::Template {
            template: json!({
                "title": "Follow-up to {{nodes.0.id}}",
                "teamId": "{{ nodes.0.teamId }}",
                "priority": "{{nodes.0.priority}}",
                "labelIds": ["fixed"],
                "estimate": 3,
            }),
        };
        let out = t.apply(Some(&prev), &none()).unwrap();
        assert_eq!(
            out,
            json!({
                "title": "Follow-up to i1",
                "teamId": "t1",
                "priority": 2,
                "labelIds": ["fixed"],
                "estimate": 3,
            })
        );
    }

    #[test]
    fn template_without_placeholders_needs_no_previous_result() {
        let t = Transform::Template { template: json!({ "first": 5 }) };
        assert_eq!(t.apply(None, &none()).unwrap(), json!({ "first": 5 }));
    }

    #[test]
    fn template_missing_path_is_transform_error() {
        let t = Transform::Template { template: json!({ "teamId": "{{nodes.0.teamId}}" }) };
        let err = t.apply(Some(&json!({ "nodes": [] })), &none()).unwrap_err();
        assert_eq!(err.code, ErrorCode::TransformError);
        assert!(!err.retryable);

        let err = t.apply(None, &none()).unwrap_err();
        assert_eq!(err.code, ErrorCode::TransformError);
    }

    #[test]
    fn select_returns_sub_value() {
        let prev = json!({ "issue": { "id": "i9" } });
        let t = Transform::Select { path: "issue".into() };
        assert_eq!(t.apply(Some(&prev), &none()).unwrap(), json!({ "id": "i9" }));
    }

    #[test]
    fn named_transform_errors_become_transform_errors() {
        let mut functions = StepFunctions::new();
        functions.register_transform("boom", |_| Err("kaput".to_string()));
        let err = Transform::Named { name: "boom".into() }
            .apply(Some(&json!({})), &functions)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TransformError);
        assert!(err.message.contains("kaput"));
    }
}
