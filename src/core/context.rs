//! Shared context - the mutable state threaded through one pipeline run

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Execution context for a pipeline run
///
/// Owned by exactly one `execute` call. `results` only grows: each step id
/// is written at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedContext {
    /// Caller-supplied run parameters
    pub inputs: Map<String, Value>,

    /// Outputs of successful steps (step_id -> output)
    pub results: Map<String, Value>,

    /// Free-form scratch space
    pub state: Map<String, Value>,

    pub meta: ContextMeta,
}

/// Run bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMeta {
    pub started_at: DateTime<Utc>,

    /// The step being processed (if any)
    pub current_step: Option<String>,

    /// Successful steps in completion order
    pub completed_steps: Vec<String>,

    /// Step failures in occurrence order
    pub errors: Vec<ErrorRecord>,
}

/// A step failure logged during the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub step: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl SharedContext {
    /// Create a fresh context for a run
    pub fn new(inputs: Map<String, Value>) -> Self {
        Self {
            inputs,
            results: Map::new(),
            state: Map::new(),
            meta: ContextMeta {
                started_at: Utc::now(),
                current_step: None,
                completed_steps: Vec::new(),
                errors: Vec::new(),
            },
        }
    }

    /// Record a successful step. Returns false if the step already has a result.
    pub fn record_success(&mut self, step_id: &str, output: Value) -> bool {
        if self.results.contains_key(step_id) {
            return false;
        }
        self.results.insert(step_id.to_string(), output);
        self.meta.completed_steps.push(step_id.to_string());
        true
    }

    /// Append to the error log
    pub fn record_error(&mut self, step_id: &str, error: impl Into<String>) {
        self.meta.errors.push(ErrorRecord {
            step: step_id.to_string(),
            error: error.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn is_completed(&self, step_id: &str) -> bool {
        self.meta.completed_steps.iter().any(|s| s == step_id)
    }

    /// Walk a dotted path such as `results.step1.value`.
    ///
    /// The first segment selects `inputs`, `results` or `state`. Returns
    /// `None` when any segment fails to resolve.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let segments: Vec<&str> = path.trim().split('.').collect();
        self.resolve_segments(&segments)
    }

    /// Walk a path that is already split into segments.
    ///
    /// Segments are taken verbatim, so a key may itself contain a `.`.
    pub fn resolve_segments<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Value> {
        let (root, rest) = segments.split_first()?;
        let root = match root.as_ref() {
            "inputs" => &self.inputs,
            "results" => &self.results,
            "state" => &self.state,
            _ => return None,
        };

        let (first, rest) = rest.split_first()?;
        let mut current = root.get(first.as_ref())?;
        for segment in rest {
            current = walk(current, segment.as_ref())?;
        }
        Some(current)
    }

    /// Substitute a `${path}` reference; any other value passes through.
    pub fn resolve_value(&self, value: &Value) -> Value {
        match value.as_str().and_then(template_path) {
            Some(path) => self.resolve(path).cloned().unwrap_or(Value::Null),
            None => value.clone(),
        }
    }

    /// Resolve every declared input of a step
    pub fn resolve_inputs(&self, inputs: &Map<String, Value>) -> Map<String, Value> {
        inputs
            .iter()
            .map(|(name, value)| (name.clone(), self.resolve_value(value)))
            .collect()
    }

    /// Build the final output of a run.
    ///
    /// Without declared outputs this is the whole `results` map; otherwise a
    /// map from each declared path to its resolved value (null if unresolved).
    pub fn extract_output(&self, outputs: Option<&[String]>) -> Value {
        match outputs {
            None => Value::Object(self.results.clone()),
            Some(paths) => Value::Object(
                paths
                    .iter()
                    .map(|path| (path.clone(), self.resolve(path).cloned().unwrap_or(Value::Null)))
                    .collect(),
            ),
        }
    }
}

fn walk<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn template_regex() -> &'static Regex {
    static TEMPLATE: OnceLock<Regex> = OnceLock::new();
    TEMPLATE.get_or_init(|| {
        Regex::new(r"^\$\{\s*([A-Za-z_][\w\-]*(?:\.[^.}\s]+)*)\s*\}$").expect("valid template regex")
    })
}

/// Extract the path of a string of the exact form `${dotted.path}`
pub fn template_path(s: &str) -> Option<&str> {
    template_regex()
        .captures(s)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The step id referenced by a `${results.<id>...}` template, if any
pub fn referenced_step(value: &Value) -> Option<&str> {
    let path = value.as_str().and_then(template_path)?;
    let mut segments = path.split('.');
    match segments.next() {
        Some("results") => segments.next(),
        _ => None,
    }
}
