//! Pipeline domain model

use crate::core::tool::InputSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A pipeline definition
///
/// Immutable once constructed; the same value may be validated and
/// executed any number of times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    /// Pipeline identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Steps in declaration order
    pub steps: Vec<Step>,

    /// Declared run parameters (documentation only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<InputSchema>,

    /// Dotted paths that make up the final output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PipelineMetadata>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// A single tool invocation in a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Registered tool name
    pub tool: String,

    /// Literal values or `${path}` references
    #[serde(default)]
    pub inputs: Map<String, Value>,

    /// Step IDs that must succeed before this step runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Boolean expression over `inputs`, `results` and `state`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Retries after the first attempt (overrides the coordinator default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    /// Per-attempt timeout in milliseconds (overrides the coordinator default)
    #[serde(default, rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Descriptive pipeline metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,

    /// Free-form duration hint, e.g. "30s"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
}

/// Declared risk of running a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Fixed score on the 0-100 scale
    pub fn score(self) -> u8 {
        match self {
            RiskLevel::Safe => 10,
            RiskLevel::Low => 25,
            RiskLevel::Medium => 50,
            RiskLevel::High => 75,
            RiskLevel::Critical => 95,
        }
    }
}

impl Pipeline {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: default_version(),
            steps: Vec::new(),
            inputs: None,
            outputs: None,
            metadata: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = Some(outputs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_metadata(mut self, metadata: PipelineMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Position of a step in declaration order
    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.metadata.as_ref().and_then(|m| m.risk_level)
    }

    /// All steps reachable through `depends_on` from `step_id`, excluding itself.
    ///
    /// Terminates on cyclic graphs.
    pub fn transitive_dependencies(&self, step_id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = self
            .step(step_id)
            .map(|s| s.depends_on.iter().map(String::as_str).collect())
            .unwrap_or_default();

        while let Some(id) = stack.pop() {
            if id == step_id || !seen.insert(id.to_string()) {
                continue;
            }
            if let Some(step) = self.step(id) {
                stack.extend(step.depends_on.iter().map(String::as_str));
            }
        }

        seen
    }
}

impl Step {
    pub fn new(id: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            inputs: Map::new(),
            depends_on: Vec::new(),
            condition: None,
            retries: None,
            timeout_ms: None,
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Check if all dependencies are in the completed set
    pub fn dependencies_met(&self, completed: &HashSet<&str>) -> bool {
        self.depends_on.iter().all(|dep| completed.contains(dep.as_str()))
    }
}
