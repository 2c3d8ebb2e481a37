//! Pipeline validation against a tool registry

use crate::core::{context::referenced_step, Condition, Pipeline, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Fixed cost units charged per step
pub const STEP_COST_UNITS: u64 = 500;

/// Steps beyond this count trigger a size warning
pub const LARGE_PIPELINE_STEPS: usize = 10;

/// Score ceiling when no risk level is declared
const HEURISTIC_RISK_CAP: u8 = 80;

/// A located validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// e.g. `steps[2].dependsOn[0]`
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Outcome of validating a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// True iff `errors` is empty
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    /// 0-100
    pub risk_score: u8,
    pub estimated_cost: u64,
}

/// Structural checks and risk/cost estimate
pub struct Validator<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn validate(&self, pipeline: &Pipeline) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_duplicate_ids(pipeline, &mut errors);
        self.check_tools(pipeline, &mut errors);
        if let Some(cycle) = find_cycle(pipeline) {
            errors.push(cycle);
        }
        self.check_dependencies(pipeline, &mut errors);

        self.check_conditions(pipeline, &mut warnings);
        self.check_references(pipeline, &mut warnings);
        self.check_outputs(pipeline, &mut warnings);

        if pipeline.steps.len() > LARGE_PIPELINE_STEPS {
            warnings.push(ValidationIssue::new(
                "steps",
                format!(
                    "Large pipeline ({} steps); consider splitting it",
                    pipeline.steps.len()
                ),
            ));
        }

        let result = ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
            risk_score: risk_score(pipeline),
            estimated_cost: pipeline.steps.len() as u64 * STEP_COST_UNITS,
        };

        debug!(
            "Validated pipeline {}: valid={}, {} errors, {} warnings",
            pipeline.id,
            result.valid,
            result.errors.len(),
            result.warnings.len()
        );

        result
    }

    fn check_duplicate_ids(&self, pipeline: &Pipeline, errors: &mut Vec<ValidationIssue>) {
        let mut seen = HashSet::new();
        for (i, step) in pipeline.steps.iter().enumerate() {
            if !seen.insert(step.id.as_str()) {
                errors.push(ValidationIssue::new(
                    format!("steps[{}].id", i),
                    format!("Duplicate step ID: {}", step.id),
                ));
            }
        }
    }

    fn check_tools(&self, pipeline: &Pipeline, errors: &mut Vec<ValidationIssue>) {
        for (i, step) in pipeline.steps.iter().enumerate() {
            if !self.registry.contains(&step.tool) {
                errors.push(ValidationIssue::new(
                    format!("steps[{}].tool", i),
                    format!("Unknown tool: {}", step.tool),
                ));
            }
        }
    }

    fn check_dependencies(&self, pipeline: &Pipeline, errors: &mut Vec<ValidationIssue>) {
        let ids: HashSet<&str> = pipeline.steps.iter().map(|s| s.id.as_str()).collect();
        for (i, step) in pipeline.steps.iter().enumerate() {
            for (j, dep) in step.depends_on.iter().enumerate() {
                if !ids.contains(dep.as_str()) {
                    errors.push(ValidationIssue::new(
                        format!("steps[{}].dependsOn[{}]", i, j),
                        format!("Step '{}' depends on non-existent step '{}'", step.id, dep),
                    ));
                }
            }
        }
    }

    fn check_conditions(&self, pipeline: &Pipeline, warnings: &mut Vec<ValidationIssue>) {
        for (i, step) in pipeline.steps.iter().enumerate() {
            if let Some(source) = &step.condition {
                if let Err(e) = Condition::parse(source) {
                    warnings.push(ValidationIssue::new(
                        format!("steps[{}].condition", i),
                        format!("Condition will not evaluate, step will be skipped: {}", e),
                    ));
                }
            }
        }
    }

    fn check_references(&self, pipeline: &Pipeline, warnings: &mut Vec<ValidationIssue>) {
        for (i, step) in pipeline.steps.iter().enumerate() {
            let upstream = pipeline.transitive_dependencies(&step.id);
            for (name, value) in &step.inputs {
                let Some(target) = referenced_step(value) else {
                    continue;
                };
                if !upstream.contains(target) {
                    warnings.push(ValidationIssue::new(
                        format!("steps[{}].inputs.{}", i, name),
                        format!(
                            "References results of '{}' which is not a dependency; it may be unresolved",
                            target
                        ),
                    ));
                }
            }
        }
    }

    fn check_outputs(&self, pipeline: &Pipeline, warnings: &mut Vec<ValidationIssue>) {
        for (i, path) in pipeline.outputs.iter().flatten().enumerate() {
            let root = path.split('.').next().unwrap_or_default();
            if !matches!(root, "inputs" | "results" | "state") {
                warnings.push(ValidationIssue::new(
                    format!("outputs[{}]", i),
                    format!("Output path '{}' does not start with inputs, results or state", path),
                ));
            }
        }
    }
}

/// Depth-first search for a cycle in the `depends_on` graph.
///
/// Reports the first step found on the current DFS stack and stops.
fn find_cycle(pipeline: &Pipeline) -> Option<ValidationIssue> {
    let index: HashMap<&str, usize> = pipeline
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();

    for step in &pipeline.steps {
        if let Some(issue) = visit(&step.id, pipeline, &index, &mut visiting, &mut visited) {
            return Some(issue);
        }
    }

    None
}

fn visit<'p>(
    step_id: &'p str,
    pipeline: &'p Pipeline,
    index: &HashMap<&str, usize>,
    visiting: &mut HashSet<&'p str>,
    visited: &mut HashSet<&'p str>,
) -> Option<ValidationIssue> {
    if visiting.contains(step_id) {
        let path = index
            .get(step_id)
            .map(|i| format!("steps[{}].dependsOn", i))
            .unwrap_or_else(|| "steps".to_string());
        return Some(ValidationIssue::new(
            path,
            format!("Circular dependency detected involving step '{}'", step_id),
        ));
    }
    if visited.contains(step_id) {
        return None;
    }

    // Dangling references are reported separately
    let &i = index.get(step_id)?;
    visiting.insert(step_id);
    for dep in &pipeline.steps[i].depends_on {
        if let Some(issue) = visit(dep, pipeline, index, visiting, visited) {
            return Some(issue);
        }
    }
    visiting.remove(step_id);
    visited.insert(step_id);

    None
}

fn risk_score(pipeline: &Pipeline) -> u8 {
    match pipeline.risk_level() {
        Some(level) => level.score(),
        None => {
            let heuristic = pipeline.steps.len().saturating_mul(10);
            heuristic.min(HEURISTIC_RISK_CAP as usize) as u8
        }
    }
}
