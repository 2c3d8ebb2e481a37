//! Step and pipeline results

use crate::core::context::SharedContext;
use crate::execution::validator::ValidationIssue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
    Skipped,
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// No step reported an error
    Success,
    /// Some steps succeeded, some failed
    Partial,
    /// No step succeeded, or validation failed
    Error,
}

impl PipelineStatus {
    /// Derive the overall status from step outcomes
    pub fn from_steps(steps: &[StepResult]) -> Self {
        let any_error = steps.iter().any(|s| s.status == StepStatus::Error);
        let any_success = steps.iter().any(|s| s.status == StepStatus::Success);

        if !any_error {
            PipelineStatus::Success
        } else if !any_success {
            PipelineStatus::Error
        } else {
            PipelineStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Success => "success",
            PipelineStatus::Partial => "partial",
            PipelineStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for PipelineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(PipelineStatus::Success),
            "partial" => Ok(PipelineStatus::Partial),
            "error" => Ok(PipelineStatus::Error),
            other => Err(format!("unknown pipeline status '{}'", other)),
        }
    }
}

/// Result of processing one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,

    pub status: StepStatus,

    /// Present iff status is success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Present iff status is error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Why the step was skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Handler invocations made (0 when skipped)
    pub attempts: u32,

    pub duration_ms: u64,

    pub timestamp: DateTime<Utc>,
}

impl StepResult {
    pub fn success(step_id: &str, output: Value, attempts: u32, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Success,
            output: Some(output),
            error: None,
            reason: None,
            attempts,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn error(step_id: &str, error: impl Into<String>, attempts: u32, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Error,
            output: None,
            error: Some(error.into()),
            reason: None,
            attempts,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn skipped(step_id: &str, reason: impl Into<String>) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Skipped,
            output: None,
            error: None,
            reason: Some(reason.into()),
            attempts: 0,
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }
}

/// Everything a caller learns about one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub run_id: Uuid,

    pub pipeline_id: String,

    pub status: PipelineStatus,

    /// Step results in execution order
    pub steps: Vec<StepResult>,

    /// All results, or the declared outputs
    pub output: Value,

    pub duration_ms: u64,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Terminal snapshot of the run's context
    pub context: SharedContext,

    /// Structural errors that prevented the run (empty when it ran)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<ValidationIssue>,
}

impl PipelineResult {
    pub fn step(&self, step_id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}
