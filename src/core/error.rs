//! Error types for tool handlers, step execution and conditions

use thiserror::Error;

/// Error returned by a tool handler
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("{0}")]
    Failed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        ToolError::Failed(message.into())
    }
}

/// Terminal failure of a step's attempt loop
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{0}")]
    Execution(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("Input validation failed: {0}")]
    InvalidInput(String),
}

impl StepError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StepError::Timeout { .. })
    }
}

impl From<ToolError> for StepError {
    fn from(err: ToolError) -> Self {
        StepError::Execution(err.to_string())
    }
}

/// Failure to parse or evaluate a condition expression
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("Parse error at {position}: {message}")]
    Parse { message: String, position: usize },

    #[error("Unknown identifier '{0}' (expected inputs, results or state)")]
    UnknownRoot(String),
}
