//! ptc - programmatic tool calling
//!
//! Validates and executes DAG pipelines of tool invocations: a registry of
//! async tool handlers, structural validation with a risk and cost
//! estimate, and a sequential engine with condition gates, `${path}` input
//! templating, per-attempt timeouts and retry with exponential backoff.

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod templates;
pub mod tools;

// Re-export commonly used types
pub use core::{
    handler_fn, CoordinatorConfig, Pipeline, PipelineResult, PipelineStatus, SharedContext, Step,
    StepResult, StepStatus, ToolContext, ToolDefinition, ToolError, ToolHandler, ToolRegistry,
};
pub use execution::{ExecutionEngine, ExecutionEvent, ValidationResult};
pub use templates::TemplateLibrary;
