//! Core domain models
//!
//! This module defines pipelines, steps, tools, the per-run shared
//! context and the results a run produces.

pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod tool;

pub use condition::Condition;
pub use config::{CoordinatorConfig, ToolsConfig};
pub use context::{ContextMeta, ErrorRecord, SharedContext};
pub use error::{ConditionError, StepError, ToolError};
pub use pipeline::*;
pub use state::*;
pub use tool::*;
