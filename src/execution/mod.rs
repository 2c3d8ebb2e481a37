//! Pipeline validation and execution

pub mod engine;
pub mod events;
pub mod executor;
pub mod generator;
pub mod scheduler;
pub mod validator;

pub use engine::ExecutionEngine;
pub use events::{EventBus, EventHandler, ExecutionEvent};
pub use executor::{ExecutionResult, StepExecutor};
pub use generator::generate_from_intent;
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
pub use validator::{ValidationIssue, ValidationResult, Validator};
