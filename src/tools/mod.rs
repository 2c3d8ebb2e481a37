//! Built-in tools

pub mod command;

pub use command::CommandTool;

use crate::core::{ToolContext, ToolDefinition, ToolError, ToolHandler, ToolRegistry, ToolsConfig};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Returns its resolved inputs as an object
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTool;

impl EchoTool {
    pub const NAME: &'static str = "echo";

    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(Self::NAME, "Return the resolved inputs unchanged")
    }
}

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(&self, inputs: Map<String, Value>, _ctx: ToolContext) -> Result<Value, ToolError> {
        Ok(Value::Object(inputs))
    }
}

/// Registry holding the built-in tools
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool::definition(), Arc::new(EchoTool));
    registry
}

/// Register every command tool from a tools file.
///
/// Entries replace built-ins of the same name.
pub fn register_commands(registry: &mut ToolRegistry, config: &ToolsConfig) {
    for entry in &config.tools {
        let (definition, tool) = CommandTool::from_config(entry);
        tracing::debug!("Registering command tool {} -> {}", definition.name, tool.command());
        registry.register(definition, Arc::new(tool));
    }
}
