//! External command tool - runs a program as a subprocess

use crate::core::{config::CommandToolConfig, ToolContext, ToolDefinition, ToolError, ToolHandler};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Tool backed by an external program
///
/// Resolved inputs are written to the program's stdin as a JSON object.
/// Stdout is parsed as JSON when possible and otherwise returned as a
/// trimmed string. A non-zero exit status is a failure.
#[derive(Debug, Clone)]
pub struct CommandTool {
    /// Program to execute
    command: String,

    args: Vec<String>,
}

impl CommandTool {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Build the tool and its definition from a tools-file entry
    pub fn from_config(config: &CommandToolConfig) -> (ToolDefinition, Self) {
        let definition = ToolDefinition::new(config.name.clone(), config.description.clone())
            .with_schema(config.input_schema.clone());
        (definition, Self::new(config.command.clone(), config.args.clone()))
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn error(&self, message: impl Into<String>) -> ToolError {
        ToolError::Command {
            command: self.command.clone(),
            message: message.into(),
        }
    }

    /// Run the program once with `inputs` on stdin
    pub async fn run(&self, inputs: &Map<String, Value>) -> Result<Value, ToolError> {
        let payload = serde_json::to_vec(inputs)
            .map_err(|e| self.error(format!("Failed to encode inputs: {}", e)))?;

        debug!("Spawning {} with {} bytes of input", self.command, payload.len());

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.error(format!("Failed to spawn: {}", e)))?;

        // Feed stdin while draining stdout and stderr, so a program that
        // writes before it reads cannot fill a pipe and stall both sides
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A program that exits without reading stdin is not an error
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!("{} closed stdin early: {}", self.command, e);
                }
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| self.error(format!("Failed to wait for process: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", self.command, exit_code, stderr.trim());
            return Err(self.error(format!("exited with code {}: {}", exit_code, stderr.trim())));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| self.error(format!("Failed to decode output: {}", e)))?;

        debug!("{} returned {} bytes of output", self.command, stdout.len());

        let trimmed = stdout.trim();
        Ok(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
    }
}

#[async_trait]
impl ToolHandler for CommandTool {
    async fn call(&self, inputs: Map<String, Value>, _ctx: ToolContext) -> Result<Value, ToolError> {
        self.run(&inputs).await
    }
}
