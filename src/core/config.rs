//! Configuration: pipeline files, coordinator defaults, command tools

use crate::core::{tool::InputSchema, Pipeline};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

impl Pipeline {
    /// Load a pipeline definition from a `.yaml`, `.yml` or `.json` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
        .with_context(|| format!("Failed to parse pipeline file {}", path.display()))
    }

    /// Parse a pipeline definition from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a pipeline definition from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Coordinator-wide defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Retries for steps that don't set `retries`
    pub default_retries: u32,

    /// Per-attempt timeout for steps that don't set `timeout`
    pub default_timeout_ms: u64,

    /// First backoff delay; attempt n waits `base * 2^n`
    pub retry_base_delay_ms: u64,

    /// Check resolved inputs against the tool's declared schema before invoking
    pub enforce_input_schema: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_retries: 3,
            default_timeout_ms: 30_000,
            retry_base_delay_ms: 1_000,
            enforce_input_schema: false,
        }
    }
}

impl CoordinatorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn with_default_retries(mut self, retries: u32) -> Self {
        self.default_retries = retries;
        self
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = delay_ms;
        self
    }

    pub fn with_input_schema_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_input_schema = enforce;
        self
    }

    /// Delay before the retry that follows 0-based attempt `attempt`.
    ///
    /// Uncapped and without jitter; saturates instead of overflowing.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        Duration::from_millis(self.retry_base_delay_ms).saturating_mul(factor)
    }
}

/// External commands exposed as tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub tools: Vec<CommandToolConfig>,
}

/// One command tool entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandToolConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Program to execute
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub input_schema: InputSchema,
}

impl ToolsConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tools file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ToolsConfig = serde_yaml::from_str(yaml)?;

        let mut seen = std::collections::HashSet::new();
        for tool in &config.tools {
            if !seen.insert(&tool.name) {
                anyhow::bail!("Duplicate tool name: {}", tool.name);
            }
        }

        Ok(config)
    }
}
