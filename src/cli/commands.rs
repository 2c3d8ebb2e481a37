//! CLI command definitions

use crate::core::Pipeline;
use crate::templates::TemplateLibrary;
use anyhow::{anyhow, Result};
use clap::Args;
use serde_json::{Map, Value};

/// Where to load a pipeline from
#[derive(Debug, Args, Clone)]
pub struct PipelineSource {
    /// Path to a pipeline YAML or JSON file
    #[arg(short, long, conflicts_with = "template", required_unless_present = "template")]
    pub file: Option<String>,

    /// Id of a built-in template
    #[arg(short, long)]
    pub template: Option<String>,
}

impl PipelineSource {
    pub fn load(&self, library: &TemplateLibrary) -> Result<Pipeline> {
        match (&self.file, &self.template) {
            (Some(path), _) => Pipeline::from_file(path),
            (None, Some(id)) => library
                .get(id)
                .cloned()
                .ok_or_else(|| anyhow!("Unknown template: {}", id)),
            (None, None) => Err(anyhow!("Either --file or --template is required")),
        }
    }
}

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    #[command(flatten)]
    pub source: PipelineSource,

    /// Run parameters (key=value, value parsed as JSON when possible)
    #[arg(short, long = "input", value_parser = parse_key_value)]
    pub inputs: Vec<(String, String)>,

    /// Override the default retry count
    #[arg(long)]
    pub retries: Option<u32>,

    /// Override the default per-attempt timeout
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    /// Run parameters as a JSON object
    pub fn input_map(&self) -> Map<String, Value> {
        self.inputs
            .iter()
            .map(|(key, raw)| (key.clone(), parse_input_value(raw)))
            .collect()
    }
}

/// Validate a pipeline
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    #[command(flatten)]
    pub source: PipelineSource,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List or show built-in templates
#[derive(Debug, Args, Clone)]
pub struct TemplatesCommand {
    /// Print one template as YAML
    #[arg(long)]
    pub show: Option<String>,

    /// Filter by category
    #[arg(long)]
    pub category: Option<String>,

    /// Filter by tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Additional template directory
    #[arg(long)]
    pub dir: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Seed a pipeline from a free-text intent
#[derive(Debug, Args, Clone)]
pub struct GenerateCommand {
    /// What the pipeline should do
    pub intent: String,

    /// Write the pipeline to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List registered tools
#[derive(Debug, Args, Clone)]
pub struct ToolsCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline id to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show a single run
    #[arg(long)]
    pub run_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}

/// JSON when it parses, otherwise the raw string
pub fn parse_input_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
