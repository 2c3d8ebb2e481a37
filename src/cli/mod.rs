//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    GenerateCommand, HistoryCommand, RunCommand, TemplatesCommand, ToolsCommand, ValidateCommand,
};
use std::ffi::OsString;

/// Run DAG pipelines of tool calls
#[derive(Debug, Parser, Clone)]
#[command(name = "ptc")]
#[command(version)]
#[command(about = "Programmatic tool calling: validate and run DAG pipelines of tools", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Coordinator config file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Command tools file (YAML)
    #[arg(long, global = true)]
    pub tools: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Validate a pipeline against the registered tools
    Validate(ValidateCommand),

    /// List built-in templates
    Templates(TemplatesCommand),

    /// Seed a pipeline from a free-text intent
    Generate(GenerateCommand),

    /// List registered tools
    Tools(ToolsCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
