use anyhow::{Context, Result};
use ptc::cli::commands::{
    GenerateCommand, HistoryCommand, RunCommand, TemplatesCommand, ToolsCommand, ValidateCommand,
};
use ptc::cli::output::*;
use ptc::cli::{Cli, Command};
use ptc::core::{CoordinatorConfig, PipelineStatus, ToolRegistry, ToolsConfig};
use ptc::execution::{generate_from_intent, ExecutionEngine, Validator};
use ptc::persistence::{
    create_summary, ExecutionSummary, InMemoryPersistence, PersistenceBackend,
};
use ptc::templates::TemplateLibrary;
use ptc::tools;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli).await?,
        Command::Validate(cmd) => validate_pipeline(cmd, &cli)?,
        Command::Templates(cmd) => list_templates(cmd)?,
        Command::Generate(cmd) => generate_pipeline(cmd, &cli)?,
        Command::Tools(cmd) => list_tools(cmd, &cli)?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

fn load_registry(cli: &Cli) -> Result<ToolRegistry> {
    let mut registry = tools::builtin_registry();
    if let Some(path) = &cli.tools {
        let config = ToolsConfig::from_file(path)?;
        tools::register_commands(&mut registry, &config);
    }
    Ok(registry)
}

fn load_config(cli: &Cli) -> Result<CoordinatorConfig> {
    match &cli.config {
        Some(path) => CoordinatorConfig::from_file(path),
        None => Ok(CoordinatorConfig::default()),
    }
}

#[cfg(feature = "sqlite")]
async fn history_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(ptc::persistence::SqliteExecutionStore::with_default_path().await?))
}

#[cfg(not(feature = "sqlite"))]
async fn history_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let library = TemplateLibrary::builtin()?;
    let pipeline = cmd.source.load(&library).context("Failed to load pipeline")?;

    let mut config = load_config(cli)?;
    if let Some(retries) = cmd.retries {
        config = config.with_default_retries(retries);
    }
    if let Some(timeout_ms) = cmd.timeout_ms {
        config = config.with_default_timeout_ms(timeout_ms);
    }

    let engine = ExecutionEngine::new(load_registry(cli)?, config);

    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        history_store().await?
    };

    let progress = if cmd.json {
        None
    } else {
        println!("{} Loaded pipeline: {}", INFO, style(&pipeline.name).bold());
        let bar = create_progress_bar(pipeline.steps.len());
        let handler_bar = bar.clone();
        engine
            .add_event_handler(move |event| {
                handler_bar.println(format_execution_event(&event));
                if is_step_settled(&event) {
                    handler_bar.inc(1);
                }
            })
            .await;
        Some(bar)
    };

    let result = engine.execute(&pipeline, cmd.input_map()).await;

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    let summary = create_summary(&pipeline, &result);
    store.save_execution(&summary).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", format_pipeline_result(&result));
        if !cmd.no_history {
            println!(
                "\n{} Run saved to history (ID: {})",
                INFO,
                style(summary.run_id).dim()
            );
        }
    }

    match result.status {
        PipelineStatus::Success => Ok(()),
        PipelineStatus::Partial => std::process::exit(2),
        PipelineStatus::Error => std::process::exit(1),
    }
}

fn validate_pipeline(cmd: &ValidateCommand, cli: &Cli) -> Result<()> {
    let library = TemplateLibrary::builtin()?;
    let pipeline = cmd.source.load(&library).context("Failed to load pipeline")?;
    let registry = load_registry(cli)?;
    let validation = Validator::new(&registry).validate(&pipeline);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
    } else {
        println!("{}", format_validation(&pipeline, &validation));
    }

    if !validation.valid {
        std::process::exit(1);
    }
    Ok(())
}

fn list_templates(cmd: &TemplatesCommand) -> Result<()> {
    let mut library = TemplateLibrary::builtin()?;
    if let Some(dir) = &cmd.dir {
        library.load_dir(dir)?;
    }

    if let Some(id) = &cmd.show {
        let pipeline = library
            .get(id)
            .with_context(|| format!("Unknown template: {}", id))?;
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(pipeline)?);
        } else {
            print!("{}", pipeline.to_yaml()?);
        }
        return Ok(());
    }

    let templates = match (&cmd.category, &cmd.tag) {
        (Some(category), _) => library.by_category(category),
        (None, Some(tag)) => library.by_tag(tag),
        (None, None) => library.list(),
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
        return Ok(());
    }

    if templates.is_empty() {
        println!("{} No templates found", INFO);
        return Ok(());
    }
    println!("{} Templates:", INFO);
    for pipeline in templates {
        println!("{}", format_template(pipeline));
    }
    Ok(())
}

fn generate_pipeline(cmd: &GenerateCommand, cli: &Cli) -> Result<()> {
    let registry = load_registry(cli)?;
    let pipeline = generate_from_intent(&cmd.intent, &registry.names());

    let rendered = if cmd.json {
        serde_json::to_string_pretty(&pipeline)?
    } else {
        pipeline.to_yaml()?
    };

    match &cmd.output {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("Failed to write {}", path))?;
            println!("{} Wrote {}", CHECK, style(path).bold());
        }
        None => print!("{}", rendered),
    }

    // Generated pipelines are unchecked; surface problems right away
    let validation = Validator::new(&registry).validate(&pipeline);
    if !validation.valid {
        eprintln!("{}", format_validation(&pipeline, &validation));
    }
    Ok(())
}

fn list_tools(cmd: &ToolsCommand, cli: &Cli) -> Result<()> {
    let registry = load_registry(cli)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&registry.list())?);
        return Ok(());
    }

    println!("{} Registered tools:", INFO);
    for tool in registry.list() {
        println!("{}", format_tool(tool));
    }
    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = history_store().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_execution(run_id).await? {
            Some(summary) => print_run(&summary, cmd.json)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let mut runs = match &cmd.pipeline {
        Some(pipeline_id) => store.list_executions(pipeline_id).await?,
        None => store.recent_executions(cmd.limit).await?,
    };
    runs.truncate(cmd.limit);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, runs.len());
    for summary in &runs {
        println!("  {}", format_execution_summary(summary));
    }
    Ok(())
}

fn print_run(summary: &ExecutionSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!(
        "  Pipeline: {} ({})",
        style(&summary.pipeline_name).bold(),
        summary.pipeline_id
    );
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    println!("  Completed: {}", style(summary.completed_at.to_rfc3339()).dim());
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Steps: {} total, {} succeeded, {} failed, {} skipped",
        summary.total_steps, summary.succeeded, summary.failed, summary.skipped
    );
    if let Some(error) = &summary.first_error {
        println!("  First error: {}", style(error).red());
    }
    Ok(())
}
